//! Local validator lifecycle.
//!
//! The orchestrator reclaims stale validators, launches a new one on the
//! prepared ledger, waits for readiness, and then either keeps ownership of
//! the process (supervised) or hands it off (detached).
//!
//! OS access goes through four seams so the flow can run against fakes:
//! [`ProcessLocator`], [`ProcessTerminator`], [`ValidatorLauncher`] and
//! [`HealthProbe`].

pub mod launcher;
pub mod lock;
pub mod process;
pub mod readiness;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use launcher::{
    ChildValidator, LaunchRequest, RunningValidator, TestValidatorLauncher, ValidatorLauncher,
    VERIFY_FEES_ENV,
};
pub use lock::LedgerLock;
pub use process::{
    ProcessLocator, ProcessTerminator, SignalTerminator, SysinfoProcessLocator, TermSignal,
    ValidatorProcess,
};
pub use readiness::{HealthProbe, RpcHealthProbe};

use crate::error::ValidatorStartError;
use crate::ledger::{MaterializedAccount, PreparedLedger};
use crate::plan::{Policy, ValidatorConfig};
use crate::provisioner::StagedProgram;

/// Where tests reach the running validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoints {
    pub rpc_url: String,
    pub websocket_url: Option<String>,
}

/// A validator this process is responsible for stopping.
pub struct SupervisedValidator {
    process: Box<dyn RunningValidator>,
    grace: Duration,
    // Held for as long as we own the process.
    _lock: LedgerLock,
}

impl SupervisedValidator {
    pub fn pid(&self) -> u32 {
        self.process.pid()
    }

    /// Stop the validator and release the ledger.
    pub async fn shutdown(mut self) -> std::io::Result<()> {
        info!(pid = self.pid(), "shutting down validator");
        self.process.shutdown(self.grace).await
    }

    /// Block until the validator exits on its own.
    pub async fn wait(&mut self) -> std::io::Result<String> {
        self.process.wait().await
    }
}

impl std::fmt::Debug for SupervisedValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisedValidator")
            .field("pid", &self.pid())
            .field("grace", &self.grace)
            .finish()
    }
}

/// Outcome of a successful start.
#[derive(Debug)]
pub enum ValidatorHandle {
    Supervised(SupervisedValidator),
    /// Ownership handed off; nothing in this process will stop it.
    Detached { pid: u32 },
}

impl ValidatorHandle {
    pub fn pid(&self) -> u32 {
        match self {
            ValidatorHandle::Supervised(s) => s.pid(),
            ValidatorHandle::Detached { pid } => *pid,
        }
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, ValidatorHandle::Detached { .. })
    }
}

/// Inputs of [`ValidatorOrchestrator::start`] besides the configuration.
pub struct StartRequest<'a> {
    pub config: &'a ValidatorConfig,
    pub policy: &'a Policy,
    pub ledger: &'a PreparedLedger,
    pub accounts: &'a [MaterializedAccount],
    pub programs: &'a [StagedProgram],
}

pub struct ValidatorOrchestrator {
    locator: Arc<dyn ProcessLocator>,
    terminator: Arc<dyn ProcessTerminator>,
    launcher: Arc<dyn ValidatorLauncher>,
    probe: Arc<dyn HealthProbe>,
}

impl ValidatorOrchestrator {
    pub fn new(
        locator: Arc<dyn ProcessLocator>,
        terminator: Arc<dyn ProcessTerminator>,
        launcher: Arc<dyn ValidatorLauncher>,
        probe: Arc<dyn HealthProbe>,
    ) -> Self {
        Self {
            locator,
            terminator,
            launcher,
            probe,
        }
    }

    /// Orchestrator backed by the real process table and validator binary.
    pub fn system() -> Self {
        Self::new(
            Arc::new(SysinfoProcessLocator),
            Arc::new(SignalTerminator),
            Arc::new(TestValidatorLauncher),
            Arc::new(RpcHealthProbe::default()),
        )
    }

    /// Take the exclusive lock for a ledger path.
    pub fn lock(&self, config: &ValidatorConfig) -> Result<LedgerLock, ValidatorStartError> {
        LedgerLock::acquire(&config.ledger_dir)
    }

    /// Terminate every validator bound to our ledger or port.
    ///
    /// Returns the number of processes stopped.
    pub async fn reclaim(
        &self,
        config: &ValidatorConfig,
        policy: &Policy,
    ) -> Result<usize, ValidatorStartError> {
        let stale = self
            .locator
            .find_validators(&config.ledger_dir, config.rpc_port);
        for proc in &stale {
            warn!(pid = proc.pid, command = %proc.command, "reclaiming running validator");
            process::terminate(self.terminator.as_ref(), proc.pid, policy.shutdown_grace()).await?;
        }
        if !stale.is_empty() {
            process::wait_for_port(config.rpc_port, policy.shutdown_grace()).await?;
        }
        Ok(stale.len())
    }

    /// Launch the validator and wait for it to become ready.
    ///
    /// On any failure after launch the process is stopped before returning,
    /// except that cancelling a detached run leaves the process alone.
    pub async fn start(
        &self,
        request: StartRequest<'_>,
        lock: LedgerLock,
        cancel: &CancellationToken,
    ) -> Result<(Endpoints, ValidatorHandle), ValidatorStartError> {
        let StartRequest {
            config,
            policy,
            ledger,
            accounts,
            programs,
        } = request;

        if config.kill_running_validators {
            self.reclaim(config, policy).await?;
        }
        if !process::port_is_free(config.rpc_port) {
            return Err(ValidatorStartError::PortConflict {
                port: config.rpc_port,
            });
        }
        if cancel.is_cancelled() {
            return Err(ValidatorStartError::Cancelled);
        }

        let mut process = self.launcher.launch(&LaunchRequest {
            binary: &policy.validator_binary,
            ledger,
            rpc_port: config.rpc_port,
            accounts,
            programs,
            verify_fees: config.verify_fees,
            detached: config.detached,
        })?;

        let ready = readiness::wait_until_ready(
            self.probe.as_ref(),
            process.as_mut(),
            &config.local_rpc_url,
            policy.readiness_timeout(),
            policy.readiness_poll(),
            &ledger.validator_log(),
            cancel,
        )
        .await;
        if let Err(e) = ready {
            // A detached validator outlives the provisioner, cancelled or not.
            if config.detached && matches!(e, ValidatorStartError::Cancelled) {
                info!(pid = process.pid(), "run cancelled; leaving detached validator running");
                drop(process);
                return Err(e);
            }
            if let Err(stop) = process.shutdown(policy.shutdown_grace()).await {
                warn!(pid = process.pid(), error = %stop, "failed to stop validator after failed start");
            }
            return Err(e);
        }

        let endpoints = Endpoints {
            rpc_url: config.local_rpc_url.clone(),
            websocket_url: config.cluster_websocket_url.clone(),
        };
        let handle = if config.detached {
            let pid = process.pid();
            info!(pid, "validator detached");
            drop(process);
            ValidatorHandle::Detached { pid }
        } else {
            ValidatorHandle::Supervised(SupervisedValidator {
                process,
                grace: policy.shutdown_grace(),
                _lock: lock,
            })
        };
        Ok((endpoints, handle))
    }
}
