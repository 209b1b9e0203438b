//! The provisioning run state machine.
//!
//! ```text
//! Idle -> Resolving -> LedgerPreparing -> Fetching -> Deploying -> Starting -> Ready
//!                                                                        \
//!   (any non-terminal phase) ------------------------------------------> Failed
//! ```
//!
//! Phases are never re-entered. A failed run needs a new [`ProvisioningRun`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use localnet_snapshot_cache::SnapshotCache;
use localnet_state_fetcher::{AccountFetcher, AccountSource, FetchReport, RpcAccountSource};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::RawConfig;
use crate::error::{ConfigError, ProvisionError};
use crate::ledger::{LedgerManager, MaterializedAccount};
use crate::orchestrator::{Endpoints, StartRequest, ValidatorHandle, ValidatorOrchestrator};
use crate::plan::{ConfigResolver, ExecutionPlan, Policy};
use crate::provisioner::{ProgramProvisioner, StagedProgram};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Resolving,
    LedgerPreparing,
    Fetching,
    Deploying,
    Starting,
    Ready,
    Failed,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Resolving => "resolving",
            RunPhase::LedgerPreparing => "ledger_preparing",
            RunPhase::Fetching => "fetching",
            RunPhase::Deploying => "deploying",
            RunPhase::Starting => "starting",
            RunPhase::Ready => "ready",
            RunPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Ready | RunPhase::Failed)
    }

    /// The phase following this one on the success path.
    pub fn next(&self) -> Option<RunPhase> {
        match self {
            RunPhase::Idle => Some(RunPhase::Resolving),
            RunPhase::Resolving => Some(RunPhase::LedgerPreparing),
            RunPhase::LedgerPreparing => Some(RunPhase::Fetching),
            RunPhase::Fetching => Some(RunPhase::Deploying),
            RunPhase::Deploying => Some(RunPhase::Starting),
            RunPhase::Starting => Some(RunPhase::Ready),
            RunPhase::Ready | RunPhase::Failed => None,
        }
    }

    pub fn can_transition_to(&self, to: RunPhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == RunPhase::Failed || self.next() == Some(to)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid run transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: RunPhase,
    pub to: RunPhase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseTransition {
    pub from: RunPhase,
    pub to: RunPhase,
    pub at: DateTime<Utc>,
}

/// Phase bookkeeping for one run.
#[derive(Debug, Clone)]
pub struct ProvisioningRun {
    phase: RunPhase,
    history: Vec<PhaseTransition>,
}

impl Default for ProvisioningRun {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvisioningRun {
    pub fn new() -> Self {
        Self {
            phase: RunPhase::Idle,
            history: Vec::new(),
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn history(&self) -> &[PhaseTransition] {
        &self.history
    }

    /// Phases visited so far, starting with `Idle`.
    pub fn phases(&self) -> Vec<RunPhase> {
        std::iter::once(RunPhase::Idle)
            .chain(self.history.iter().map(|t| t.to))
            .collect()
    }

    pub fn advance(&mut self, to: RunPhase) -> Result<(), InvalidTransition> {
        let from = self.phase;
        if !from.can_transition_to(to) {
            return Err(InvalidTransition { from, to });
        }
        self.phase = to;
        self.history.push(PhaseTransition {
            from,
            to,
            at: Utc::now(),
        });
        if to == RunPhase::Failed {
            warn!(from = %from, "run failed");
        } else {
            info!(phase = %to, "run phase");
        }
        Ok(())
    }

    fn into_history(self) -> Vec<PhaseTransition> {
        self.history
    }
}

/// A run that reached `Ready`.
#[derive(Debug)]
pub struct Provisioned {
    pub plan: ExecutionPlan,
    pub endpoints: Endpoints,
    pub handle: ValidatorHandle,
    pub fetch_report: FetchReport,
    pub accounts: Vec<MaterializedAccount>,
    pub staged: Vec<StagedProgram>,
    pub cache: Arc<SnapshotCache>,
    pub history: Vec<PhaseTransition>,
}

/// A run that reached `Failed`.
#[derive(Debug)]
pub struct RunFailure {
    /// Phase the run was in when it failed.
    pub phase: RunPhase,
    pub error: ProvisionError,
    pub history: Vec<PhaseTransition>,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed while {}: {}", self.phase, self.error)
    }
}

impl std::error::Error for RunFailure {}

/// Drives one provisioning run from raw configuration to a ready validator.
pub struct Provisioner {
    resolver: ConfigResolver,
    orchestrator: ValidatorOrchestrator,
    source: Option<Arc<dyn AccountSource>>,
    cache: Option<Arc<SnapshotCache>>,
    ledger: LedgerManager,
    programs: ProgramProvisioner,
}

impl Provisioner {
    pub fn new(resolver: ConfigResolver, orchestrator: ValidatorOrchestrator) -> Self {
        Self {
            resolver,
            orchestrator,
            source: None,
            cache: None,
            ledger: LedgerManager::new(),
            programs: ProgramProvisioner::new(),
        }
    }

    /// Use a specific account source instead of JSON-RPC.
    pub fn with_source(mut self, source: Arc<dyn AccountSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Share a cache across runs instead of building one from the policy.
    pub fn with_cache(mut self, cache: Arc<SnapshotCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Resolve only, without side effects beyond reading deploy artifacts.
    pub fn plan(&self, raw: &RawConfig) -> Result<ExecutionPlan, ProvisionError> {
        Ok(self.resolver.resolve(raw)?)
    }

    pub async fn provision(
        &self,
        raw: &RawConfig,
        cancel: &CancellationToken,
    ) -> Result<Provisioned, RunFailure> {
        let mut run = ProvisioningRun::new();
        match self.drive(&mut run, raw, cancel).await {
            Ok(mut provisioned) => {
                enter(&mut run, RunPhase::Ready);
                provisioned.history = run.into_history();
                Ok(provisioned)
            }
            Err(error) => {
                let phase = run.phase();
                error!(phase = %phase, kind = error.kind(), error = %error, "provisioning failed");
                enter(&mut run, RunPhase::Failed);
                Err(RunFailure {
                    phase,
                    error,
                    history: run.into_history(),
                })
            }
        }
    }

    async fn drive(
        &self,
        run: &mut ProvisioningRun,
        raw: &RawConfig,
        cancel: &CancellationToken,
    ) -> Result<Provisioned, ProvisionError> {
        enter(run, RunPhase::Resolving);
        let plan = self.resolver.resolve(raw)?;
        let cache = self.cache_for(&plan.policy)?;
        check_cancel(cancel)?;

        enter(run, RunPhase::LedgerPreparing);
        let lock = self.orchestrator.lock(&plan.validator)?;
        let ledger = self
            .ledger
            .prepare(&plan.validator.ledger_dir, plan.validator.reset_ledger)?;
        check_cancel(cancel)?;

        enter(run, RunPhase::Fetching);
        let fetcher = AccountFetcher::new(
            self.source_for(&plan.policy),
            cache.clone(),
            plan.policy.fetch_options(),
        );
        let fetch_report = fetcher.fetch_all(&plan.clone_tasks, cancel).await;
        check_cancel(cancel)?;
        if !fetch_report.is_complete() {
            return Err(ProvisionError::Fetch {
                failures: fetch_report.failed.clone(),
            });
        }

        enter(run, RunPhase::Deploying);
        let staged = self.programs.stage(&plan.deploy_tasks)?;
        let accounts = self.ledger.materialize(&ledger, fetch_report.accounts())?;
        check_cancel(cancel)?;

        enter(run, RunPhase::Starting);
        let (endpoints, handle) = self
            .orchestrator
            .start(
                StartRequest {
                    config: &plan.validator,
                    policy: &plan.policy,
                    ledger: &ledger,
                    accounts: &accounts,
                    programs: &staged,
                },
                lock,
                cancel,
            )
            .await?;

        Ok(Provisioned {
            plan,
            endpoints,
            handle,
            fetch_report,
            accounts,
            staged,
            cache,
            history: Vec::new(),
        })
    }

    /// A persistent store that cannot be opened is a configuration error.
    fn cache_for(&self, policy: &Policy) -> Result<Arc<SnapshotCache>, ConfigError> {
        if let Some(cache) = &self.cache {
            return Ok(cache.clone());
        }
        let cache = match &policy.snapshot_dir {
            Some(dir) => {
                SnapshotCache::with_store(dir).map_err(|e| ConfigError::SnapshotStore {
                    dir: dir.clone(),
                    message: format!("{:#}", e),
                })?
            }
            None => SnapshotCache::new(),
        };
        Ok(Arc::new(cache))
    }

    fn source_for(&self, policy: &Policy) -> Arc<dyn AccountSource> {
        match &self.source {
            Some(source) => source.clone(),
            None => Arc::new(RpcAccountSource::with_timeouts(
                policy.request_timeout(),
                policy.request_timeout().min(std::time::Duration::from_secs(10)),
            )),
        }
    }
}

fn enter(run: &mut ProvisioningRun, phase: RunPhase) {
    if let Err(e) = run.advance(phase) {
        error!(error = %e, "run state machine violated");
    }
}

fn check_cancel(cancel: &CancellationToken) -> Result<(), ProvisionError> {
    if cancel.is_cancelled() {
        Err(ProvisionError::Cancelled)
    } else {
        Ok(())
    }
}
