//! Spawning the validator process.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::error::ValidatorStartError;
use crate::ledger::{MaterializedAccount, PreparedLedger};
use crate::provisioner::StagedProgram;

/// Environment variable carrying the `verifyFees` setting to the validator.
pub const VERIFY_FEES_ENV: &str = "LOCALNET_VERIFY_FEES";

/// Everything the launcher needs to start a validator.
#[derive(Debug, Clone, Copy)]
pub struct LaunchRequest<'a> {
    pub binary: &'a str,
    pub ledger: &'a PreparedLedger,
    pub rpc_port: u16,
    pub accounts: &'a [MaterializedAccount],
    pub programs: &'a [StagedProgram],
    pub verify_fees: bool,
    pub detached: bool,
}

impl LaunchRequest<'_> {
    /// Command-line arguments for `solana-test-validator`.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--ledger".to_string(),
            self.ledger.root().display().to_string(),
            "--rpc-port".to_string(),
            self.rpc_port.to_string(),
        ];
        for acct in self.accounts {
            args.push("--account".to_string());
            args.push(acct.address.to_string());
            args.push(acct.path.display().to_string());
        }
        for program in self.programs {
            args.push("--bpf-program".to_string());
            args.push(program.program_id.to_string());
            args.push(program.artifact.display().to_string());
        }
        args.push("--quiet".to_string());
        args
    }
}

/// A launched validator the orchestrator can observe and stop.
#[async_trait]
pub trait RunningValidator: Send + Sync {
    fn pid(&self) -> u32;

    /// Exit status if the process has already exited.
    fn try_exited(&mut self) -> Option<String>;

    /// Graceful stop, forced after `grace`.
    async fn shutdown(&mut self, grace: Duration) -> std::io::Result<()>;

    /// Wait for the process to exit on its own.
    async fn wait(&mut self) -> std::io::Result<String>;
}

pub trait ValidatorLauncher: Send + Sync {
    fn launch(
        &self,
        request: &LaunchRequest<'_>,
    ) -> Result<Box<dyn RunningValidator>, ValidatorStartError>;
}

/// Launches `solana-test-validator` (or a compatible binary).
#[derive(Debug, Clone, Default)]
pub struct TestValidatorLauncher;

impl ValidatorLauncher for TestValidatorLauncher {
    fn launch(
        &self,
        request: &LaunchRequest<'_>,
    ) -> Result<Box<dyn RunningValidator>, ValidatorStartError> {
        let spawn_err = |source: std::io::Error| ValidatorStartError::Spawn {
            binary: request.binary.to_string(),
            source,
        };
        let log_path = request.ledger.validator_log();
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(spawn_err)?;
        let log_err = log.try_clone().map_err(spawn_err)?;

        let args = request.args();
        debug!(binary = request.binary, args = ?args, "spawning validator");

        let mut cmd = Command::new(request.binary);
        cmd.args(&args)
            .env(VERIFY_FEES_ENV, request.verify_fees.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err));
        if request.detached {
            // Own process group, so terminal signals aimed at us skip it.
            #[cfg(unix)]
            cmd.process_group(0);
        } else {
            cmd.kill_on_drop(true);
        }

        let child = cmd.spawn().map_err(spawn_err)?;
        let pid = child.id().ok_or_else(|| {
            spawn_err(std::io::Error::other(
                "process exited before its pid was read",
            ))
        })?;
        info!(pid, detached = request.detached, log = %log_path.display(), "validator spawned");
        Ok(Box::new(ChildValidator {
            child,
            pid,
            log: log_path,
        }))
    }
}

/// [`RunningValidator`] over a tokio child process.
#[derive(Debug)]
pub struct ChildValidator {
    child: Child,
    pid: u32,
    log: PathBuf,
}

impl ChildValidator {
    pub fn log(&self) -> &std::path::Path {
        &self.log
    }
}

#[async_trait]
impl RunningValidator for ChildValidator {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn try_exited(&mut self) -> Option<String> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(status.to_string()),
            Ok(None) => None,
            Err(e) => Some(format!("unknown ({})", e)),
        }
    }

    async fn shutdown(&mut self, grace: Duration) -> std::io::Result<()> {
        if self.try_exited().is_some() {
            return Ok(());
        }
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            if let Err(e) = kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM) {
                debug!(pid = self.pid, error = %e, "SIGTERM failed");
            }
            if let Ok(status) = tokio::time::timeout(grace, self.child.wait()).await {
                status?;
                return Ok(());
            }
            warn!(pid = self.pid, "validator did not stop in time, killing");
        }
        #[cfg(not(unix))]
        let _ = grace;
        self.child.kill().await
    }

    async fn wait(&mut self) -> std::io::Result<String> {
        Ok(self.child.wait().await?.to_string())
    }
}
