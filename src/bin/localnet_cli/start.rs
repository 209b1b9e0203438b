//! `start`: run the whole provisioning flow.

use anyhow::Result;
use clap::Args;
use localnet_sandbox::report::ReadySummary;
use localnet_sandbox::{Provisioner, ValidatorHandle, ValidatorOrchestrator};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::CliContext;

#[derive(Args)]
pub struct StartCmd {
    /// Leave the validator running after it is ready
    #[arg(long, conflicts_with = "no_detached")]
    detached: bool,

    /// Keep the validator in the foreground (overrides CI)
    #[arg(long)]
    no_detached: bool,

    /// Wipe the ledger before starting
    #[arg(long, conflicts_with = "no_reset")]
    reset: bool,

    /// Reuse the existing ledger
    #[arg(long)]
    no_reset: bool,
}

impl StartCmd {
    fn flag(yes: bool, no: bool) -> Option<bool> {
        match (yes, no) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    pub async fn execute(&self, ctx: &CliContext) -> Result<i32> {
        let mut raw = match ctx.load_config() {
            Ok(raw) => raw,
            Err(e) => return Ok(ctx.report_failure(&ctx.config_failure(e))),
        };
        if let Some(detached) = Self::flag(self.detached, self.no_detached) {
            raw.detached = Some(detached);
        }
        if let Some(reset) = Self::flag(self.reset, self.no_reset) {
            raw.reset_ledger = Some(reset);
        }

        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling");
                on_interrupt.cancel();
            }
        });

        let provisioner = Provisioner::new(ctx.resolver(), ValidatorOrchestrator::system());
        let provisioned = match provisioner.provision(&raw, &cancel).await {
            Ok(p) => p,
            Err(failure) => return Ok(ctx.report_failure(&failure)),
        };

        let summary = ReadySummary::from_provisioned(&provisioned);
        if ctx.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print!("{}", summary.render_text());
        }

        let mut validator = match provisioned.handle {
            ValidatorHandle::Detached { .. } => return Ok(0),
            ValidatorHandle::Supervised(v) => v,
        };
        let exited = tokio::select! {
            _ = cancel.cancelled() => None,
            status = validator.wait() => Some(status),
        };
        match exited {
            None => {
                validator.shutdown().await?;
                info!("validator stopped");
                Ok(0)
            }
            Some(status) => {
                let status = status?;
                warn!(status = %status, "validator exited");
                Ok(1)
            }
        }
    }
}
