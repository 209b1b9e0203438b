//! `plan`: resolve only.

use anyhow::Result;
use clap::Args;

use super::CliContext;

#[derive(Args)]
pub struct PlanCmd {
    /// Resolve as if running in CI (detached by default)
    #[arg(long)]
    ci: bool,
}

impl PlanCmd {
    pub fn execute(&self, ctx: &CliContext) -> Result<i32> {
        let raw = match ctx.load_config() {
            Ok(raw) => raw,
            Err(e) => return Ok(ctx.report_failure(&ctx.config_failure(e))),
        };
        let mut resolver = ctx.resolver();
        if self.ci {
            resolver = resolver.with_ci(true);
        }
        match resolver.resolve(&raw) {
            Ok(plan) => {
                println!("{}", serde_json::to_string_pretty(&plan)?);
                Ok(0)
            }
            Err(e) => Ok(ctx.report_failure(&ctx.config_failure(e))),
        }
    }
}
