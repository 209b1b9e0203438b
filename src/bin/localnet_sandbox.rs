//! localnet-sandbox: provision a local validator seeded from a live cluster
//!
//! ## Commands
//!
//! - **start**: resolve the config, clone accounts, stage programs, launch the validator
//! - **plan**: resolve the config and print the execution plan as JSON
//! - **cache**: inspect or clear the persisted snapshot cache
//!
//! ## Example Usage
//!
//! ```bash
//! # Start a validator from ./localnet.json and keep it in the foreground
//! localnet-sandbox start
//!
//! # Leave the validator running for later CI steps
//! localnet-sandbox --config ci/localnet.json start --detached
//!
//! # Check what would be cloned without touching the network
//! localnet-sandbox plan
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use localnet_sandbox::config::DEFAULT_CONFIG_FILE;
use localnet_sandbox::logging::{self, LogConfig};

mod localnet_cli;

use localnet_cli::{cache::CacheCmd, plan::PlanCmd, start::StartCmd, CliContext};

#[derive(Parser)]
#[command(
    name = "localnet-sandbox",
    author,
    version,
    about = "Local validator provisioning with cloned cluster state",
    long_about = "Provision a local test validator pre-seeded with accounts and programs\n\
                  cloned from a live cluster, plus locally built program artifacts."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(long, short, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Debug-level logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision and launch the local validator
    Start(StartCmd),

    /// Resolve the configuration and print the execution plan
    Plan(PlanCmd),

    /// Inspect or clear the persisted snapshot cache
    Cache(CacheCmd),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Start(_) => "start",
            Commands::Plan(_) => "plan",
            Commands::Cache(_) => "cache",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        command,
        config,
        json,
        log_json,
        verbose,
    } = Cli::parse();
    logging::init(&LogConfig::from_flags(verbose, log_json))?;
    tracing::debug!(command = command.name(), config = %config.display(), "starting");

    let ctx = CliContext { config, json };
    let code = match command {
        Commands::Start(cmd) => cmd.execute(&ctx).await?,
        Commands::Plan(cmd) => cmd.execute(&ctx)?,
        Commands::Cache(cmd) => cmd.execute(&ctx)?,
    };
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
