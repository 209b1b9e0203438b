//! `cache stats` and `cache clear`.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use localnet_sandbox::config::default_snapshot_dir;
use localnet_snapshot_cache::FsSnapshotStore;

use super::{display, CliContext};

#[derive(Args)]
pub struct CacheCmd {
    #[command(subcommand)]
    action: CacheAction,

    /// Cache directory (default: from config, else the sandbox home)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show the number of persisted snapshots
    Stats,
    /// Remove every persisted snapshot
    Clear,
}

impl CacheCmd {
    pub fn execute(&self, ctx: &CliContext) -> Result<i32> {
        let dir = self.cache_dir(ctx);
        let store = FsSnapshotStore::new(&dir)?;
        match self.action {
            CacheAction::Stats => {
                let count = store.count()?;
                if ctx.json {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&serde_json::json!({
                            "dir": display(&dir),
                            "snapshots": count,
                        }))?
                    );
                } else {
                    println!("{} snapshot(s) in {}", count, dir.display());
                }
            }
            CacheAction::Clear => {
                let count = store.count()?;
                store.clear()?;
                if ctx.json {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&serde_json::json!({
                            "dir": display(&dir),
                            "removed": count,
                        }))?
                    );
                } else {
                    println!("Removed {} snapshot(s) from {}", count, dir.display());
                }
            }
        }
        Ok(0)
    }

    fn cache_dir(&self, ctx: &CliContext) -> PathBuf {
        if let Some(dir) = &self.dir {
            return dir.clone();
        }
        let from_config = ctx
            .load_config()
            .ok()
            .and_then(|raw| raw.snapshot_cache)
            .and_then(|cache| cache.dir)
            .map(|dir| ctx.config_dir().join(dir));
        from_config.unwrap_or_else(default_snapshot_dir)
    }
}
