//! CLI subcommand implementations for localnet-sandbox

pub mod cache;
pub mod plan;
pub mod start;

use std::path::{Path, PathBuf};

use localnet_sandbox::error::{ConfigError, ProvisionError};
use localnet_sandbox::report::FailureReport;
use localnet_sandbox::run::{RunFailure, RunPhase};
use localnet_sandbox::{ConfigResolver, RawConfig};

/// Options shared by every subcommand.
pub struct CliContext {
    pub config: PathBuf,
    pub json: bool,
}

impl CliContext {
    pub fn load_config(&self) -> Result<RawConfig, ConfigError> {
        RawConfig::load(&self.config)
    }

    /// Directory relative paths in the config file are resolved against.
    pub fn config_dir(&self) -> PathBuf {
        match self.config.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn resolver(&self) -> ConfigResolver {
        ConfigResolver::from_env().with_base_dir(self.config_dir())
    }

    /// Print a failure report and return the exit code for it.
    pub fn report_failure(&self, failure: &RunFailure) -> i32 {
        let report = FailureReport::from_failure(failure);
        if self.json {
            match report.to_json() {
                Ok(json) => println!("{}", json),
                Err(_) => eprint!("{}", report.render_text()),
            }
        } else {
            eprint!("{}", report.render_text());
        }
        report.exit_code()
    }

    /// Failure for a config file that could not be loaded at all.
    pub fn config_failure(&self, error: ConfigError) -> RunFailure {
        RunFailure {
            phase: RunPhase::Resolving,
            error: ProvisionError::Config(error),
            history: Vec::new(),
        }
    }
}

pub fn display(path: &Path) -> String {
    path.display().to_string()
}
