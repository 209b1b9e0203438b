//! Error taxonomy for a provisioning run.
//!
//! Each phase has its own error type. [`ProvisionError`] wraps whichever one
//! ended the run and is what callers match on.

use std::io;
use std::path::PathBuf;

use localnet_state_fetcher::TaskFailure;
use thiserror::Error;

/// Invalid configuration. Raised before any I/O beyond reading the file and
/// checking deploy artifacts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("empty label in {kind} entry #{index}")]
    EmptyLabel { kind: &'static str, index: usize },
    #[error("duplicate label `{0}`")]
    DuplicateLabel(String),
    #[error("`{label}` and `{other}` both refer to {address}")]
    DuplicateAddress {
        label: String,
        other: String,
        address: String,
    },
    #[error("`{label}`: invalid {field} `{value}`: {message}")]
    InvalidKey {
        label: String,
        field: &'static str,
        value: String,
        message: String,
    },
    #[error("invalid commitment `{0}` (expected processed, confirmed or finalized)")]
    InvalidCommitment(String),
    #[error("invalid {field}: {message}")]
    InvalidField { field: &'static str, message: String },
    #[error("`{label}`: invalid {field}: {message}")]
    InvalidAccountField {
        label: String,
        field: &'static str,
        message: String,
    },
    #[error("program `{label}`: deploy artifact {path} is not readable: {message}")]
    MissingArtifact {
        label: String,
        path: PathBuf,
        message: String,
    },
    #[error("program `{label}`: deploy artifact {path} is empty")]
    EmptyArtifact { label: String, path: PathBuf },
    #[error("snapshot cache directory {dir} is unusable: {message}")]
    SnapshotStore { dir: PathBuf, message: String },
}

impl ConfigError {
    /// Label of the account or program the error is about, if any.
    pub fn label(&self) -> Option<&str> {
        match self {
            ConfigError::DuplicateLabel(label)
            | ConfigError::DuplicateAddress { label, .. }
            | ConfigError::InvalidKey { label, .. }
            | ConfigError::InvalidAccountField { label, .. }
            | ConfigError::MissingArtifact { label, .. }
            | ConfigError::EmptyArtifact { label, .. } => Some(label),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to {op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("ledger path {0} exists and is not a directory")]
    NotADirectory(PathBuf),
    #[error("failed to encode account file for {address}: {message}")]
    Encode { address: String, message: String },
}

impl LedgerError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        LedgerError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Local artifact problems. Never retried.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("program `{label}`: cannot read {path}: {source}")]
    Unreadable {
        label: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("program `{label}`: artifact {path} is empty")]
    Empty { label: String, path: PathBuf },
}

impl DeployError {
    pub fn label(&self) -> &str {
        match self {
            DeployError::Unreadable { label, .. } | DeployError::Empty { label, .. } => label,
        }
    }
}

#[derive(Debug, Error)]
pub enum ValidatorStartError {
    #[error(
        "ledger {ledger} is in use by another run (pid {})",
        .pid.map(|p| p.to_string()).unwrap_or_else(|| "unknown".to_string())
    )]
    LedgerBusy { ledger: PathBuf, pid: Option<u32> },
    #[error("failed to manage ledger lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("port {port} is still bound after reclaiming validators")]
    PortConflict { port: u16 },
    #[error("failed to terminate validator pid {pid}: {message}")]
    Terminate { pid: u32, message: String },
    #[error("failed to spawn `{binary}`: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },
    #[error("validator exited before becoming ready ({status}); see {log}")]
    ExitedBeforeReady { status: String, log: PathBuf },
    #[error("validator at {url} not ready after {waited_secs}s")]
    ReadinessTimeout { url: String, waited_secs: u64 },
    #[error("validator start cancelled")]
    Cancelled,
}

/// Why a run ended in `Failed`.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("{} clone task(s) failed: {}", failures.len(), describe_failures(failures))]
    Fetch { failures: Vec<TaskFailure> },
    #[error(transparent)]
    Deploy(#[from] DeployError),
    #[error(transparent)]
    Validator(#[from] ValidatorStartError),
    #[error("run cancelled")]
    Cancelled,
}

fn describe_failures(failures: &[TaskFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("`{}` ({})", f.label, f.error))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ProvisionError {
    /// Short machine-readable kind for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ProvisionError::Config(_) => "config",
            ProvisionError::Ledger(_) => "ledger",
            ProvisionError::Fetch { .. } => "fetch",
            ProvisionError::Deploy(_) => "deploy",
            ProvisionError::Validator(ValidatorStartError::Cancelled) | ProvisionError::Cancelled => {
                "cancelled"
            }
            ProvisionError::Validator(_) => "validator_start",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == "cancelled"
    }

    /// Labels of the accounts or programs responsible for the failure.
    pub fn labels(&self) -> Vec<String> {
        match self {
            ProvisionError::Config(e) => e.label().map(str::to_string).into_iter().collect(),
            ProvisionError::Fetch { failures } => failures.iter().map(|f| f.label.clone()).collect(),
            ProvisionError::Deploy(e) => vec![e.label().to_string()],
            _ => Vec::new(),
        }
    }
}
