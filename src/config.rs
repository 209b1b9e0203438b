//! Declarative configuration as written by the user.
//!
//! [`RawConfig`] mirrors the JSON file one-to-one and performs no validation
//! beyond JSON shape. Semantic checks happen in [`crate::plan::ConfigResolver`].

use std::path::{Path, PathBuf};

use localnet_sandbox_types::env_var;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "localnet.json";

/// Environment variable overriding the sandbox home directory.
pub const HOME_ENV: &str = "LOCALNET_SANDBOX_HOME";

/// Presence of this variable makes `detached` default to true.
pub const CI_ENV: &str = "CI";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawConfig {
    /// Cluster all accounts are cloned from unless overridden per account.
    #[serde(alias = "accountsCluster")]
    pub cluster_rpc_url: Option<String>,
    /// Websocket endpoint of the local validator. Must be the RPC port plus one;
    /// empty leaves it unreported.
    #[serde(alias = "websocketUrl")]
    pub cluster_websocket_url: Option<String>,
    /// RPC endpoint the local validator listens on.
    #[serde(alias = "jsonRpcUrl")]
    pub local_rpc_url: Option<String>,
    #[serde(default)]
    pub accounts: Vec<RawAccountSpec>,
    #[serde(default)]
    pub programs: Vec<RawProgramSpec>,
    pub commitment: Option<String>,
    pub ledger_dir: Option<PathBuf>,
    pub reset_ledger: Option<bool>,
    pub verify_fees: Option<bool>,
    pub kill_running_validators: Option<bool>,
    pub detached: Option<bool>,

    pub fetch_concurrency: Option<usize>,
    pub retry: Option<RawRetry>,
    pub request_timeout_secs: Option<u64>,
    pub readiness_timeout_secs: Option<u64>,
    pub readiness_poll_ms: Option<u64>,
    pub shutdown_grace_secs: Option<u64>,
    pub validator_binary: Option<String>,
    pub snapshot_cache: Option<RawSnapshotCache>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawAccountSpec {
    pub label: String,
    pub account_id: String,
    #[serde(default)]
    pub executable: bool,
    /// Base64 account data used instead of fetching.
    pub data_override: Option<String>,
    /// Per-account cluster override.
    pub cluster: Option<String>,
    pub lamports: Option<u64>,
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawProgramSpec {
    pub label: String,
    pub program_id: String,
    pub deploy_path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawRetry {
    pub retries: Option<usize>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawSnapshotCache {
    #[serde(default)]
    pub persist: bool,
    pub dir: Option<PathBuf>,
}

impl RawConfig {
    pub fn from_json_str(s: &str, origin: &Path) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text, path)
    }
}

/// Home directory for state that outlives a ledger (the persisted snapshot cache).
pub fn sandbox_home() -> PathBuf {
    env_var::<PathBuf>(HOME_ENV).unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".localnet-sandbox")
    })
}

/// Default persisted snapshot cache location.
pub fn default_snapshot_dir() -> PathBuf {
    sandbox_home().join("snapshots")
}

/// Default ledger location under the system temp directory.
pub fn default_ledger_dir() -> PathBuf {
    std::env::temp_dir().join("localnet-sandbox").join("ledger")
}
