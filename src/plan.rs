//! Resolution of a [`RawConfig`] into an immutable [`ExecutionPlan`].

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use localnet_sandbox_types::{encoding, env_flag_set, Commitment, Pubkey, RetryConfig};
use localnet_state_fetcher::{AccountOverride, CloneTask, FetchOptions};
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::config::{self, RawAccountSpec, RawConfig, RawProgramSpec, CI_ENV};
use crate::error::ConfigError;

pub const DEFAULT_CLUSTER_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://127.0.0.1:8899";
pub const DEFAULT_VALIDATOR_BINARY: &str = "solana-test-validator";

/// Validator settings after defaults and environment are applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorConfig {
    pub cluster_rpc_url: String,
    pub cluster_websocket_url: Option<String>,
    pub local_rpc_url: String,
    pub rpc_port: u16,
    pub commitment: Commitment,
    pub ledger_dir: PathBuf,
    pub reset_ledger: bool,
    pub verify_fees: bool,
    pub kill_running_validators: bool,
    pub detached: bool,
}

/// Timing and concurrency knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub fetch_concurrency: usize,
    pub retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub request_timeout_secs: u64,
    pub readiness_timeout_secs: u64,
    pub readiness_poll_ms: u64,
    pub shutdown_grace_secs: u64,
    pub validator_binary: String,
    /// Set when the snapshot cache persists across processes.
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for Policy {
    fn default() -> Self {
        let retry = RetryConfig::default();
        Self {
            fetch_concurrency: FetchOptions::DEFAULT_CONCURRENCY,
            retries: retry.retries,
            initial_backoff_ms: retry.initial_backoff.as_millis() as u64,
            max_backoff_ms: retry.max_backoff.as_millis() as u64,
            request_timeout_secs: 30,
            readiness_timeout_secs: 60,
            readiness_poll_ms: 500,
            shutdown_grace_secs: 10,
            validator_binary: DEFAULT_VALIDATOR_BINARY.to_string(),
            snapshot_dir: None,
        }
    }
}

impl Policy {
    pub fn retry(&self) -> RetryConfig {
        RetryConfig::new(self.retries, self.initial_backoff_ms, self.max_backoff_ms)
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            concurrency: self.fetch_concurrency,
            retry: self.retry(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_secs)
    }

    pub fn readiness_poll(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// A program deployed from a local artifact rather than cloned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployTask {
    pub label: String,
    pub program_id: Pubkey,
    pub artifact: PathBuf,
}

/// Everything a run needs, validated. Built once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    pub validator: ValidatorConfig,
    pub policy: Policy,
    pub clone_tasks: Vec<CloneTask>,
    pub deploy_tasks: Vec<DeployTask>,
}

impl ExecutionPlan {
    /// Number of accounts the fetch phase will produce.
    pub fn clone_target_count(&self) -> usize {
        self.clone_tasks.iter().map(|t| t.fetch_targets().len()).sum()
    }
}

/// Validates raw configuration into an [`ExecutionPlan`].
///
/// Resolution stops at the first invalid field. Task order follows the
/// configuration, so the same input always yields the same plan.
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    ci: bool,
    base_dir: Option<PathBuf>,
}

impl ConfigResolver {
    /// Resolver reading the CI indicator from the environment.
    pub fn from_env() -> Self {
        Self {
            ci: env_flag_set(CI_ENV),
            base_dir: None,
        }
    }

    pub fn with_ci(mut self, ci: bool) -> Self {
        self.ci = ci;
        self
    }

    /// Directory relative `deployPath` and `ledgerDir` values are resolved against.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn resolve(&self, raw: &RawConfig) -> Result<ExecutionPlan, ConfigError> {
        let validator = self.resolve_validator(raw)?;
        let policy = self.resolve_policy(raw)?;

        let mut labels: HashSet<&str> = HashSet::new();
        let mut addresses: HashMap<Pubkey, &str> = HashMap::new();

        let mut clone_tasks = Vec::with_capacity(raw.accounts.len());
        for (index, spec) in raw.accounts.iter().enumerate() {
            claim_label(&mut labels, &spec.label, "account", index)?;
            let task = resolve_account(spec, &validator)?;
            claim_address(&mut addresses, task.address, &spec.label)?;
            clone_tasks.push(task);
        }

        let mut deploy_tasks = Vec::with_capacity(raw.programs.len());
        for (index, spec) in raw.programs.iter().enumerate() {
            claim_label(&mut labels, &spec.label, "program", index)?;
            let task = self.resolve_program(spec)?;
            claim_address(&mut addresses, task.program_id, &spec.label)?;
            deploy_tasks.push(task);
        }

        debug!(
            accounts = clone_tasks.len(),
            programs = deploy_tasks.len(),
            detached = validator.detached,
            "resolved execution plan"
        );
        Ok(ExecutionPlan {
            validator,
            policy,
            clone_tasks,
            deploy_tasks,
        })
    }

    fn resolve_validator(&self, raw: &RawConfig) -> Result<ValidatorConfig, ConfigError> {
        let cluster_rpc_url = raw
            .cluster_rpc_url
            .clone()
            .unwrap_or_else(|| DEFAULT_CLUSTER_RPC_URL.to_string());
        check_url("clusterRpcUrl", &cluster_rpc_url, &["http", "https"])?;

        let local_rpc_url = raw
            .local_rpc_url
            .clone()
            .unwrap_or_else(|| DEFAULT_LOCAL_RPC_URL.to_string());
        let local = check_url("localRpcUrl", &local_rpc_url, &["http", "https"])?;
        let rpc_port = local
            .port_or_known_default()
            .ok_or_else(|| ConfigError::InvalidField {
                field: "localRpcUrl",
                message: "no port".to_string(),
            })?;
        let cluster_websocket_url =
            resolve_websocket_url(raw.cluster_websocket_url.as_deref(), &local, rpc_port)?;

        let commitment = match raw.commitment.as_deref() {
            None => Commitment::default(),
            Some(c) => c
                .parse()
                .map_err(|_| ConfigError::InvalidCommitment(c.to_string()))?,
        };

        let ledger_dir = raw
            .ledger_dir
            .as_deref()
            .map(|p| self.absolutize(p))
            .unwrap_or_else(config::default_ledger_dir);
        if ledger_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidField {
                field: "ledgerDir",
                message: "must not be empty".to_string(),
            });
        }

        Ok(ValidatorConfig {
            cluster_rpc_url,
            cluster_websocket_url,
            local_rpc_url,
            rpc_port,
            commitment,
            ledger_dir,
            reset_ledger: raw.reset_ledger.unwrap_or(true),
            verify_fees: raw.verify_fees.unwrap_or(false),
            kill_running_validators: raw.kill_running_validators.unwrap_or(true),
            detached: raw.detached.unwrap_or(self.ci),
        })
    }

    fn resolve_policy(&self, raw: &RawConfig) -> Result<Policy, ConfigError> {
        let defaults = Policy::default();
        let retry = raw.retry.clone().unwrap_or_default();
        let policy = Policy {
            fetch_concurrency: raw.fetch_concurrency.unwrap_or(defaults.fetch_concurrency),
            retries: retry.retries.unwrap_or(defaults.retries),
            initial_backoff_ms: retry.initial_backoff_ms.unwrap_or(defaults.initial_backoff_ms),
            max_backoff_ms: retry.max_backoff_ms.unwrap_or(defaults.max_backoff_ms),
            request_timeout_secs: raw
                .request_timeout_secs
                .unwrap_or(defaults.request_timeout_secs),
            readiness_timeout_secs: raw
                .readiness_timeout_secs
                .unwrap_or(defaults.readiness_timeout_secs),
            readiness_poll_ms: raw.readiness_poll_ms.unwrap_or(defaults.readiness_poll_ms),
            shutdown_grace_secs: raw
                .shutdown_grace_secs
                .unwrap_or(defaults.shutdown_grace_secs),
            validator_binary: raw
                .validator_binary
                .clone()
                .unwrap_or(defaults.validator_binary),
            snapshot_dir: match &raw.snapshot_cache {
                Some(sc) if sc.persist => Some(
                    sc.dir
                        .as_deref()
                        .map(|p| self.absolutize(p))
                        .unwrap_or_else(config::default_snapshot_dir),
                ),
                _ => None,
            },
        };

        positive("fetchConcurrency", policy.fetch_concurrency as u64)?;
        positive("requestTimeoutSecs", policy.request_timeout_secs)?;
        positive("readinessTimeoutSecs", policy.readiness_timeout_secs)?;
        positive("readinessPollMs", policy.readiness_poll_ms)?;
        if policy.initial_backoff_ms > policy.max_backoff_ms {
            return Err(ConfigError::InvalidField {
                field: "retry",
                message: format!(
                    "initialBackoffMs {} exceeds maxBackoffMs {}",
                    policy.initial_backoff_ms, policy.max_backoff_ms
                ),
            });
        }
        if policy.validator_binary.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                field: "validatorBinary",
                message: "must not be empty".to_string(),
            });
        }
        Ok(policy)
    }

    fn resolve_program(&self, spec: &RawProgramSpec) -> Result<DeployTask, ConfigError> {
        let program_id = parse_key(&spec.label, "programId", &spec.program_id)?;
        let artifact = self.absolutize(&spec.deploy_path);
        let missing = |message: String| ConfigError::MissingArtifact {
            label: spec.label.clone(),
            path: artifact.clone(),
            message,
        };
        let meta = std::fs::metadata(&artifact).map_err(|e| missing(e.to_string()))?;
        if !meta.is_file() {
            return Err(missing("not a regular file".to_string()));
        }
        if meta.len() == 0 {
            return Err(ConfigError::EmptyArtifact {
                label: spec.label.clone(),
                path: artifact,
            });
        }
        std::fs::File::open(&artifact).map_err(|e| missing(e.to_string()))?;
        Ok(DeployTask {
            label: spec.label.clone(),
            program_id,
            artifact,
        })
    }

    fn absolutize(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

fn resolve_account(
    spec: &RawAccountSpec,
    validator: &ValidatorConfig,
) -> Result<CloneTask, ConfigError> {
    let address = parse_key(&spec.label, "accountId", &spec.account_id)?;
    let invalid = |field: &'static str, message: String| ConfigError::InvalidAccountField {
        label: spec.label.clone(),
        field,
        message,
    };

    let endpoint = match &spec.cluster {
        Some(url) => {
            check_url("cluster", url, &["http", "https"])
                .map_err(|_| invalid("cluster", format!("`{}` is not an http(s) URL", url)))?;
            url.clone()
        }
        None => validator.cluster_rpc_url.clone(),
    };

    let data_override = match &spec.data_override {
        None => {
            if spec.lamports.is_some() || spec.owner.is_some() {
                return Err(invalid(
                    "dataOverride",
                    "lamports and owner require dataOverride".to_string(),
                ));
            }
            None
        }
        Some(_) if spec.executable => {
            return Err(invalid(
                "dataOverride",
                "cannot override data of an executable account".to_string(),
            ));
        }
        Some(b64) => {
            let data = encoding::base64_decode(b64.trim())
                .map_err(|e| invalid("dataOverride", e.to_string()))?;
            let owner = spec
                .owner
                .as_deref()
                .map(|o| parse_key(&spec.label, "owner", o))
                .transpose()?;
            Some(AccountOverride {
                data,
                lamports: spec.lamports,
                owner,
            })
        }
    };

    Ok(CloneTask {
        label: spec.label.clone(),
        address,
        endpoint,
        commitment: validator.commitment,
        executable: spec.executable,
        data_override,
    })
}

fn claim_label<'a>(
    labels: &mut HashSet<&'a str>,
    label: &'a str,
    kind: &'static str,
    index: usize,
) -> Result<(), ConfigError> {
    if label.trim().is_empty() {
        return Err(ConfigError::EmptyLabel { kind, index });
    }
    if !labels.insert(label) {
        return Err(ConfigError::DuplicateLabel(label.to_string()));
    }
    Ok(())
}

fn claim_address<'a>(
    addresses: &mut HashMap<Pubkey, &'a str>,
    address: Pubkey,
    label: &'a str,
) -> Result<(), ConfigError> {
    if let Some(other) = addresses.insert(address, label) {
        return Err(ConfigError::DuplicateAddress {
            label: label.to_string(),
            other: other.to_string(),
            address: address.to_string(),
        });
    }
    Ok(())
}

fn parse_key(label: &str, field: &'static str, value: &str) -> Result<Pubkey, ConfigError> {
    value.parse().map_err(|e: localnet_sandbox_types::ParsePubkeyError| {
        ConfigError::InvalidKey {
            label: label.to_string(),
            field,
            value: value.to_string(),
            message: e.to_string(),
        }
    })
}

/// The validator serves pubsub on the port after its RPC port. A configured
/// URL must name that port; an empty one leaves the endpoint unreported.
fn resolve_websocket_url(
    configured: Option<&str>,
    local: &Url,
    rpc_port: u16,
) -> Result<Option<String>, ConfigError> {
    let field = "clusterWebsocketUrl";
    let port = rpc_port.checked_add(1).ok_or_else(|| ConfigError::InvalidField {
        field: "localRpcUrl",
        message: format!("port {} leaves no room for the websocket port", rpc_port),
    })?;
    let ws = match configured.map(str::trim) {
        Some("") => return Ok(None),
        Some(ws) => ws,
        None => {
            let scheme = if local.scheme() == "https" { "wss" } else { "ws" };
            let host = local.host_str().unwrap_or("127.0.0.1");
            return Ok(Some(format!("{}://{}:{}", scheme, host, port)));
        }
    };

    let url = check_url(field, ws, &["ws", "wss"])?;
    if url.port_or_known_default() != Some(port) {
        return Err(ConfigError::InvalidField {
            field,
            message: format!("`{}` must use the validator websocket port {}", ws, port),
        });
    }
    if url.host_str() != local.host_str() {
        return Err(ConfigError::InvalidField {
            field,
            message: format!(
                "`{}` must use the local validator host {}",
                ws,
                local.host_str().unwrap_or_default()
            ),
        });
    }
    Ok(Some(ws.to_string()))
}

fn check_url(field: &'static str, value: &str, schemes: &[&str]) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidField {
        field,
        message: format!("`{}`: {}", value, e),
    })?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::InvalidField {
            field,
            message: format!("`{}` must use one of {}", value, schemes.join(", ")),
        });
    }
    Ok(url)
}

fn positive(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidField {
            field,
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}
