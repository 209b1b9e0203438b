//! Bounded, retrying account cloning.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use localnet_sandbox_types::{Pubkey, RetryConfig};
use localnet_snapshot_cache::{AccountSnapshot, SnapshotCache, SnapshotKey};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::program_data::{program_data_address, rent_exempt_minimum};
use crate::report::{
    AccountOrigin, AccountRole, ClonedAccount, ClonedTask, FetchReport, FetchStats, TaskFailure,
};
use crate::retry::with_retries;
use crate::source::AccountSource;
use crate::task::{AccountOverride, CloneTask};

/// Tuning for a fetch phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Maximum number of tasks in flight at once.
    pub concurrency: usize,
    pub retry: RetryConfig,
}

impl FetchOptions {
    pub const DEFAULT_CONCURRENCY: usize = 8;
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            concurrency: Self::DEFAULT_CONCURRENCY,
            retry: RetryConfig::default(),
        }
    }
}

/// Clones accounts from remote clusters through a shared [`SnapshotCache`].
pub struct AccountFetcher {
    source: Arc<dyn AccountSource>,
    cache: Arc<SnapshotCache>,
    options: FetchOptions,
}

impl AccountFetcher {
    pub fn new(
        source: Arc<dyn AccountSource>,
        cache: Arc<SnapshotCache>,
        options: FetchOptions,
    ) -> Self {
        Self {
            source,
            cache,
            options,
        }
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    pub fn options(&self) -> FetchOptions {
        self.options
    }

    /// Attempt every task and report the outcome of each.
    ///
    /// A failing task does not stop its siblings. Cancellation makes
    /// in-flight and pending tasks fail with [`FetchError::Cancelled`].
    pub async fn fetch_all(&self, tasks: &[CloneTask], cancel: &CancellationToken) -> FetchReport {
        let started = Instant::now();
        let concurrency = self.options.concurrency.max(1);
        info!(tasks = tasks.len(), concurrency, "fetching accounts");

        let outcomes: Vec<(&CloneTask, Result<Vec<ClonedAccount>, FetchError>)> =
            stream::iter(tasks)
                .map(|task| async move { (task, self.fetch_task(task, cancel).await) })
                .buffer_unordered(concurrency)
                .collect()
                .await;

        let mut report = FetchReport {
            stats: FetchStats {
                tasks: tasks.len(),
                ..FetchStats::default()
            },
            ..FetchReport::default()
        };
        for (task, outcome) in outcomes {
            match outcome {
                Ok(accounts) => {
                    for acct in &accounts {
                        report.stats.record(acct.origin);
                    }
                    report.succeeded.push(ClonedTask {
                        label: task.label.clone(),
                        accounts,
                    });
                }
                Err(error) => {
                    warn!(label = %task.label, address = %task.address, error = %error, "clone task failed");
                    report.failed.push(TaskFailure {
                        label: task.label.clone(),
                        address: task.address,
                        error,
                    });
                }
            }
        }
        report.succeeded.sort_by(|a, b| a.label.cmp(&b.label));
        report.failed.sort_by(|a, b| a.label.cmp(&b.label));
        report.stats.succeeded = report.succeeded.len();
        report.stats.failed = report.failed.len();
        report.stats.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            succeeded = report.stats.succeeded,
            failed = report.stats.failed,
            from_cache = report.stats.from_cache,
            from_network = report.stats.from_network,
            elapsed_ms = report.stats.elapsed_ms,
            "fetch phase finished"
        );
        report
    }

    async fn fetch_task(
        &self,
        task: &CloneTask,
        cancel: &CancellationToken,
    ) -> Result<Vec<ClonedAccount>, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        if let Some(ov) = &task.data_override {
            debug!(label = %task.label, address = %task.address, "using data override");
            return Ok(vec![override_account(task, ov)]);
        }

        let program = self
            .fetch_target(task, task.address, AccountRole::Account, cancel)
            .await?;
        if !task.executable {
            return Ok(vec![program]);
        }

        let programdata = program_data_address(&program.snapshot)?;
        debug!(label = %task.label, program = %task.address, programdata = %programdata, "resolved program data");
        let data = self
            .fetch_target(task, programdata, AccountRole::ProgramData, cancel)
            .await?;
        Ok(vec![program, data])
    }

    /// Read one account through the cache, falling back to the source.
    async fn fetch_target(
        &self,
        task: &CloneTask,
        address: Pubkey,
        role: AccountRole,
        cancel: &CancellationToken,
    ) -> Result<ClonedAccount, FetchError> {
        let key = SnapshotKey::new(task.endpoint.as_str(), address, task.commitment);
        if let Some(snapshot) = self.cache.get(&key) {
            debug!(label = %task.label, address = %address, "cache hit");
            return Ok(ClonedAccount {
                label: task.label.clone(),
                role,
                snapshot,
                origin: AccountOrigin::Cache,
            });
        }

        let source = &self.source;
        let remote = with_retries(self.options.retry, cancel, move |attempt| async move {
            debug!(label = %task.label, address = %address, attempt, "fetching account");
            source
                .fetch_account(&task.endpoint, &address, task.commitment)
                .await?
                .ok_or(FetchError::NotFound(address))
        })
        .await?;

        let snapshot = AccountSnapshot {
            address,
            lamports: remote.lamports,
            owner: remote.owner,
            executable: remote.executable,
            rent_epoch: remote.rent_epoch,
            data: remote.data,
            commitment: task.commitment,
            fetched_at: Utc::now(),
        };
        Ok(ClonedAccount {
            label: task.label.clone(),
            role,
            snapshot: self.cache.put(key, snapshot),
            origin: AccountOrigin::Network,
        })
    }
}

/// Overrides are synthesized locally and never cached.
fn override_account(task: &CloneTask, ov: &AccountOverride) -> ClonedAccount {
    let snapshot = AccountSnapshot {
        address: task.address,
        lamports: ov
            .lamports
            .unwrap_or_else(|| rent_exempt_minimum(ov.data.len())),
        owner: ov.owner.unwrap_or_else(Pubkey::system_program),
        executable: false,
        rent_epoch: 0,
        data: ov.data.clone(),
        commitment: task.commitment,
        fetched_at: Utc::now(),
    };
    ClonedAccount {
        label: task.label.clone(),
        role: AccountRole::Account,
        snapshot: Arc::new(snapshot),
        origin: AccountOrigin::Override,
    }
}
