//! Outcome of a fetch phase.

use std::sync::Arc;

use localnet_sandbox_types::Pubkey;
use localnet_snapshot_cache::AccountSnapshot;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Which of a task's targets an account is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    Account,
    ProgramData,
}

/// Where the account bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountOrigin {
    Cache,
    Network,
    Override,
}

#[derive(Debug, Clone)]
pub struct ClonedAccount {
    pub label: String,
    pub role: AccountRole,
    pub snapshot: Arc<AccountSnapshot>,
    pub origin: AccountOrigin,
}

/// Every account a successful task produced, in fetch-target order.
#[derive(Debug, Clone)]
pub struct ClonedTask {
    pub label: String,
    pub accounts: Vec<ClonedAccount>,
}

#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub label: String,
    pub address: Pubkey,
    pub error: FetchError,
}

/// Counters for one fetch phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStats {
    pub tasks: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub from_cache: usize,
    pub from_network: usize,
    pub from_override: usize,
    pub elapsed_ms: u64,
}

impl FetchStats {
    pub(crate) fn record(&mut self, origin: AccountOrigin) {
        match origin {
            AccountOrigin::Cache => self.from_cache += 1,
            AccountOrigin::Network => self.from_network += 1,
            AccountOrigin::Override => self.from_override += 1,
        }
    }
}

/// Result of attempting every clone task.
///
/// Successes and failures are sorted by label so reports are stable
/// regardless of completion order.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub succeeded: Vec<ClonedTask>,
    pub failed: Vec<TaskFailure>,
    pub stats: FetchStats,
}

impl FetchReport {
    /// True when every task succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_labels(&self) -> Vec<String> {
        self.failed.iter().map(|f| f.label.clone()).collect()
    }

    /// All cloned accounts across successful tasks.
    pub fn accounts(&self) -> impl Iterator<Item = &ClonedAccount> {
        self.succeeded.iter().flat_map(|t| t.accounts.iter())
    }

    /// Whether any failure was caused by cancellation.
    pub fn was_cancelled(&self) -> bool {
        self.failed
            .iter()
            .any(|f| matches!(f.error, FetchError::Cancelled))
    }
}
