//! Shared types for the localnet-sandbox workspace.
//!
//! This crate provides foundational types used across multiple crates in the workspace,
//! breaking circular dependency chains.
//!
//! - [`Pubkey`] - 32-byte account address with base58 text form
//! - [`Commitment`] - finality level used for every remote read
//! - [`RetryConfig`] - retry/backoff policy for network operations

pub mod commitment;
pub mod encoding;
pub mod env_utils;
pub mod pubkey;

pub use commitment::{Commitment, ParseCommitmentError};
pub use env_utils::{env_bool, env_flag_set, env_var, env_var_or};
pub use pubkey::{ParsePubkeyError, Pubkey, BPF_UPGRADEABLE_LOADER_ID, SYSTEM_PROGRAM_ID};

use std::time::Duration;

/// Configuration for retry behavior on network operations.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Number of retry attempts after the first try.
    pub retries: usize,
    /// Initial backoff duration between retries.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
}

impl RetryConfig {
    /// Create a new RetryConfig with the specified parameters.
    pub fn new(retries: usize, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms),
        }
    }

    /// Total number of attempts, counting the first one.
    pub fn max_attempts(&self) -> usize {
        self.retries + 1
    }

    /// Backoff to sleep after the given failed attempt (1-based).
    ///
    /// Doubles from `initial_backoff` and is clamped at `max_backoff`.
    pub fn backoff_for(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(31) as u32;
        let factor = 1u32 << shift;
        self.initial_backoff
            .checked_mul(factor)
            .map(|d| d.min(self.max_backoff))
            .unwrap_or(self.max_backoff)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 2,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_millis(4000),
        }
    }
}
