//! Account cloning from a remote cluster.
//!
//! This crate provides [`AccountFetcher`], which turns a list of
//! [`CloneTask`]s into account snapshots ready to be written into a local
//! ledger.
//!
//! - Independent tasks run concurrently, bounded by a configurable ceiling.
//! - Each remote read goes through the shared [`SnapshotCache`] first.
//! - Transient failures (timeouts, rate limiting) are retried with
//!   exponential backoff; permanent ones fail the task immediately.
//! - A failed task never cancels its siblings; the [`FetchReport`] lists
//!   every success and failure once all tasks have been attempted.
//!
//! # Example
//!
//! ```ignore
//! use localnet_state_fetcher::{AccountFetcher, FetchOptions, RpcAccountSource};
//!
//! let fetcher = AccountFetcher::new(Arc::new(RpcAccountSource::new()), cache, FetchOptions::default());
//! let report = fetcher.fetch_all(&plan.clone_tasks, &cancel).await;
//! if !report.is_complete() {
//!     for failure in &report.failed { eprintln!("{}: {}", failure.label, failure.error); }
//! }
//! ```
//!
//! [`SnapshotCache`]: localnet_snapshot_cache::SnapshotCache

pub mod error;
pub mod fetcher;
pub mod program_data;
pub mod report;
pub mod retry;
pub mod source;
pub mod task;

pub use error::FetchError;
pub use fetcher::{AccountFetcher, FetchOptions};
pub use report::{AccountOrigin, AccountRole, ClonedAccount, ClonedTask, FetchReport, FetchStats, TaskFailure};
pub use source::{AccountSource, RemoteAccount, RpcAccountSource};
pub use task::{AccountOverride, CloneTask, FetchTarget};
