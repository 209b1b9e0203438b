//! Snapshot cache for cloned account state.
//!
//! This crate provides:
//! - `SnapshotCache`: in-memory cache keyed by `(endpoint, address, commitment)`
//! - `FsSnapshotStore`: opt-in sharded filesystem persistence for the cache
//! - `CacheMetrics`: hit/miss counters for reporting

pub mod cache;
pub mod metrics;
pub mod paths;
pub mod snapshot;
pub mod store;

pub use cache::SnapshotCache;
pub use metrics::{CacheMetrics, MetricsSnapshot};
pub use snapshot::{AccountSnapshot, SnapshotKey, SnapshotMeta};
pub use store::FsSnapshotStore;
