//! In-memory snapshot cache with opt-in persistence.
//!
//! Entries are keyed by `(endpoint, address, commitment)` and never expire on
//! their own; they go away only through [`SnapshotCache::invalidate_endpoint`]
//! or [`SnapshotCache::clear`]. An entry is immutable once written: a second
//! `put` for the same key keeps the first value.
//!
//! # Example
//!
//! ```ignore
//! use localnet_snapshot_cache::{SnapshotCache, SnapshotKey};
//!
//! let cache = SnapshotCache::new();
//! if cache.get(&key).is_none() {
//!     let snapshot = fetch(&key)?;
//!     cache.put(key, snapshot);
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::metrics::CacheMetrics;
use crate::snapshot::{AccountSnapshot, SnapshotKey};
use crate::store::FsSnapshotStore;

/// Thread-safe snapshot cache. Shared across fetch workers behind an `Arc`.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    entries: RwLock<HashMap<SnapshotKey, Arc<AccountSnapshot>>>,
    store: Option<FsSnapshotStore>,
    metrics: CacheMetrics,
}

impl SnapshotCache {
    /// Create a process-lifetime cache (no persistence).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache backed by a filesystem store at `dir`.
    ///
    /// Persisted entries are loaded lazily on lookup.
    pub fn with_store(dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            entries: RwLock::new(HashMap::new()),
            store: Some(FsSnapshotStore::new(dir)?),
            metrics: CacheMetrics::default(),
        })
    }

    pub fn store(&self) -> Option<&FsSnapshotStore> {
        self.store.as_ref()
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Look up a snapshot. Never blocks on I/O while holding the lock.
    pub fn get(&self, key: &SnapshotKey) -> Option<Arc<AccountSnapshot>> {
        if let Some(hit) = self.entries.read().get(key).cloned() {
            self.metrics.record_memory_hit();
            return Some(hit);
        }

        if let Some(store) = &self.store {
            match store.get(key) {
                Ok(Some(snapshot)) => {
                    self.metrics.record_disk_hit();
                    let mut entries = self.entries.write();
                    let entry = entries
                        .entry(key.clone())
                        .or_insert_with(|| Arc::new(snapshot));
                    return Some(entry.clone());
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(address = %key.address, error = %e, "ignoring unreadable persisted snapshot");
                }
            }
        }

        self.metrics.record_miss();
        None
    }

    /// Insert a snapshot, returning the value now held for `key`.
    ///
    /// If another writer got there first, its value is kept and returned.
    pub fn put(&self, key: SnapshotKey, snapshot: AccountSnapshot) -> Arc<AccountSnapshot> {
        let (stored, inserted) = {
            let mut entries = self.entries.write();
            match entries.get(&key) {
                Some(existing) => (existing.clone(), false),
                None => {
                    let arc = Arc::new(snapshot);
                    entries.insert(key.clone(), arc.clone());
                    (arc, true)
                }
            }
        };

        if inserted {
            self.metrics.record_insert();
            if let Some(store) = &self.store {
                if let Err(e) = store.put(&key, &stored) {
                    warn!(address = %key.address, error = %e, "failed to persist snapshot");
                }
            }
        }
        stored
    }

    pub fn contains(&self, key: &SnapshotKey) -> bool {
        self.entries.read().contains_key(key) || self.store.as_ref().is_some_and(|s| s.has(key))
    }

    /// Number of entries held in memory.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry fetched from `endpoint` (memory and disk).
    ///
    /// Returns the number of in-memory entries removed.
    pub fn invalidate_endpoint(&self, endpoint: &str) -> Result<usize> {
        let removed = {
            let mut entries = self.entries.write();
            let before = entries.len();
            entries.retain(|key, _| key.endpoint != endpoint);
            before - entries.len()
        };
        if let Some(store) = &self.store {
            store.remove_endpoint(endpoint)?;
        }
        debug!(endpoint, removed, "invalidated snapshot cache entries");
        Ok(removed)
    }

    /// Clear all cached data, including the persisted store.
    pub fn clear(&self) -> Result<()> {
        self.entries.write().clear();
        if let Some(store) = &self.store {
            store.clear()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use localnet_sandbox_types::{Commitment, Pubkey};
    use tempfile::TempDir;

    fn test_snapshot(id_suffix: u8, data: Vec<u8>) -> (SnapshotKey, AccountSnapshot) {
        let mut bytes = [7u8; 32];
        bytes[31] = id_suffix;
        let address = Pubkey::new(bytes);
        let key = SnapshotKey::new("https://api.devnet.solana.com", address, Commitment::Confirmed);
        let snap = AccountSnapshot {
            address,
            lamports: 10,
            owner: Pubkey::system_program(),
            executable: false,
            rent_epoch: 0,
            data,
            commitment: Commitment::Confirmed,
            fetched_at: Utc::now(),
        };
        (key, snap)
    }

    #[test]
    fn test_cache_miss_returns_none() {
        let cache = SnapshotCache::new();
        let (key, _) = test_snapshot(1, vec![]);
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.metrics().snapshot().misses, 1);
    }

    #[test]
    fn test_put_then_get_hits_memory() {
        let cache = SnapshotCache::new();
        let (key, snap) = test_snapshot(1, vec![1, 2, 3]);
        cache.put(key.clone(), snap.clone());

        let hit = cache.get(&key).unwrap();
        assert_eq!(*hit, snap);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.metrics().snapshot().memory_hits, 1);
    }

    #[test]
    fn test_first_writer_wins() {
        let cache = SnapshotCache::new();
        let (key, first) = test_snapshot(1, vec![1]);
        let (_, second) = test_snapshot(1, vec![2]);

        cache.put(key.clone(), first);
        let kept = cache.put(key.clone(), second);

        assert_eq!(kept.data, vec![1]);
        assert_eq!(cache.get(&key).unwrap().data, vec![1]);
        assert_eq!(cache.metrics().snapshot().inserts, 1);
    }

    #[test]
    fn test_commitment_is_part_of_key() {
        let cache = SnapshotCache::new();
        let (key, snap) = test_snapshot(1, vec![1]);
        cache.put(key.clone(), snap);

        let finalized = SnapshotKey::new(key.endpoint.clone(), key.address, Commitment::Finalized);
        assert!(cache.get(&finalized).is_none());
    }

    #[test]
    fn test_invalidate_endpoint() {
        let cache = SnapshotCache::new();
        let (key, snap) = test_snapshot(1, vec![1]);
        cache.put(key.clone(), snap.clone());
        let other = SnapshotKey::new("https://other", key.address, key.commitment);
        cache.put(other.clone(), snap);

        let removed = cache.invalidate_endpoint(&key.endpoint).unwrap();
        assert_eq!(removed, 1);
        assert!(cache.get(&key).is_none());
        assert!(cache.get(&other).is_some());
    }

    #[test]
    fn test_persisted_entries_survive_new_cache() -> Result<()> {
        let dir = TempDir::new()?;
        let (key, snap) = test_snapshot(3, vec![4, 5, 6]);
        {
            let cache = SnapshotCache::with_store(dir.path())?;
            cache.put(key.clone(), snap.clone());
        }

        let cache = SnapshotCache::with_store(dir.path())?;
        assert!(cache.is_empty());
        let hit = cache.get(&key).expect("persisted snapshot");
        assert_eq!(*hit, snap);
        assert_eq!(cache.metrics().snapshot().disk_hits, 1);
        // Loaded into memory on first lookup
        assert_eq!(cache.len(), 1);
        Ok(())
    }

    #[test]
    fn test_concurrent_puts_keep_one_entry() {
        let cache = Arc::new(SnapshotCache::new());
        let (key, snap) = test_snapshot(9, vec![1, 1]);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let key = key.clone();
                let snap = snap.clone();
                std::thread::spawn(move || {
                    cache.put(key.clone(), snap);
                    cache.get(&key).is_some()
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.metrics().snapshot().inserts, 1);
    }
}
