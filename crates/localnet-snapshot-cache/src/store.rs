//! Filesystem-backed snapshot store.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

use crate::paths::{
    atomic_write, atomic_write_json, endpoint_root, snapshot_data_path, snapshot_meta_path,
};
use crate::snapshot::{AccountSnapshot, SnapshotKey, SnapshotMeta};

/// Filesystem snapshot store with sharded directory layout.
///
/// Lives outside any ledger directory so it survives ledger resets.
#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
    cache_root: PathBuf,
}

impl FsSnapshotStore {
    /// Create a new store rooted at `cache_root`, creating the directory.
    pub fn new<P: AsRef<Path>>(cache_root: P) -> Result<Self> {
        let cache_root = cache_root.as_ref().to_path_buf();
        std::fs::create_dir_all(&cache_root)
            .map_err(|e| anyhow!("Failed to create cache root {}: {}", cache_root.display(), e))?;
        Ok(Self { cache_root })
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    pub fn get(&self, key: &SnapshotKey) -> Result<Option<AccountSnapshot>> {
        let data_path = snapshot_data_path(&self.cache_root, key);
        let meta_path = snapshot_meta_path(&self.cache_root, key);

        // Metadata is written last, so its presence marks a complete entry.
        if !data_path.exists() || !meta_path.exists() {
            return Ok(None);
        }

        let data = std::fs::read(&data_path)
            .map_err(|e| anyhow!("Failed to read data file {}: {}", data_path.display(), e))?;
        let meta_json = std::fs::read_to_string(&meta_path)
            .map_err(|e| anyhow!("Failed to read metadata file {}: {}", meta_path.display(), e))?;
        let meta: SnapshotMeta = serde_json::from_str(&meta_json)
            .map_err(|e| anyhow!("Failed to parse metadata JSON: {}", e))?;

        if meta.data_len != data.len() || meta.address != key.address {
            return Err(anyhow!(
                "Snapshot {} is inconsistent with its metadata",
                data_path.display()
            ));
        }

        Ok(Some(AccountSnapshot::from_parts(meta, data)))
    }

    /// Persist a snapshot. Existing entries are left untouched.
    pub fn put(&self, key: &SnapshotKey, snapshot: &AccountSnapshot) -> Result<()> {
        let data_path = snapshot_data_path(&self.cache_root, key);
        let meta_path = snapshot_meta_path(&self.cache_root, key);

        if data_path.exists() && meta_path.exists() {
            return Ok(());
        }

        atomic_write(&data_path, &snapshot.data)?;
        atomic_write_json(&meta_path, &snapshot.meta())?;
        Ok(())
    }

    pub fn has(&self, key: &SnapshotKey) -> bool {
        snapshot_data_path(&self.cache_root, key).exists()
            && snapshot_meta_path(&self.cache_root, key).exists()
    }

    /// Drop every snapshot fetched from `endpoint`.
    pub fn remove_endpoint(&self, endpoint: &str) -> Result<()> {
        let dir = endpoint_root(&self.cache_root, endpoint);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow!("Failed to remove {}: {}", dir.display(), e)),
        }
    }

    /// Remove every persisted snapshot.
    pub fn clear(&self) -> Result<()> {
        for entry in std::fs::read_dir(&self.cache_root)? {
            let path = entry?.path();
            if path.is_dir() {
                std::fs::remove_dir_all(&path)
                    .map_err(|e| anyhow!("Failed to remove {}: {}", path.display(), e))?;
            }
        }
        Ok(())
    }

    /// Number of persisted snapshots (walks the directory tree).
    pub fn count(&self) -> Result<usize> {
        fn walk(dir: &Path, total: &mut usize) -> std::io::Result<()> {
            for entry in std::fs::read_dir(dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    walk(&path, total)?;
                } else if path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(".meta.json"))
                {
                    *total += 1;
                }
            }
            Ok(())
        }
        let mut total = 0;
        walk(&self.cache_root, &mut total)?;
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use localnet_sandbox_types::{Commitment, Pubkey};
    use tempfile::TempDir;

    fn sample(endpoint: &str) -> (SnapshotKey, AccountSnapshot) {
        let address: Pubkey = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263".parse().unwrap();
        let key = SnapshotKey::new(endpoint, address, Commitment::Confirmed);
        let snap = AccountSnapshot {
            address,
            lamports: 1_461_600,
            owner: Pubkey::system_program(),
            executable: false,
            rent_epoch: u64::MAX,
            data: vec![9, 8, 7],
            commitment: Commitment::Confirmed,
            fetched_at: Utc::now(),
        };
        (key, snap)
    }

    #[test]
    fn test_put_and_get() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FsSnapshotStore::new(temp_dir.path())?;
        let (key, snap) = sample("https://api.devnet.solana.com");

        assert!(store.get(&key)?.is_none());
        store.put(&key, &snap)?;
        let loaded = store.get(&key)?.expect("snapshot should exist");
        assert_eq!(loaded, snap);
        assert!(store.has(&key));
        assert_eq!(store.count()?, 1);
        Ok(())
    }

    #[test]
    fn test_put_does_not_overwrite() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FsSnapshotStore::new(temp_dir.path())?;
        let (key, snap) = sample("https://a");
        store.put(&key, &snap)?;

        let mut changed = snap.clone();
        changed.data = vec![0; 10];
        store.put(&key, &changed)?;

        assert_eq!(store.get(&key)?.unwrap().data, snap.data);
        Ok(())
    }

    #[test]
    fn test_remove_endpoint_only_touches_that_endpoint() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FsSnapshotStore::new(temp_dir.path())?;
        let (key_a, snap_a) = sample("https://a");
        let (key_b, snap_b) = sample("https://b");
        store.put(&key_a, &snap_a)?;
        store.put(&key_b, &snap_b)?;

        store.remove_endpoint("https://a")?;
        store.remove_endpoint("https://never-used")?;

        assert!(!store.has(&key_a));
        assert!(store.has(&key_b));
        Ok(())
    }
}
