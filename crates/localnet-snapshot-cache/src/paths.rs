//! Path utilities for the sharded snapshot layout.
//!
//! ```text
//! <root>/<endpoint-hash>/<commitment>/<aa>/<address-hex>.bin
//! <root>/<endpoint-hash>/<commitment>/<aa>/<address-hex>.meta.json
//! ```

use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::snapshot::SnapshotKey;

/// Stable directory name for an endpoint URL (first 16 hex chars of its SHA-256).
///
/// URLs can carry API keys in their path, so they are never written verbatim.
pub fn endpoint_dir_name(endpoint: &str) -> String {
    let digest = Sha256::digest(endpoint.trim_end_matches('/').as_bytes());
    hex::encode(&digest[..8])
}

/// Root directory holding every snapshot fetched from one endpoint.
pub fn endpoint_root(cache_root: &Path, endpoint: &str) -> PathBuf {
    cache_root.join(endpoint_dir_name(endpoint))
}

fn shard_dir(cache_root: &Path, key: &SnapshotKey) -> (PathBuf, String) {
    let hex = key.address.to_hex();
    let dir = endpoint_root(cache_root, &key.endpoint)
        .join(key.commitment.as_str())
        .join(&hex[0..2]);
    (dir, hex)
}

/// Path of the raw account data file.
pub fn snapshot_data_path(cache_root: &Path, key: &SnapshotKey) -> PathBuf {
    let (dir, hex) = shard_dir(cache_root, key);
    dir.join(format!("{}.bin", hex))
}

/// Path of the metadata file.
pub fn snapshot_meta_path(cache_root: &Path, key: &SnapshotKey) -> PathBuf {
    let (dir, hex) = shard_dir(cache_root, key);
    dir.join(format!("{}.meta.json", hex))
}

/// Ensure all parent directories exist for a path.
pub fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow!("Failed to create directory {}: {}", parent.display(), e))?;
    }
    Ok(())
}

/// Write a file atomically (write to .tmp, then rename).
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    ensure_parent_dirs(path)?;
    let tmp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|s| s.to_str()).unwrap_or("tmp")
    ));
    std::fs::write(&tmp_path, contents)
        .map_err(|e| anyhow!("Failed to write temp file {}: {}", tmp_path.display(), e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        anyhow!(
            "Failed to rename {} to {}: {}",
            tmp_path.display(),
            path.display(),
            e
        )
    })?;
    Ok(())
}

/// Write a JSON file atomically (compact format, no pretty printing).
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec(value).map_err(|e| anyhow!("Failed to serialize JSON: {}", e))?;
    atomic_write(path, &json)
}
