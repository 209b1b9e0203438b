//! Cached account snapshot types.

use chrono::{DateTime, Utc};
use localnet_sandbox_types::{Commitment, Pubkey};
use serde::{Deserialize, Serialize};

/// Cache key: one account read from one endpoint at one commitment level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotKey {
    pub endpoint: String,
    pub address: Pubkey,
    pub commitment: Commitment,
}

impl SnapshotKey {
    pub fn new(endpoint: impl Into<String>, address: Pubkey, commitment: Commitment) -> Self {
        Self {
            endpoint: endpoint.into(),
            address,
            commitment,
        }
    }
}

/// Account state captured from a cluster (or synthesized from an override).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub address: Pubkey,
    pub lamports: u64,
    pub owner: Pubkey,
    pub executable: bool,
    pub rent_epoch: u64,
    pub data: Vec<u8>,
    /// Commitment level the data was read at.
    pub commitment: Commitment,
    pub fetched_at: DateTime<Utc>,
}

impl AccountSnapshot {
    pub fn meta(&self) -> SnapshotMeta {
        SnapshotMeta {
            address: self.address,
            lamports: self.lamports,
            owner: self.owner,
            executable: self.executable,
            rent_epoch: self.rent_epoch,
            commitment: self.commitment,
            fetched_at: self.fetched_at,
            data_len: self.data.len(),
        }
    }

    /// Rebuild a snapshot from its metadata and raw data bytes.
    pub fn from_parts(meta: SnapshotMeta, data: Vec<u8>) -> Self {
        Self {
            address: meta.address,
            lamports: meta.lamports,
            owner: meta.owner,
            executable: meta.executable,
            rent_epoch: meta.rent_epoch,
            data,
            commitment: meta.commitment,
            fetched_at: meta.fetched_at,
        }
    }
}

/// Metadata for a persisted snapshot (stored separately from the raw bytes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub address: Pubkey,
    pub lamports: u64,
    pub owner: Pubkey,
    pub executable: bool,
    pub rent_epoch: u64,
    pub commitment: Commitment,
    pub fetched_at: DateTime<Utc>,
    pub data_len: usize,
}
