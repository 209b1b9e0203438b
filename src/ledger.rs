//! Ledger directory ownership.
//!
//! The ledger is the validator's durable state directory. Cloned accounts are
//! written under `cloned-accounts/` as account files the validator loads at
//! genesis. `accounts/` belongs to the validator's AccountsDB, which clears it
//! on every start.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use localnet_sandbox_types::{encoding, Pubkey};
use localnet_state_fetcher::ClonedAccount;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::LedgerError;

const ACCOUNTS_DIR: &str = "cloned-accounts";
const VALIDATOR_LOG: &str = "validator.log";

/// A ledger directory in a settled state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedLedger {
    root: PathBuf,
}

impl PreparedLedger {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn accounts_dir(&self) -> PathBuf {
        self.root.join(ACCOUNTS_DIR)
    }

    pub fn validator_log(&self) -> PathBuf {
        self.root.join(VALIDATOR_LOG)
    }

    pub fn account_file(&self, address: &Pubkey) -> PathBuf {
        self.accounts_dir().join(format!("{}.json", address))
    }

    pub fn is_empty(&self) -> Result<bool, LedgerError> {
        let mut entries =
            fs::read_dir(&self.root).map_err(|e| LedgerError::io("read", &self.root, e))?;
        Ok(entries.next().is_none())
    }
}

/// One account file written into the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedAccount {
    pub label: String,
    pub address: Pubkey,
    pub path: PathBuf,
}

/// On-disk account file format understood by the validator's `--account` flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFile {
    pub pubkey: String,
    pub account: AccountFileBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountFileBody {
    pub lamports: u64,
    /// `[payload, "base64"]`
    pub data: (String, String),
    pub owner: String,
    pub executable: bool,
    pub rent_epoch: u64,
    pub space: usize,
}

impl AccountFile {
    pub fn from_cloned(acct: &ClonedAccount) -> Self {
        let snap = &acct.snapshot;
        Self {
            pubkey: snap.address.to_string(),
            account: AccountFileBody {
                lamports: snap.lamports,
                data: (encoding::base64_encode(&snap.data), "base64".to_string()),
                owner: snap.owner.to_string(),
                executable: snap.executable,
                rent_epoch: snap.rent_epoch,
                space: snap.data.len(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerManager;

impl LedgerManager {
    pub fn new() -> Self {
        Self
    }

    /// Settle the ledger directory before any task writes into it.
    ///
    /// With `reset`, existing content is removed and an empty directory is
    /// created; a missing directory is not an error. Without it, the
    /// directory is created if needed and existing content is left alone.
    pub fn prepare(&self, path: &Path, reset: bool) -> Result<PreparedLedger, LedgerError> {
        match fs::symlink_metadata(path) {
            Ok(meta) if !meta.is_dir() => return Err(LedgerError::NotADirectory(path.to_path_buf())),
            Ok(_) if reset => {
                info!(ledger = %path.display(), "resetting ledger");
                fs::remove_dir_all(path).map_err(|e| LedgerError::io("remove", path, e))?;
            }
            Ok(_) => debug!(ledger = %path.display(), "reusing ledger"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(LedgerError::io("inspect", path, e)),
        }
        fs::create_dir_all(path).map_err(|e| LedgerError::io("create", path, e))?;
        Ok(PreparedLedger {
            root: path.to_path_buf(),
        })
    }

    /// Write one account file per cloned account.
    ///
    /// Each file is written to a temporary name and renamed into place, so a
    /// crash never leaves a truncated account file behind.
    pub fn materialize<'a>(
        &self,
        ledger: &PreparedLedger,
        accounts: impl IntoIterator<Item = &'a ClonedAccount>,
    ) -> Result<Vec<MaterializedAccount>, LedgerError> {
        let dir = ledger.accounts_dir();
        fs::create_dir_all(&dir).map_err(|e| LedgerError::io("create", &dir, e))?;

        let mut written = Vec::new();
        for acct in accounts {
            let address = acct.snapshot.address;
            let path = ledger.account_file(&address);
            let json = serde_json::to_vec_pretty(&AccountFile::from_cloned(acct)).map_err(|e| {
                LedgerError::Encode {
                    address: address.to_string(),
                    message: e.to_string(),
                }
            })?;
            atomic_write(&path, &json)?;
            written.push(MaterializedAccount {
                label: acct.label.clone(),
                address,
                path,
            });
        }
        info!(ledger = %ledger.root().display(), accounts = written.len(), "materialized accounts");
        Ok(written)
    }
}

fn atomic_write(path: &Path, contents: &[u8]) -> Result<(), LedgerError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents).map_err(|e| LedgerError::io("write", &tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| LedgerError::io("rename", &tmp, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use localnet_sandbox_types::Commitment;
    use localnet_snapshot_cache::AccountSnapshot;
    use localnet_state_fetcher::{AccountOrigin, AccountRole};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn cloned(label: &str, byte: u8) -> ClonedAccount {
        ClonedAccount {
            label: label.to_string(),
            role: AccountRole::Account,
            snapshot: Arc::new(AccountSnapshot {
                address: Pubkey::new([byte; 32]),
                lamports: 1_461_600,
                owner: Pubkey::system_program(),
                executable: false,
                rent_epoch: 361,
                data: vec![1, 2, 3, 4],
                commitment: Commitment::Confirmed,
                fetched_at: Utc::now(),
            }),
            origin: AccountOrigin::Network,
        }
    }

    #[test]
    fn test_reset_twice_is_empty_both_times() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger");
        let mgr = LedgerManager::new();

        let ledger = mgr.prepare(&path, true).unwrap();
        assert!(ledger.is_empty().unwrap());
        fs::write(path.join("genesis.bin"), b"x").unwrap();

        let ledger = mgr.prepare(&path, true).unwrap();
        assert!(ledger.is_empty().unwrap());
        let ledger = mgr.prepare(&path, true).unwrap();
        assert!(ledger.is_empty().unwrap());
    }

    #[test]
    fn test_reuse_keeps_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger");
        let mgr = LedgerManager::new();
        mgr.prepare(&path, false).unwrap();
        fs::write(path.join("genesis.bin"), b"x").unwrap();

        let ledger = mgr.prepare(&path, false).unwrap();
        assert!(!ledger.is_empty().unwrap());
        assert!(path.join("genesis.bin").exists());
    }

    #[test]
    fn test_file_in_the_way() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger");
        fs::write(&path, b"not a dir").unwrap();
        let err = LedgerManager::new().prepare(&path, true).unwrap_err();
        assert!(matches!(err, LedgerError::NotADirectory(_)));
    }

    #[test]
    fn test_materialize_writes_account_files() {
        let dir = TempDir::new().unwrap();
        let mgr = LedgerManager::new();
        let ledger = mgr.prepare(&dir.path().join("ledger"), true).unwrap();
        let accounts = vec![cloned("usdc", 1), cloned("bonk", 2)];

        let written = mgr.materialize(&ledger, &accounts).unwrap();
        assert_eq!(written.len(), 2);

        let text = fs::read_to_string(&written[0].path).unwrap();
        let file: AccountFile = serde_json::from_str(&text).unwrap();
        assert_eq!(file.pubkey, Pubkey::new([1; 32]).to_string());
        assert_eq!(file.account.data, ("AQIDBA==".to_string(), "base64".to_string()));
        assert_eq!(file.account.space, 4);
        assert_eq!(file.account.rent_epoch, 361);

        let raw: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(raw["account"]["rentEpoch"], 361);
        assert_eq!(raw["account"]["data"][1], "base64");

        let leftovers: Vec<_> = fs::read_dir(ledger.accounts_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_account_files_survive_validator_accounts_db_clear() {
        let dir = TempDir::new().unwrap();
        let mgr = LedgerManager::new();
        let ledger = mgr.prepare(&dir.path().join("ledger"), true).unwrap();
        let written = mgr.materialize(&ledger, &[cloned("usdc", 1)]).unwrap();
        assert!(written[0].path.starts_with(ledger.root().join("cloned-accounts")));

        // The validator wipes its AccountsDB directory when it starts.
        let accounts_db = ledger.root().join("accounts");
        fs::create_dir_all(&accounts_db).unwrap();
        fs::remove_dir_all(&accounts_db).unwrap();

        assert!(written[0].path.exists());
        assert!(ledger.account_file(&Pubkey::new([1; 32])).exists());
    }

    #[test]
    fn test_materialize_on_reused_ledger_keeps_existing_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger");
        let mgr = LedgerManager::new();
        let ledger = mgr.prepare(&path, false).unwrap();
        mgr.materialize(&ledger, &[cloned("usdc", 1)]).unwrap();
        fs::write(path.join("genesis.bin"), b"x").unwrap();

        let ledger = mgr.prepare(&path, false).unwrap();
        mgr.materialize(&ledger, &[cloned("bonk", 2)]).unwrap();

        assert!(path.join("genesis.bin").exists());
        assert!(ledger.account_file(&Pubkey::new([1; 32])).exists());
        assert!(ledger.account_file(&Pubkey::new([2; 32])).exists());
    }
}
