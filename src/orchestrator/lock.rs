//! Exclusive per-ledger lock.
//!
//! The lock is an OS advisory lock on a file next to the ledger directory
//! (`.<name>.lock`) so that resetting the ledger never removes it. The lock
//! lives as long as the open file; a crashed holder releases it with its
//! descriptors. The holder's pid is written into the file for diagnostics
//! only.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::ValidatorStartError;

#[derive(Debug)]
pub struct LedgerLock {
    file: File,
    path: PathBuf,
    ledger: PathBuf,
}

impl LedgerLock {
    /// Lock file location for a ledger directory.
    pub fn lock_path(ledger: &Path) -> PathBuf {
        let name = ledger
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ledger".to_string());
        let parent = ledger.parent().unwrap_or_else(|| Path::new("."));
        parent.join(format!(".{}.lock", name))
    }

    /// Take the lock or fail immediately if another run holds it.
    pub fn acquire(ledger: &Path) -> Result<Self, ValidatorStartError> {
        let path = Self::lock_path(ledger);
        let lock_err = |source: io::Error| ValidatorStartError::Lock {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(lock_err)?;
        }

        // No truncate on open: the current holder's pid stays readable.
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(lock_err)?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.raw_os_error() != fs2::lock_contended_error().raw_os_error() {
                return Err(lock_err(e));
            }
            let pid = fs::read_to_string(&path)
                .ok()
                .and_then(|s| s.trim().parse::<u32>().ok());
            return Err(ValidatorStartError::LedgerBusy {
                ledger: ledger.to_path_buf(),
                pid,
            });
        }

        file.set_len(0).map_err(lock_err)?;
        write!(file, "{}", std::process::id()).map_err(lock_err)?;
        file.sync_data().map_err(lock_err)?;
        debug!(lock = %path.display(), "acquired ledger lock");
        Ok(Self {
            file,
            path,
            ledger: ledger.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ledger(&self) -> &Path {
        &self.ledger
    }
}

impl Drop for LedgerLock {
    // The file stays; unlinking it races with a run that already opened it.
    fn drop(&mut self) {
        if let Err(e) = self.file.set_len(0) {
            debug!(lock = %self.path.display(), error = %e, "failed to clear ledger lock owner");
        }
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(lock = %self.path.display(), error = %e, "failed to release ledger lock");
        }
    }
}
