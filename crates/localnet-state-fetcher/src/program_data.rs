//! Upgradeable-program helpers.
//!
//! A program deployed through the upgradeable BPF loader is split in two
//! accounts: the executable program account, whose data only points at a
//! program-data account, and the program-data account holding the bytecode.

use localnet_sandbox_types::{Pubkey, BPF_UPGRADEABLE_LOADER_ID};
use localnet_snapshot_cache::AccountSnapshot;

use crate::error::FetchError;

/// Loader state tag of the `Program { programdata_address }` variant.
const PROGRAM_STATE_TAG: u32 = 2;

/// Rent parameters of the default genesis config.
const ACCOUNT_STORAGE_OVERHEAD: u64 = 128;
const LAMPORTS_PER_BYTE_YEAR: u64 = 3480;
const EXEMPTION_THRESHOLD_YEARS: u64 = 2;

/// Resolve the program-data address linked from a program account.
pub fn program_data_address(program: &AccountSnapshot) -> Result<Pubkey, FetchError> {
    if program.owner.to_string() != BPF_UPGRADEABLE_LOADER_ID {
        return Err(FetchError::Decode(format!(
            "{} is owned by {}, not the upgradeable loader",
            program.address, program.owner
        )));
    }
    if !program.executable {
        return Err(FetchError::Decode(format!(
            "{} is not marked executable",
            program.address
        )));
    }
    let data = &program.data;
    if data.len() < 4 + 32 {
        return Err(FetchError::Decode(format!(
            "{} program state is {} bytes, expected at least 36",
            program.address,
            data.len()
        )));
    }
    let tag = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    if tag != PROGRAM_STATE_TAG {
        return Err(FetchError::Decode(format!(
            "{} has loader state tag {}, expected {}",
            program.address, tag, PROGRAM_STATE_TAG
        )));
    }
    Pubkey::try_from_slice(&data[4..36]).map_err(|e| FetchError::Decode(e.to_string()))
}

/// Minimum balance for an account of `data_len` bytes to be rent exempt.
pub fn rent_exempt_minimum(data_len: usize) -> u64 {
    (ACCOUNT_STORAGE_OVERHEAD + data_len as u64) * LAMPORTS_PER_BYTE_YEAR * EXEMPTION_THRESHOLD_YEARS
}
