//! Account address type.
//!
//! Addresses are 32-byte values rendered as base58 strings. This module is the
//! canonical source for address parsing in the workspace; other crates should
//! not decode base58 themselves.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Address of the system program (all zero bytes).
pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";

/// Address of the upgradeable BPF loader, owner of upgradeable program accounts.
pub const BPF_UPGRADEABLE_LOADER_ID: &str = "BPFLoaderUpgradeab1e11111111111111111111111";

/// Length of an address in bytes.
pub const PUBKEY_BYTES: usize = 32;

/// A 32-byte account address.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pubkey([u8; PUBKEY_BYTES]);

/// Why a string could not be decoded into a [`Pubkey`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParsePubkeyError {
    #[error("not valid base58: {0}")]
    InvalidBase58(String),
    #[error("decoded to {0} bytes, expected 32")]
    WrongLength(usize),
}

impl Pubkey {
    pub const fn new(bytes: [u8; PUBKEY_BYTES]) -> Self {
        Self(bytes)
    }

    /// The system program address.
    pub const fn system_program() -> Self {
        Self([0u8; PUBKEY_BYTES])
    }

    pub fn to_bytes(self) -> [u8; PUBKEY_BYTES] {
        self.0
    }

    /// Build an address from a byte slice, rejecting anything but 32 bytes.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, ParsePubkeyError> {
        let arr: [u8; PUBKEY_BYTES] = bytes
            .try_into()
            .map_err(|_| ParsePubkeyError::WrongLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Lowercase hex form, used for filesystem keys.
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(PUBKEY_BYTES * 2);
        for b in self.0 {
            out.push_str(&format!("{:02x}", b));
        }
        out
    }
}

impl AsRef<[u8]> for Pubkey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Pubkey {
    type Err = ParsePubkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|e| ParsePubkeyError::InvalidBase58(e.to_string()))?;
        Self::try_from_slice(&bytes)
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", self)
    }
}

impl Serialize for Pubkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_str(&s).map_err(serde::de::Error::custom)
    }
}
