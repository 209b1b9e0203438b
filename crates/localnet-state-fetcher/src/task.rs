//! Clone task definitions.

use localnet_sandbox_types::{Commitment, Pubkey};
use serde::{Deserialize, Serialize};

/// Locally supplied account contents that replace a network fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOverride {
    #[serde(with = "localnet_sandbox_types::encoding::base64_bytes")]
    pub data: Vec<u8>,
    /// Defaults to the rent-exempt minimum for `data`.
    pub lamports: Option<u64>,
    /// Defaults to the system program.
    pub owner: Option<Pubkey>,
}

/// Unit of work materializing one configured account into the local ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneTask {
    pub label: String,
    pub address: Pubkey,
    /// Endpoint the account is read from.
    pub endpoint: String,
    pub commitment: Commitment,
    /// Executable accounts also clone their program-data account.
    pub executable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_override: Option<AccountOverride>,
}

/// One account that has to be read to complete a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "address", rename_all = "snake_case")]
pub enum FetchTarget {
    Account(Pubkey),
    /// The program-data account linked from the given program account.
    /// Its address is only known once the program account is read.
    ProgramDataOf(Pubkey),
}

impl CloneTask {
    /// Accounts this task materializes, in fetch order.
    pub fn fetch_targets(&self) -> Vec<FetchTarget> {
        let mut targets = vec![FetchTarget::Account(self.address)];
        if self.executable {
            targets.push(FetchTarget::ProgramDataOf(self.address));
        }
        targets
    }

    /// Whether any network read is needed.
    pub fn needs_network(&self) -> bool {
        self.data_override.is_none()
    }
}
