//! Where remote account state comes from.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use localnet_sandbox_types::{Commitment, Pubkey};
use localnet_transport::{RpcAccount, RpcClient};
use parking_lot::Mutex;

use crate::error::FetchError;

/// Account state as read from a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAccount {
    pub lamports: u64,
    pub owner: Pubkey,
    pub data: Vec<u8>,
    pub executable: bool,
    pub rent_epoch: u64,
}

impl From<RpcAccount> for RemoteAccount {
    fn from(acct: RpcAccount) -> Self {
        Self {
            lamports: acct.lamports,
            owner: acct.owner,
            data: acct.data,
            executable: acct.executable,
            rent_epoch: acct.rent_epoch,
        }
    }
}

/// Reads one account from a cluster endpoint.
///
/// `Ok(None)` means the cluster answered and the account does not exist.
/// Implementations must not retry internally; the fetcher owns the retry
/// policy.
#[async_trait]
pub trait AccountSource: Send + Sync {
    async fn fetch_account(
        &self,
        endpoint: &str,
        address: &Pubkey,
        commitment: Commitment,
    ) -> Result<Option<RemoteAccount>, FetchError>;
}

/// [`AccountSource`] backed by the JSON-RPC `getAccountInfo` call.
///
/// One client is kept per endpoint so connections are reused across tasks.
pub struct RpcAccountSource {
    timeout: Duration,
    connect_timeout: Duration,
    clients: Mutex<HashMap<String, RpcClient>>,
}

impl RpcAccountSource {
    pub fn new() -> Self {
        Self::with_timeouts(
            Duration::from_secs(RpcClient::DEFAULT_TIMEOUT_SECS),
            Duration::from_secs(RpcClient::DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }

    pub fn with_timeouts(timeout: Duration, connect_timeout: Duration) -> Self {
        Self {
            timeout,
            connect_timeout,
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn client_for(&self, endpoint: &str) -> RpcClient {
        let mut clients = self.clients.lock();
        clients
            .entry(endpoint.to_string())
            .or_insert_with(|| RpcClient::with_timeouts(endpoint, self.timeout, self.connect_timeout))
            .clone()
    }
}

impl Default for RpcAccountSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountSource for RpcAccountSource {
    async fn fetch_account(
        &self,
        endpoint: &str,
        address: &Pubkey,
        commitment: Commitment,
    ) -> Result<Option<RemoteAccount>, FetchError> {
        let client = self.client_for(endpoint);
        let address = *address;
        let fetched =
            tokio::task::spawn_blocking(move || client.get_account_info(&address, commitment))
                .await
                .map_err(|e| FetchError::Worker(e.to_string()))?;
        Ok(fetched?.map(RemoteAccount::from))
    }
}
