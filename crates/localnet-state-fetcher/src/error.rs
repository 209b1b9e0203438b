//! Per-task fetch errors.

use localnet_sandbox_types::Pubkey;
use localnet_transport::RpcError;
use thiserror::Error;

/// Error raised while cloning one account.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("account {0} not found on cluster")]
    NotFound(Pubkey),
    #[error("malformed account data: {0}")]
    Decode(String),
    #[error("cluster rejected request: {0}")]
    Rpc(String),
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: usize, last: Box<FetchError> },
    #[error("fetch cancelled")]
    Cancelled,
    #[error("fetch worker failed: {0}")]
    Worker(String),
}

impl FetchError {
    /// Transient errors are retried with backoff; everything else fails fast.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout(_) | FetchError::RateLimited(_) | FetchError::Connection(_)
        )
    }

    /// Short machine-readable kind, used in failure reports.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout(_) => "timeout",
            FetchError::RateLimited(_) => "rate_limited",
            FetchError::Connection(_) => "connection",
            FetchError::NotFound(_) => "not_found",
            FetchError::Decode(_) => "decode",
            FetchError::Rpc(_) => "rpc",
            FetchError::RetriesExhausted { .. } => "retries_exhausted",
            FetchError::Cancelled => "cancelled",
            FetchError::Worker(_) => "worker",
        }
    }
}

impl From<RpcError> for FetchError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Timeout(m) => FetchError::Timeout(m),
            RpcError::RateLimited(m) => FetchError::RateLimited(m),
            RpcError::Connection(m) => FetchError::Connection(m),
            e @ RpcError::Status(_) if e.is_transient() => FetchError::Connection(e.to_string()),
            e @ RpcError::Rpc { .. } if e.is_transient() => FetchError::Connection(e.to_string()),
            RpcError::Decode(m) => FetchError::Decode(m),
            other => FetchError::Rpc(other.to_string()),
        }
    }
}
