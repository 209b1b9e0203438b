//! Transport error classification.

use thiserror::Error;

/// JSON-RPC error code some providers return when throttling.
const RPC_CODE_RATE_LIMITED: i64 = -32429;
/// JSON-RPC error code for "node is behind"/"node is unhealthy".
const RPC_CODE_NODE_UNHEALTHY: i64 = -32005;

/// Errors returned by [`crate::RpcClient`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("rate limited by endpoint: {0}")]
    RateLimited(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed response: {0}")]
    Decode(String),
}

impl RpcError {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RpcError::Timeout(_) | RpcError::RateLimited(_) | RpcError::Connection(_) => true,
            RpcError::Status(code) => matches!(code, 502..=504),
            RpcError::Rpc { code, .. } => *code == RPC_CODE_NODE_UNHEALTHY,
            RpcError::Decode(_) => false,
        }
    }

    pub(crate) fn from_ureq(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(429, resp) => RpcError::RateLimited(resp.status_text().to_string()),
            ureq::Error::Status(code, _) => RpcError::Status(code),
            ureq::Error::Transport(t) => {
                let msg = t.to_string();
                let lower = msg.to_ascii_lowercase();
                if lower.contains("timed out") || lower.contains("timeout") {
                    RpcError::Timeout(msg)
                } else {
                    RpcError::Connection(msg)
                }
            }
        }
    }

    pub(crate) fn from_rpc(code: i64, message: String) -> Self {
        let lower = message.to_ascii_lowercase();
        if code == RPC_CODE_RATE_LIMITED || lower.contains("too many requests") {
            RpcError::RateLimited(message)
        } else {
            RpcError::Rpc { code, message }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(RpcError::Timeout("x".into()).is_transient());
        assert!(RpcError::RateLimited("x".into()).is_transient());
        assert!(RpcError::Connection("x".into()).is_transient());
        assert!(RpcError::Status(503).is_transient());
        assert!(!RpcError::Status(404).is_transient());
        assert!(!RpcError::Decode("x".into()).is_transient());
        assert!(!RpcError::Rpc {
            code: -32602,
            message: "Invalid param".into()
        }
        .is_transient());
    }

    #[test]
    fn test_rpc_throttle_message_maps_to_rate_limited() {
        let err = RpcError::from_rpc(-32000, "Too many requests for a specific RPC call".into());
        assert!(matches!(err, RpcError::RateLimited(_)));
    }
}
