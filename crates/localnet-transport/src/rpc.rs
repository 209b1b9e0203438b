//! JSON-RPC client for cluster and validator endpoints.
//!
//! The client is blocking (built on `ureq`). Async callers run it on the
//! blocking pool via `tokio::task::spawn_blocking`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use localnet_sandbox_types::{encoding, Commitment, Pubkey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::error::RpcError;

/// JSON-RPC client bound to one endpoint.
#[derive(Clone)]
pub struct RpcClient {
    endpoint: String,
    agent: ureq::Agent,
    next_id: Arc<AtomicU64>,
}

/// Account state as returned by `getAccountInfo` with base64 encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcAccount {
    pub lamports: u64,
    pub owner: Pubkey,
    pub data: Vec<u8>,
    pub executable: bool,
    pub rent_epoch: u64,
    /// Slot of the response context.
    pub slot: u64,
}

impl RpcClient {
    /// Default request timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    /// Default connect timeout in seconds.
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

    fn build_agent(timeout: Duration, connect_timeout: Duration) -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout(timeout)
            .timeout_connect(connect_timeout)
            .build()
    }

    /// Create a client with default timeouts.
    pub fn new(endpoint: &str) -> Self {
        Self::with_timeouts(
            endpoint,
            Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            Duration::from_secs(Self::DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }

    /// Create a client with explicit timeouts.
    pub fn with_timeouts(endpoint: &str, timeout: Duration, connect_timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            agent: Self::build_agent(timeout, connect_timeout),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Execute a JSON-RPC call and return its `result` member.
    fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        trace!(endpoint = %self.endpoint, method, id, "rpc request");

        let response: Value = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json")
            .send_json(&body)
            .map_err(RpcError::from_ureq)?
            .into_json()
            .map_err(|e| RpcError::Decode(format!("invalid JSON body: {}", e)))?;

        if let Some(err) = response.get("error").filter(|e| !e.is_null()) {
            let code = err.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
            let message = err
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
                .to_string();
            return Err(RpcError::from_rpc(code, message));
        }

        response
            .get("result")
            .cloned()
            .ok_or_else(|| RpcError::Decode("no result in response".to_string()))
    }

    /// Fetch an account at the given commitment.
    ///
    /// Returns `Ok(None)` when the cluster reports no such account.
    pub fn get_account_info(
        &self,
        address: &Pubkey,
        commitment: Commitment,
    ) -> Result<Option<RpcAccount>, RpcError> {
        let params = serde_json::json!([
            address.to_string(),
            { "encoding": "base64", "commitment": commitment.as_str() }
        ]);
        let result = self.call("getAccountInfo", params)?;
        parse_account_info(&result)
    }

    /// `getHealth` succeeds with the literal result `"ok"`.
    pub fn get_health(&self) -> Result<(), RpcError> {
        let result = self.call("getHealth", Value::Array(vec![]))?;
        match result.as_str() {
            Some("ok") => Ok(()),
            _ => Err(RpcError::Decode(format!("unexpected health result: {}", result))),
        }
    }

    /// Version string reported by the node (`solana-core`).
    pub fn get_version(&self) -> Result<String, RpcError> {
        let result = self.call("getVersion", Value::Array(vec![]))?;
        result
            .get("solana-core")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| RpcError::Decode("missing solana-core version".to_string()))
    }
}

/// Parse the `result` member of a `getAccountInfo` response.
pub fn parse_account_info(result: &Value) -> Result<Option<RpcAccount>, RpcError> {
    let slot = result
        .get("context")
        .and_then(|c| c.get("slot"))
        .and_then(|s| s.as_u64())
        .unwrap_or(0);
    let value = match result.get("value") {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };

    let lamports = value
        .get("lamports")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| RpcError::Decode("missing lamports".to_string()))?;
    let owner = value
        .get("owner")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::Decode("missing owner".to_string()))?
        .parse::<Pubkey>()
        .map_err(|e| RpcError::Decode(format!("owner: {}", e)))?;
    let executable = value
        .get("executable")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let rent_epoch = value
        .get("rentEpoch")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);

    // data is ["<payload>", "base64"]
    let data = match value.get("data") {
        Some(Value::Array(parts)) => {
            let payload = parts.first().and_then(|p| p.as_str()).unwrap_or("");
            let enc = parts.get(1).and_then(|e| e.as_str()).unwrap_or("base64");
            if enc != "base64" {
                return Err(RpcError::Decode(format!("unsupported data encoding {}", enc)));
            }
            encoding::base64_decode(payload)
                .map_err(|e| RpcError::Decode(format!("account data: {}", e)))?
        }
        _ => return Err(RpcError::Decode("missing account data".to_string())),
    };

    Ok(Some(RpcAccount {
        lamports,
        owner,
        data,
        executable,
        rent_epoch,
        slot,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;

    /// Serve exactly one HTTP request with a canned JSON body and return the URL.
    fn serve_once(status: u16, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = v.trim().parse().unwrap();
                }
            }
            let mut buf = vec![0u8; content_length];
            reader.read_exact(&mut buf).unwrap();
            let reply = format!(
                "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(reply.as_bytes()).unwrap();
        });
        format!("http://{}", addr)
    }

    const ACCOUNT_RESPONSE: &str = r#"{"jsonrpc":"2.0","id":1,"result":{"context":{"slot":42},"value":{"data":["AQIDBA==","base64"],"executable":false,"lamports":1461600,"owner":"TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA","rentEpoch":18446744073709551615,"space":4}}}"#;

    #[test]
    fn test_parse_account_info_value() {
        let v: Value = serde_json::from_str(ACCOUNT_RESPONSE).unwrap();
        let acct = parse_account_info(&v["result"]).unwrap().unwrap();
        assert_eq!(acct.lamports, 1_461_600);
        assert_eq!(acct.data, vec![1, 2, 3, 4]);
        assert_eq!(acct.rent_epoch, u64::MAX);
        assert_eq!(acct.slot, 42);
        assert!(!acct.executable);
    }

    #[test]
    fn test_parse_account_info_null_value() {
        let v = serde_json::json!({"context": {"slot": 1}, "value": null});
        assert_eq!(parse_account_info(&v).unwrap(), None);
    }

    #[test]
    fn test_parse_account_info_bad_owner() {
        let v = serde_json::json!({
            "context": {"slot": 1},
            "value": {"data": ["", "base64"], "executable": false, "lamports": 1, "owner": "nope", "rentEpoch": 0}
        });
        assert!(matches!(parse_account_info(&v), Err(RpcError::Decode(_))));
    }

    #[test]
    fn test_get_account_info_over_http() {
        let url = serve_once(200, ACCOUNT_RESPONSE);
        let client = RpcClient::new(&url);
        let addr: Pubkey = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".parse().unwrap();
        let acct = client
            .get_account_info(&addr, Commitment::Confirmed)
            .unwrap()
            .unwrap();
        assert_eq!(acct.data.len(), 4);
    }

    #[test]
    fn test_rate_limit_status_is_transient() {
        let url = serve_once(429, "{}");
        let client = RpcClient::new(&url);
        let err = client.get_health().unwrap_err();
        assert!(matches!(err, RpcError::RateLimited(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_get_health_ok() {
        let url = serve_once(200, r#"{"jsonrpc":"2.0","id":1,"result":"ok"}"#);
        RpcClient::new(&url).get_health().unwrap();
    }

    #[test]
    fn test_rpc_error_member() {
        let url = serve_once(
            200,
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"Invalid param"}}"#,
        );
        let err = RpcClient::new(&url).get_health().unwrap_err();
        assert!(matches!(err, RpcError::Rpc { code: -32602, .. }));
    }

    #[test]
    fn test_connection_refused_is_transient() {
        // Bind then drop to obtain a port with no listener.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = RpcClient::with_timeouts(
            &format!("http://127.0.0.1:{}", port),
            Duration::from_secs(2),
            Duration::from_secs(1),
        );
        let err = client.get_health().unwrap_err();
        assert!(err.is_transient(), "unexpected error: {:?}", err);
    }
}
