/// Infer a short cluster name from an RPC endpoint URL.
///
/// Used for cache directory naming and log fields; unknown hosts map to `custom`.
pub fn infer_cluster_name(url: &str) -> &'static str {
    let lower = url.to_lowercase();
    if lower.contains("devnet") {
        "devnet"
    } else if lower.contains("testnet") {
        "testnet"
    } else if lower.contains("mainnet") {
        "mainnet-beta"
    } else if lower.contains("localhost") || lower.contains("127.0.0.1") {
        "localnet"
    } else {
        "custom"
    }
}
