//! Localnet Transport Layer
//!
//! Blocking JSON-RPC transport used for two purposes:
//! - reading account state from a remote cluster (`getAccountInfo`)
//! - probing the local validator for readiness (`getHealth`, `getVersion`)
//!
//! # Example
//!
//! ```ignore
//! use localnet_transport::RpcClient;
//! use localnet_sandbox_types::Commitment;
//!
//! let client = RpcClient::new("https://api.devnet.solana.com");
//! let account = client.get_account_info(&address, Commitment::Confirmed)?;
//! ```

pub mod error;
pub mod network;
pub mod rpc;

pub use error::RpcError;
pub use network::infer_cluster_name;
pub use rpc::{RpcAccount, RpcClient};
