//! Bitcoin Core JSON-RPC transport
//!
//! Implements the source chain reader against a full node over HTTP.

pub mod client;
pub mod types;

pub use client::{BitcoinRpcClient, RpcAuth};
pub use types::GetBlockHeaderResult;
