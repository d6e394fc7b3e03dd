//! BTC relay: a Bitcoin header relay and payment verifier in Rust
//!
//! This crate provides:
//! - Canonical 80-byte header serialization and double SHA-256 identity
//! - Merkle root construction, inclusion proofs and verification
//! - P2PKH / P2SH output decoding against an inclusion proof
//! - A reorg-aware follower that keeps a relay mirror on the best chain
//! - A Bitcoin Core JSON-RPC source reader
//!
//! # Example
//!
//! ```rust
//! use btc_relay::crypto::{merkle_root, prove_inclusion, Hash256};
//!
//! let leaves: Vec<Hash256> = (0u8..5).map(|i| Hash256::digest(&[i])).collect();
//! let proof = prove_inclusion(&leaves, 3, 800_000).unwrap();
//!
//! assert_eq!(Some(proof.root), merkle_root(&leaves));
//! assert!(proof.verify());
//! ```

pub mod chain;
pub mod cli;
pub mod core;
pub mod crypto;
pub mod rpc;
pub mod sync;

// Re-export commonly used types
pub use chain::{ClientError, LocalMirror, MirrorReader, MirrorWriter, SourceChain};
pub use core::{
    verify_output_inclusion, BlockHeader, Network, RawTransaction, ScriptType,
    TransactionOutputClaim, VerifyError,
};
pub use crypto::{EncodingError, Hash256, MerkleError, MerkleProof};
pub use rpc::BitcoinRpcClient;
pub use sync::{ChainFollower, ChainTip, RetryPolicy, SyncConfig, SyncError, SyncPhase, SyncState};
