//! Core chain data components
//!
//! This module contains the source-chain building blocks:
//! - Block headers (80-byte codec and identity hashing)
//! - Raw transactions (legacy and witness serializations)
//! - Output scripts (P2PKH, P2SH) and decoded output claims
//! - Payment verification against a header's merkle root
//! - Network selection

pub mod header;
pub mod network;
pub mod script;
pub mod transaction;
pub mod verifier;

pub use header::{
    identity_hash, narrow_i32, narrow_u32, validate_header_chain, BlockHeader, BLOCK_HEADER_SIZE,
};
pub use network::Network;
pub use script::{classify, ScriptType, TransactionOutputClaim};
pub use transaction::{output_at, OutputLookup, RawTransaction, TxInput, TxOutput};
pub use verifier::{verify_output_inclusion, VerifyError};
