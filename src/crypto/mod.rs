//! Cryptographic utilities for the relay
//!
//! This module provides:
//! - SHA-256 / double SHA-256 / HASH160 hashing
//! - The `Hash256` value type and RPC hex normalization
//! - Merkle tree construction, inclusion proofs and verification

pub mod hash;
pub mod merkle;

pub use hash::{
    decode_from_wire_hash, double_sha256, hash160, sha256, EncodingError, Hash256, WireHash,
    HASH_SIZE,
};
pub use merkle::{build as merkle_root, prove_inclusion, MerkleError, MerkleProof};
