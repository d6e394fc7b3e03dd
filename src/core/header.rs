//! Block header codec
//!
//! Serializes headers to the canonical 80-byte layout, computes their
//! double SHA-256 identity, and checks the invariants a header must satisfy
//! before it is relayed into the mirror.

use crate::crypto::{double_sha256, merkle_root, EncodingError, Hash256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Header Constants
// =============================================================================

/// Block header size in bytes
pub const BLOCK_HEADER_SIZE: usize = 80;

// Field offsets in the serialized header
const VERSION_OFFSET: usize = 0;
const PREV_HASH_OFFSET: usize = 4;
const MERKLE_ROOT_OFFSET: usize = 36;
const TIME_OFFSET: usize = 68;
const BITS_OFFSET: usize = 72;
const NONCE_OFFSET: usize = 76;

/// Narrow a wide integer field to `u32`, naming the field on failure
pub fn narrow_u32(field: &'static str, value: u64) -> Result<u32, EncodingError> {
    u32::try_from(value).map_err(|_| EncodingError::FieldOutOfRange {
        field,
        value: value.to_string(),
    })
}

/// Narrow a wide integer field to `i32`, naming the field on failure
pub fn narrow_i32(field: &'static str, value: i64) -> Result<i32, EncodingError> {
    i32::try_from(value).map_err(|_| EncodingError::FieldOutOfRange {
        field,
        value: value.to_string(),
    })
}

// =============================================================================
// Block Header
// =============================================================================

/// A source-chain block header with its derived identity and height
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Height reported by the source (not part of the serialized form)
    pub height: u32,
    pub version: i32,
    /// Hash of the previous block
    pub prev_hash: Hash256,
    /// Merkle root of the block's transaction ids
    pub merkle_root: Hash256,
    /// Block timestamp (seconds since epoch)
    pub time: u32,
    /// Compact difficulty target
    pub bits: u32,
    pub nonce: u32,
    /// Identity hash as reported by the source
    pub hash: Hash256,
}

impl BlockHeader {
    /// Build a header and derive its identity hash
    pub fn new(
        height: u32,
        version: i32,
        prev_hash: Hash256,
        merkle_root: Hash256,
        time: u32,
        bits: u32,
        nonce: u32,
    ) -> Self {
        let mut header = Self {
            height,
            version,
            prev_hash,
            merkle_root,
            time,
            bits,
            nonce,
            hash: Hash256::ZERO,
        };
        header.hash = header.identity_hash();
        header
    }

    /// Serialize to the canonical little-endian 80-byte layout:
    /// `version | prev_hash | merkle_root | time | bits | nonce`
    pub fn serialize(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let mut out = [0u8; BLOCK_HEADER_SIZE];
        out[VERSION_OFFSET..PREV_HASH_OFFSET].copy_from_slice(&self.version.to_le_bytes());
        out[PREV_HASH_OFFSET..MERKLE_ROOT_OFFSET].copy_from_slice(self.prev_hash.as_bytes());
        out[MERKLE_ROOT_OFFSET..TIME_OFFSET].copy_from_slice(self.merkle_root.as_bytes());
        out[TIME_OFFSET..BITS_OFFSET].copy_from_slice(&self.time.to_le_bytes());
        out[BITS_OFFSET..NONCE_OFFSET].copy_from_slice(&self.bits.to_le_bytes());
        out[NONCE_OFFSET..].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    /// Parse an 80-byte serialized header; the hash is derived from the bytes
    pub fn from_bytes(height: u32, bytes: &[u8]) -> Result<Self, EncodingError> {
        let raw: &[u8; BLOCK_HEADER_SIZE] = bytes
            .try_into()
            .map_err(|_| EncodingError::InvalidHeaderLength(bytes.len()))?;

        let le_u32 =
            |at: usize| u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]);

        Ok(Self {
            height,
            version: le_u32(VERSION_OFFSET) as i32,
            prev_hash: Hash256::from_slice(&raw[PREV_HASH_OFFSET..MERKLE_ROOT_OFFSET])?,
            merkle_root: Hash256::from_slice(&raw[MERKLE_ROOT_OFFSET..TIME_OFFSET])?,
            time: le_u32(TIME_OFFSET),
            bits: le_u32(BITS_OFFSET),
            nonce: le_u32(NONCE_OFFSET),
            hash: identity_hash(raw),
        })
    }

    /// Double SHA-256 of the serialized header
    pub fn identity_hash(&self) -> Hash256 {
        identity_hash(&self.serialize())
    }

    /// Check the reported hash against the serialized fields.
    ///
    /// A mismatch means the source sent inconsistent data; it is never
    /// corrected silently.
    pub fn verify_identity(&self) -> Result<(), EncodingError> {
        let computed = self.identity_hash();
        if computed != self.hash {
            return Err(EncodingError::HashMismatch {
                height: self.height,
                expected: self.hash,
                computed,
            });
        }
        Ok(())
    }

    /// Check the header commits to exactly these transaction ids
    pub fn verify_merkle_root(&self, txids: &[Hash256]) -> Result<(), EncodingError> {
        let computed = merkle_root(txids).ok_or_else(|| {
            EncodingError::MalformedTransaction(format!(
                "block at height {} has no transactions",
                self.height
            ))
        })?;
        if computed != self.merkle_root {
            return Err(EncodingError::MerkleRootMismatch {
                height: self.height,
                expected: self.merkle_root,
                computed,
            });
        }
        Ok(())
    }

    /// Block time as a UTC timestamp
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(i64::from(self.time), 0)
    }

    /// Serialized header as lowercase hex
    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }
}

/// Double SHA-256 over serialized header bytes
pub fn identity_hash(header_bytes: &[u8]) -> Hash256 {
    Hash256(double_sha256(header_bytes))
}

/// Check that `headers` form a contiguous chain starting at `start_height`
/// on top of `prev_hash`, and that each header's identity hash holds.
pub fn validate_header_chain(
    start_height: u32,
    prev_hash: &Hash256,
    headers: &[BlockHeader],
) -> Result<(), EncodingError> {
    let mut expected_prev = *prev_hash;
    let mut expected_height = start_height;

    for header in headers {
        if header.height != expected_height {
            return Err(EncodingError::BrokenChain {
                height: header.height,
                reason: format!("expected height {}", expected_height),
            });
        }
        if header.prev_hash != expected_prev {
            return Err(EncodingError::BrokenChain {
                height: header.height,
                reason: format!(
                    "previous hash {} does not match {}",
                    header.prev_hash, expected_prev
                ),
            });
        }
        header.verify_identity()?;

        expected_prev = header.hash;
        expected_height = expected_height.checked_add(1).ok_or_else(|| {
            EncodingError::FieldOutOfRange {
                field: "height",
                value: format!("{} + 1", expected_height),
            }
        })?;
    }

    Ok(())
}
