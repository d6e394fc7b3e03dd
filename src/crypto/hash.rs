//! Cryptographic hashing utilities for the relay
//!
//! Provides the SHA-256 based primitives used for block hashes,
//! transaction IDs and merkle tree nodes, plus the `Hash256` value type
//! and the conversion from the byte-reversed hex form used by node RPCs.

use ripemd::Ripemd160;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of a block hash, txid or merkle node
pub const HASH_SIZE: usize = 32;

/// Errors raised while encoding or decoding chain data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Invalid hash length: {0} bytes (expected 32)")]
    InvalidHashLength(usize),
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
    #[error("Field {field} out of range: {value}")]
    FieldOutOfRange { field: &'static str, value: String },
    #[error("Invalid header length: {0} bytes (expected 80)")]
    InvalidHeaderLength(usize),
    #[error("Header hash mismatch at height {height}: expected {expected}, computed {computed}")]
    HashMismatch {
        height: u32,
        expected: Hash256,
        computed: Hash256,
    },
    #[error("Merkle root mismatch at height {height}: header {expected}, computed {computed}")]
    MerkleRootMismatch {
        height: u32,
        expected: Hash256,
        computed: Hash256,
    },
    #[error("Broken header chain at height {height}: {reason}")]
    BrokenChain { height: u32, reason: String },
    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),
}

impl From<hex::FromHexError> for EncodingError {
    fn from(e: hex::FromHexError) -> Self {
        EncodingError::InvalidHex(e.to_string())
    }
}

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes double SHA-256 hash (SHA-256 of SHA-256)
/// Used for block hashes, txids and merkle nodes
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// RIPEMD160(SHA256(data)), the 20-byte hash embedded in P2PKH/P2SH scripts
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let mut ripemd = Ripemd160::new();
    ripemd.update(sha256(data));
    ripemd.finalize().into()
}

/// A 32-byte hash in internal (digest) byte order.
///
/// Node RPCs print hashes byte-reversed; `Display`, `FromStr` and the serde
/// form all use that reversed hex so values can be compared with explorer
/// output directly.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    /// Double SHA-256 of `data`
    pub fn digest(data: &[u8]) -> Self {
        Self(double_sha256(data))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, EncodingError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| EncodingError::InvalidHashLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Parse the byte-reversed hex form returned by node RPCs
    pub fn from_rpc_hex(s: &str) -> Result<Self, EncodingError> {
        let mut bytes = hex::decode(s.trim())?;
        if bytes.len() != HASH_SIZE {
            return Err(EncodingError::InvalidHashLength(bytes.len()));
        }
        bytes.reverse();
        Self::from_slice(&bytes)
    }

    /// Byte-reversed hex, as node RPCs and explorers print it
    pub fn to_rpc_hex(&self) -> String {
        let mut bytes = self.0;
        bytes.reverse();
        hex::encode(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rpc_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_rpc_hex())
    }
}

impl FromStr for Hash256 {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_rpc_hex(s)
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rpc_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_rpc_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A hash as it arrives from a collaborator: RPC hex text, or bytes that
/// are already in internal order.
#[derive(Debug, Clone, Copy)]
pub enum WireHash<'a> {
    Hex(&'a str),
    Bytes(&'a [u8]),
}

impl<'a> From<&'a str> for WireHash<'a> {
    fn from(s: &'a str) -> Self {
        WireHash::Hex(s)
    }
}

impl<'a> From<&'a String> for WireHash<'a> {
    fn from(s: &'a String) -> Self {
        WireHash::Hex(s.as_str())
    }
}

impl<'a> From<&'a [u8]> for WireHash<'a> {
    fn from(b: &'a [u8]) -> Self {
        WireHash::Bytes(b)
    }
}

impl<'a> From<&'a [u8; 32]> for WireHash<'a> {
    fn from(b: &'a [u8; 32]) -> Self {
        WireHash::Bytes(b)
    }
}

/// Normalize a hash from the RPC surface to internal byte order.
///
/// Hex text is decoded and reversed; raw bytes are taken to be normalized
/// already and pass through unchanged, so re-normalizing is a no-op.
pub fn decode_from_wire_hash<'a>(wire: impl Into<WireHash<'a>>) -> Result<Hash256, EncodingError> {
    match wire.into() {
        WireHash::Hex(s) => Hash256::from_rpc_hex(s),
        WireHash::Bytes(b) => Hash256::from_slice(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let hash = sha256(b"hello world");
        assert_eq!(
            hex::encode(hash),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_double_sha256() {
        assert_eq!(double_sha256(b"hello world"), sha256(&sha256(b"hello world")));
    }

    #[test]
    fn test_hash160_of_empty() {
        assert_eq!(
            hex::encode(hash160(b"")),
            "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb"
        );
    }

    #[test]
    fn test_wire_hash_is_reversed() {
        let genesis = "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";
        let hash = decode_from_wire_hash(genesis).unwrap();
        assert_eq!(hash.0[31], 0x00);
        assert_eq!(hash.0[0], 0x6f);
        assert_eq!(hash.to_string(), genesis);
    }

    #[test]
    fn test_wire_hash_bytes_idempotent() {
        let short = "11".repeat(31);
        assert_eq!(
            decode_from_wire_hash(short.as_str()),
            Err(EncodingError::InvalidHashLength(31))
        );

        let normalized = decode_from_wire_hash(&[7u8; 32]).unwrap();
        let again = decode_from_wire_hash(normalized.as_bytes()).unwrap();
        assert_eq!(normalized, again);
    }

    #[test]
    fn test_wire_hash_rejects_bad_input() {
        assert!(matches!(
            decode_from_wire_hash("zz"),
            Err(EncodingError::InvalidHex(_))
        ));
        assert_eq!(
            decode_from_wire_hash(&[0u8; 20][..]),
            Err(EncodingError::InvalidHashLength(20))
        );
    }

    #[test]
    fn test_hex_error_is_comparable() {
        let err: EncodingError = hex::decode("abc").unwrap_err().into();
        assert_eq!(
            err,
            EncodingError::InvalidHex(hex::FromHexError::OddLength.to_string())
        );
        assert_eq!(err.clone(), err);
    }

    #[test]
    fn test_serde_uses_rpc_hex() {
        let hash = Hash256([1u8; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(32)));
        let back: Hash256 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
