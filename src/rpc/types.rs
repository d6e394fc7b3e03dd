//! Bitcoin Core JSON-RPC request/response types

use crate::core::{narrow_i32, narrow_u32, BlockHeader};
use crate::crypto::{decode_from_wire_hash, EncodingError, Hash256};
use serde::{Deserialize, Serialize};

/// JSON-RPC request envelope
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a, T> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: T,
}

impl<'a, T> JsonRpcRequest<'a, T> {
    pub fn new(method: &'a str, params: T, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// JSON-RPC response envelope
///
/// Older nodes answer in the 1.0 dialect without a `jsonrpc` field and with
/// `result: null` alongside errors.
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    pub id: Option<u64>,
    pub result: Option<T>,
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error object
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

// Bitcoin Core error codes
pub const RPC_INVALID_ADDRESS_OR_KEY: i64 = -5;
pub const RPC_INVALID_PARAMETER: i64 = -8;

/// `getblockheader <hash> true`
#[derive(Debug, Clone, Deserialize)]
pub struct GetBlockHeaderResult {
    pub hash: String,
    pub height: u64,
    pub version: i64,
    /// Absent for the genesis block
    #[serde(default, rename = "previousblockhash")]
    pub previous_block_hash: Option<String>,
    #[serde(rename = "merkleroot")]
    pub merkle_root: String,
    pub time: u64,
    /// Compact target as 8 hex digits
    pub bits: String,
    pub nonce: u64,
}

impl TryFrom<GetBlockHeaderResult> for BlockHeader {
    type Error = EncodingError;

    /// Convert with width checks; the reported hash is kept so callers can
    /// check it against the serialized fields.
    fn try_from(result: GetBlockHeaderResult) -> Result<Self, Self::Error> {
        let bits = u32::from_str_radix(&result.bits, 16).map_err(|_| {
            EncodingError::FieldOutOfRange {
                field: "bits",
                value: result.bits.clone(),
            }
        })?;
        let prev_hash = match result.previous_block_hash.as_deref() {
            Some(hex) => decode_from_wire_hash(hex)?,
            None => Hash256::ZERO,
        };

        Ok(BlockHeader {
            height: narrow_u32("height", result.height)?,
            version: narrow_i32("version", result.version)?,
            prev_hash,
            merkle_root: decode_from_wire_hash(result.merkle_root.as_str())?,
            time: narrow_u32("time", result.time)?,
            bits,
            nonce: narrow_u32("nonce", result.nonce)?,
            hash: decode_from_wire_hash(result.hash.as_str())?,
        })
    }
}

/// `getblock <hash> 1`
#[derive(Debug, Clone, Deserialize)]
pub struct GetBlockTxidsResult {
    pub hash: String,
    pub height: u64,
    /// Transaction ids in block order
    pub tx: Vec<String>,
}

/// `getblock <hash> 2`
#[derive(Debug, Clone, Deserialize)]
pub struct GetBlockTransactionsResult {
    pub hash: String,
    pub height: u64,
    pub tx: Vec<BlockTransaction>,
}

/// A decoded transaction inside a verbosity-2 block
#[derive(Debug, Clone, Deserialize)]
pub struct BlockTransaction {
    pub txid: String,
    pub hex: String,
}

/// `getrawtransaction <txid> true`
#[derive(Debug, Clone, Deserialize)]
pub struct GetRawTransactionResult {
    pub txid: String,
    pub hex: String,
    /// Present only once the transaction is confirmed
    #[serde(default, rename = "blockhash")]
    pub block_hash: Option<String>,
}
