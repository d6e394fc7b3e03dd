//! Chain collaborators
//!
//! The synchronizer and verifier read from two remote sources of truth: the
//! source chain's full node and the relay mirror holding its header tip.
//! This module defines the abstract operations both expose, plus an
//! in-process mirror used for dry runs.

pub mod local;

#[cfg(test)]
pub(crate) mod testing;

use crate::core::BlockHeader;
use crate::crypto::{prove_inclusion, EncodingError, Hash256, MerkleProof};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use local::LocalMirror;

/// Errors reported by chain collaborators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP status {status}")]
    Http { status: u16 },

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Submission rejected: {0}")]
    Rejected(String),

    #[error("No block at height {0}")]
    UnknownHeight(u32),

    #[error("Unknown block {0}")]
    UnknownBlock(Hash256),

    #[error("Transaction {0} not found in any block")]
    UnknownTransaction(Hash256),
}

impl ClientError {
    /// Whether the same request may succeed if repeated
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Http { status } => *status >= 500,
            _ => false,
        }
    }
}

/// Inclusion proof of `txid` among the ordered `txids` of the block `header`
/// describes.
///
/// The txid list must hash to the header's merkle root, so a node serving a
/// stale or partial list cannot produce a proof.
pub fn prove_in_block(
    header: &BlockHeader,
    txids: &[Hash256],
    txid: &Hash256,
) -> Result<MerkleProof, ClientError> {
    let position = txids
        .iter()
        .position(|id| id == txid)
        .ok_or(ClientError::UnknownTransaction(*txid))?;

    header.verify_merkle_root(txids)?;

    let proof = prove_inclusion(txids, position, header.height)
        .map_err(|e| ClientError::Decode(e.to_string()))?;
    log::debug!(
        "Built proof for {} at index {} of block {} ({} siblings)",
        txid,
        position,
        header.height,
        proof.siblings.len()
    );
    Ok(proof)
}

/// Acknowledgement of an accepted header batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    /// Height of the first submitted header
    pub start_height: u32,
    /// Number of headers accepted
    pub count: u32,
    /// Mirror tip hash after the submission
    pub tip_hash: Hash256,
    /// Collaborator-specific reference (transaction id, sequence number)
    pub reference: String,
}

/// Read access to the relay mirror
#[async_trait]
pub trait MirrorReader: Send + Sync {
    /// Height of the mirror's tip
    async fn latest_height(&self) -> Result<u32, ClientError>;

    /// Hash the mirror recorded at `height`
    async fn hash_at_height(&self, height: u32) -> Result<Hash256, ClientError>;
}

/// Write access to the relay mirror
#[async_trait]
pub trait MirrorWriter: Send + Sync {
    /// Submit `headers`, the first of which sits at `start_height`.
    ///
    /// Submissions are not idempotent: a batch whose first header does not
    /// chain from the mirror's hash at `start_height - 1` is rejected.
    async fn submit_headers(
        &self,
        start_height: u32,
        headers: &[BlockHeader],
    ) -> Result<SubmissionReceipt, ClientError>;
}

/// Read access to the source chain's full node
#[async_trait]
pub trait SourceChain: Send + Sync {
    /// Height of the best chain tip
    async fn current_height(&self) -> Result<u32, ClientError>;

    /// Hash of the best-chain block at `height`
    async fn hash_at_height(&self, height: u32) -> Result<Hash256, ClientError>;

    /// Header of the block identified by `hash`, identity-checked
    async fn header_at_hash(&self, hash: &Hash256) -> Result<BlockHeader, ClientError>;

    /// Raw serialized transactions of a block, in block order
    async fn transactions_in_block(&self, hash: &Hash256) -> Result<Vec<Vec<u8>>, ClientError>;

    /// Transaction ids of a block, in block order
    async fn transaction_ids_in_block(&self, hash: &Hash256)
        -> Result<Vec<Hash256>, ClientError>;

    /// Inclusion proof of a confirmed transaction against its block header
    async fn merkle_proof_for_transaction(&self, txid: &Hash256)
        -> Result<MerkleProof, ClientError>;

    /// Raw serialized transaction as the node stores it
    async fn raw_transaction(&self, txid: &Hash256) -> Result<Vec<u8>, ClientError>;
}
