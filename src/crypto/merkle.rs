//! Merkle tree implementation for transaction inclusion proofs
//!
//! Reproduces Bitcoin's tree exactly: nodes are the double SHA-256 of
//! `left || right`, and a level with an odd number of nodes pairs its last
//! node with itself.

use super::hash::{double_sha256, Hash256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Merkle construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MerkleError {
    #[error("Cannot build a merkle tree from zero leaves")]
    EmptyTree,
    #[error("Leaf index {index} out of range for {count} leaves")]
    LeafIndexOutOfRange { index: usize, count: usize },
}

/// Hash two child nodes into their parent
pub fn hash_pair(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(left.as_bytes());
    data[32..].copy_from_slice(right.as_bytes());
    Hash256(double_sha256(&data))
}

/// Compute the parent level of `level`
fn next_level(level: &[Hash256]) -> Vec<Hash256> {
    level
        .chunks(2)
        .map(|chunk| {
            let left = &chunk[0];
            // Duplicate the last hash if odd number
            let right = chunk.get(1).unwrap_or(left);
            hash_pair(left, right)
        })
        .collect()
}

/// Calculate the merkle root from an ordered list of leaves.
///
/// Returns `None` for an empty list; a single leaf is its own root.
pub fn build(leaves: &[Hash256]) -> Option<Hash256> {
    if leaves.is_empty() {
        return None;
    }

    let mut current_level = leaves.to_vec();
    while current_level.len() > 1 {
        current_level = next_level(&current_level);
    }

    current_level.pop()
}

/// Proof that a leaf is included under a merkle root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Height of the block whose header commits to `root`
    pub block_height: u32,
    /// Position of the leaf in the block's transaction list
    pub leaf_index: u32,
    /// The leaf being proven (a txid)
    pub leaf: Hash256,
    /// Sibling hashes from the leaf level up to just below the root
    pub siblings: Vec<Hash256>,
    /// Merkle root the proof reconstructs
    pub root: Hash256,
}

/// Build an inclusion proof for `leaves[leaf_index]`
pub fn prove_inclusion(
    leaves: &[Hash256],
    leaf_index: usize,
    block_height: u32,
) -> Result<MerkleProof, MerkleError> {
    if leaves.is_empty() {
        return Err(MerkleError::EmptyTree);
    }
    if leaf_index >= leaves.len() {
        return Err(MerkleError::LeafIndexOutOfRange {
            index: leaf_index,
            count: leaves.len(),
        });
    }
    let proof_index = u32::try_from(leaf_index).map_err(|_| MerkleError::LeafIndexOutOfRange {
        index: leaf_index,
        count: leaves.len(),
    })?;

    let mut siblings = Vec::new();
    let mut level = leaves.to_vec();
    let mut index = leaf_index;

    while level.len() > 1 {
        let sibling = if index % 2 == 0 {
            // A self-paired last node is its own sibling
            *level.get(index + 1).unwrap_or(&level[index])
        } else {
            level[index - 1]
        };
        siblings.push(sibling);

        level = next_level(&level);
        index /= 2;
    }

    Ok(MerkleProof {
        block_height,
        leaf_index: proof_index,
        leaf: leaves[leaf_index],
        siblings,
        root: level[0],
    })
}

/// Replay the proof from its leaf and check it lands on `proof.root`
pub fn verify(proof: &MerkleProof) -> bool {
    proof.compute_root().map_or(false, |root| root == proof.root)
}

impl MerkleProof {
    /// Assemble a proof from the REST wire form (`pos` + reversed-hex siblings)
    pub fn from_wire(
        block_height: u32,
        pos: u32,
        leaf: Hash256,
        merkle: &[String],
        root: Hash256,
    ) -> Result<Self, crate::crypto::EncodingError> {
        let siblings = merkle
            .iter()
            .map(|h| Hash256::from_rpc_hex(h))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            block_height,
            leaf_index: pos,
            leaf,
            siblings,
            root,
        })
    }

    /// Root implied by the leaf, index and siblings.
    ///
    /// `None` if the index addresses a position deeper than the proof is long.
    pub fn compute_root(&self) -> Option<Hash256> {
        let depth = self.siblings.len();
        if depth < 32 && (self.leaf_index >> depth) != 0 {
            return None;
        }

        let mut index = self.leaf_index;
        let mut current = self.leaf;
        for sibling in &self.siblings {
            current = if index % 2 == 0 {
                hash_pair(&current, sibling)
            } else {
                hash_pair(sibling, &current)
            };
            index >>= 1;
        }
        Some(current)
    }

    /// Verify the proof is self-consistent
    pub fn verify(&self) -> bool {
        verify(self)
    }
}
