//! Payment verification
//!
//! Confirms a raw transaction is committed to by a block header and decodes
//! the output being claimed.

use crate::core::header::BlockHeader;
use crate::core::script::{classify, TransactionOutputClaim};
use crate::core::transaction::{output_at, OutputLookup};
use crate::crypto::{EncodingError, Hash256, MerkleProof};
use thiserror::Error;

/// Payment verification errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("inclusion proof does not bind transaction {txid} to block {height}")]
    ProofMismatch { txid: Hash256, height: u32 },

    #[error("output {index} has an unrecognized locking script")]
    UnknownScriptType { index: u64 },

    #[error("output index {index} out of range (transaction has {count} outputs)")]
    IndexOutOfRange { index: u64, count: u64 },

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),
}

/// Verify that `raw_transaction` is included in `header` and decode the
/// output at `output_index`.
///
/// The transaction id is the double SHA-256 of the bytes exactly as
/// supplied, so callers holding a witness serialization must strip it first.
pub fn verify_output_inclusion(
    raw_transaction: &[u8],
    proof: &MerkleProof,
    header: &BlockHeader,
    output_index: u64,
) -> Result<TransactionOutputClaim, VerifyError> {
    let txid = Hash256::digest(raw_transaction);

    let bound = proof.leaf == txid
        && proof.root == header.merkle_root
        && proof.block_height == header.height
        && proof.verify();
    if !bound {
        return Err(VerifyError::ProofMismatch {
            txid,
            height: header.height,
        });
    }

    let output = match output_at(raw_transaction, output_index)? {
        OutputLookup::Found(output) => output,
        OutputLookup::OutOfRange { count } => {
            return Err(VerifyError::IndexOutOfRange {
                index: output_index,
                count,
            })
        }
    };

    let (script_type, decoded_hash) = classify(&output.script_pubkey)
        .ok_or(VerifyError::UnknownScriptType {
            index: output_index,
        })?;

    Ok(TransactionOutputClaim {
        script_type,
        decoded_hash,
        value: output.value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::script::ScriptType;
    use crate::core::transaction::tests::{p2pkh_script, p2sh_script, sample_tx};
    use crate::core::transaction::{RawTransaction, TxOutput};
    use crate::crypto::prove_inclusion;

    struct Fixture {
        raw: Vec<u8>,
        proof: MerkleProof,
        header: BlockHeader,
    }

    /// A block of three transactions with `tx` at index 1
    fn fixture(tx: &RawTransaction) -> Fixture {
        let raw = tx.to_bytes();
        let leaves = vec![
            Hash256::digest(b"coinbase"),
            tx.txid(),
            Hash256::digest(b"other"),
        ];
        let proof = prove_inclusion(&leaves, 1, 700).unwrap();
        let header = BlockHeader::new(
            700,
            2,
            Hash256([3; 32]),
            proof.root,
            1_600_000_000,
            0x1d00ffff,
            9,
        );
        Fixture { raw, proof, header }
    }

    fn outputs() -> Vec<TxOutput> {
        vec![
            TxOutput {
                value: 50_000,
                script_pubkey: p2pkh_script([0x11; 20]),
            },
            TxOutput {
                value: 75_000,
                script_pubkey: p2sh_script([0x22; 20]),
            },
            TxOutput {
                value: 0,
                script_pubkey: vec![0x6a, 0x02, 0xbe, 0xef],
            },
        ]
    }

    #[test]
    fn test_p2pkh_output() {
        let f = fixture(&sample_tx(outputs()));
        let claim = verify_output_inclusion(&f.raw, &f.proof, &f.header, 0).unwrap();
        assert_eq!(claim.script_type, ScriptType::P2PKH);
        assert_eq!(claim.decoded_hash, [0x11; 20]);
        assert_eq!(claim.value, 50_000);
    }

    #[test]
    fn test_p2sh_output() {
        let f = fixture(&sample_tx(outputs()));
        let claim = verify_output_inclusion(&f.raw, &f.proof, &f.header, 1).unwrap();
        assert_eq!(claim.script_type, ScriptType::P2SH);
        assert_eq!(claim.decoded_hash, [0x22; 20]);
        assert_eq!(claim.value, 75_000);
    }

    #[test]
    fn test_unknown_script() {
        let f = fixture(&sample_tx(outputs()));
        assert_eq!(
            verify_output_inclusion(&f.raw, &f.proof, &f.header, 2),
            Err(VerifyError::UnknownScriptType { index: 2 })
        );
    }

    #[test]
    fn test_index_out_of_range() {
        let f = fixture(&sample_tx(outputs()));
        assert_eq!(
            verify_output_inclusion(&f.raw, &f.proof, &f.header, 3),
            Err(VerifyError::IndexOutOfRange { index: 3, count: 3 })
        );
    }

    #[test]
    fn test_transaction_not_in_tree() {
        let f = fixture(&sample_tx(outputs()));

        // Same proof, different transaction
        let mut other = sample_tx(outputs());
        other.lock_time = 1;
        let result = verify_output_inclusion(&other.to_bytes(), &f.proof, &f.header, 0);
        assert!(matches!(result, Err(VerifyError::ProofMismatch { .. })));

        // Proof leaf rewritten to the other transaction's id
        let mut forged = f.proof.clone();
        forged.leaf = other.txid();
        let result = verify_output_inclusion(&other.to_bytes(), &forged, &f.header, 0);
        assert!(matches!(result, Err(VerifyError::ProofMismatch { .. })));
    }

    #[test]
    fn test_header_root_must_match() {
        let f = fixture(&sample_tx(outputs()));
        let other_header = BlockHeader::new(700, 2, Hash256([3; 32]), Hash256([4; 32]), 0, 0, 0);
        let result = verify_output_inclusion(&f.raw, &f.proof, &other_header, 0);
        assert!(matches!(result, Err(VerifyError::ProofMismatch { height: 700, .. })));
    }

    #[test]
    fn test_witness_bytes_must_be_stripped() {
        let mut tx = sample_tx(outputs());
        tx.witnesses = vec![vec![vec![0x30; 71], vec![0x02; 33]]];
        let f = fixture(&tx);

        assert_ne!(f.raw, tx.to_legacy_bytes());
        assert!(matches!(
            verify_output_inclusion(&f.raw, &f.proof, &f.header, 0),
            Err(VerifyError::ProofMismatch { .. })
        ));

        let claim = verify_output_inclusion(&tx.to_legacy_bytes(), &f.proof, &f.header, 0).unwrap();
        assert_eq!(claim.value, 50_000);
    }

    #[test]
    fn test_single_transaction_block() {
        let tx = sample_tx(outputs());
        let proof = prove_inclusion(&[tx.txid()], 0, 1).unwrap();
        let header = BlockHeader::new(1, 1, Hash256::ZERO, tx.txid(), 0, 0, 0);
        assert!(verify_output_inclusion(&tx.to_bytes(), &proof, &header, 1).is_ok());
    }
}
