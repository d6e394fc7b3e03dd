//! In-memory source chain for tests

use super::{prove_in_block, ClientError, SourceChain};
use crate::core::{BlockHeader, RawTransaction, TxInput, TxOutput};
use crate::crypto::{hash160, merkle_root, Hash256, MerkleProof};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;

/// Redeem script the second transaction of every block pays to
pub(crate) const REDEEM_SCRIPT: &[u8] = &[0x51, 0x21, 0x02, 0x03, 0x52, 0xae];

/// Transactions of the block at `height` on the branch `salt`: a coinbase
/// paying P2PKH, a segwit spend with P2SH and P2PKH outputs, and a
/// data-carrier transaction.
pub(crate) fn block_transactions(height: u32, salt: u32) -> Vec<RawTransaction> {
    let tag = [height.to_le_bytes(), salt.to_le_bytes()].concat();

    let coinbase = RawTransaction {
        version: 1,
        inputs: vec![TxInput {
            prev_txid: Hash256::ZERO,
            prev_vout: u32::MAX,
            script_sig: tag.clone(),
            sequence: u32::MAX,
        }],
        outputs: vec![TxOutput {
            value: 50 * 100_000_000,
            script_pubkey: p2pkh(hash160(&tag)),
        }],
        witnesses: Vec::new(),
        lock_time: 0,
    };

    let spend = RawTransaction {
        version: 2,
        inputs: vec![TxInput {
            prev_txid: Hash256::digest(&tag),
            prev_vout: 0,
            script_sig: Vec::new(),
            sequence: 0xffff_fffd,
        }],
        outputs: vec![
            TxOutput {
                value: 120_000,
                script_pubkey: p2sh(hash160(REDEEM_SCRIPT)),
            },
            TxOutput {
                value: 35_000,
                script_pubkey: p2pkh([0x11; 20]),
            },
        ],
        witnesses: vec![vec![vec![0x30; 71], vec![0x02; 33]]],
        lock_time: height,
    };

    let data = RawTransaction {
        version: 1,
        inputs: vec![TxInput {
            prev_txid: spend.txid(),
            prev_vout: 1,
            script_sig: vec![0x51],
            sequence: u32::MAX,
        }],
        outputs: vec![TxOutput {
            value: 0,
            script_pubkey: vec![0x6a, 0x04, 0xde, 0xad, 0xbe, 0xef],
        }],
        witnesses: Vec::new(),
        lock_time: 0,
    };

    vec![coinbase, spend, data]
}

fn p2pkh(hash: [u8; 20]) -> Vec<u8> {
    let mut script = vec![0x76, 0xa9, 0x14];
    script.extend_from_slice(&hash);
    script.extend_from_slice(&[0x88, 0xac]);
    script
}

fn p2sh(hash: [u8; 20]) -> Vec<u8> {
    let mut script = vec![0xa9, 0x14];
    script.extend_from_slice(&hash);
    script.push(0x87);
    script
}

fn transaction_ids(height: u32, salt: u32) -> Vec<Hash256> {
    block_transactions(height, salt)
        .iter()
        .map(RawTransaction::txid)
        .collect()
}

/// Build `count` linked headers on top of `prev_hash`, starting at
/// `start_height`. Different `salt` values give competing branches; the
/// salt is stored as the nonce and selects the block's transactions.
pub(crate) fn build_chain(
    prev_hash: Hash256,
    start_height: u32,
    count: u32,
    salt: u32,
) -> Vec<BlockHeader> {
    let mut headers = Vec::new();
    let mut prev = prev_hash;
    for height in start_height..start_height + count {
        let root = merkle_root(&transaction_ids(height, salt)).unwrap_or(Hash256::ZERO);
        let header = BlockHeader::new(
            height,
            0x2000_0000,
            prev,
            root,
            1_600_000_000 + height * 600,
            0x207f_ffff,
            salt,
        );
        prev = header.hash;
        headers.push(header);
    }
    headers
}

/// Source chain backed by a vector of headers starting at height 0
pub(crate) struct MemorySource {
    headers: RwLock<Vec<BlockHeader>>,
    failures: AtomicU32,
    reads: AtomicU32,
}

impl MemorySource {
    /// A chain of heights `0..=tip`
    pub(crate) fn new(tip: u32) -> Self {
        Self {
            headers: RwLock::new(build_chain(Hash256::ZERO, 0, tip + 1, 0)),
            failures: AtomicU32::new(0),
            reads: AtomicU32::new(0),
        }
    }

    pub(crate) async fn header(&self, height: u32) -> BlockHeader {
        self.headers.read().await[height as usize].clone()
    }

    /// Append `count` blocks to the tip
    pub(crate) async fn extend(&self, count: u32) {
        let mut headers = self.headers.write().await;
        let tip = headers[headers.len() - 1].clone();
        headers.extend(build_chain(tip.hash, tip.height + 1, count, tip.nonce));
    }

    /// Replace every block from `fork_height` with a competing branch whose
    /// new tip sits at `new_tip`
    pub(crate) async fn reorg(&self, fork_height: u32, new_tip: u32, salt: u32) {
        let mut headers = self.headers.write().await;
        headers.truncate(fork_height as usize);
        let parent = headers[headers.len() - 1].hash;
        headers.extend(build_chain(parent, fork_height, new_tip + 1 - fork_height, salt));
    }

    /// Fail the next `count` reads with a transient error
    pub(crate) fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Total reads attempted, failed ones included
    pub(crate) fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Best-chain block holding `txid`, and the transaction itself
    pub(crate) async fn find_transaction(
        &self,
        txid: &Hash256,
    ) -> Result<(BlockHeader, RawTransaction), ClientError> {
        self.check_available()?;
        let headers = self.headers.read().await;
        for header in headers.iter() {
            if let Some(tx) = block_transactions(header.height, header.nonce)
                .into_iter()
                .find(|tx| tx.txid() == *txid)
            {
                return Ok((header.clone(), tx));
            }
        }
        Err(ClientError::UnknownTransaction(*txid))
    }

    fn check_available(&self) -> Result<(), ClientError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let pending = self.failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures.store(pending - 1, Ordering::SeqCst);
            return Err(ClientError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SourceChain for MemorySource {
    async fn current_height(&self) -> Result<u32, ClientError> {
        self.check_available()?;
        let headers = self.headers.read().await;
        Ok(headers[headers.len() - 1].height)
    }

    async fn hash_at_height(&self, height: u32) -> Result<Hash256, ClientError> {
        self.check_available()?;
        self.headers
            .read()
            .await
            .get(height as usize)
            .map(|h| h.hash)
            .ok_or(ClientError::UnknownHeight(height))
    }

    async fn header_at_hash(&self, hash: &Hash256) -> Result<BlockHeader, ClientError> {
        self.check_available()?;
        self.headers
            .read()
            .await
            .iter()
            .find(|h| h.hash == *hash)
            .cloned()
            .ok_or(ClientError::UnknownBlock(*hash))
    }

    async fn transactions_in_block(&self, hash: &Hash256) -> Result<Vec<Vec<u8>>, ClientError> {
        let header = self.header_at_hash(hash).await?;
        Ok(block_transactions(header.height, header.nonce)
            .iter()
            .map(RawTransaction::to_bytes)
            .collect())
    }

    async fn transaction_ids_in_block(
        &self,
        hash: &Hash256,
    ) -> Result<Vec<Hash256>, ClientError> {
        let header = self.header_at_hash(hash).await?;
        Ok(transaction_ids(header.height, header.nonce))
    }

    async fn merkle_proof_for_transaction(
        &self,
        txid: &Hash256,
    ) -> Result<MerkleProof, ClientError> {
        let (header, _) = self.find_transaction(txid).await?;
        let txids = self.transaction_ids_in_block(&header.hash).await?;
        prove_in_block(&header, &txids, txid)
    }

    async fn raw_transaction(&self, txid: &Hash256) -> Result<Vec<u8>, ClientError> {
        let (_, tx) = self.find_transaction(txid).await?;
        Ok(tx.to_bytes())
    }
}
