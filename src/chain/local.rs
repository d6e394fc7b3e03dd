//! In-process relay mirror
//!
//! Holds the header hashes a relay contract would store, starting from one
//! trusted header, and applies the contract's acceptance rules to each
//! submitted batch.

use super::{ClientError, MirrorReader, MirrorWriter, SubmissionReceipt};
use crate::core::{validate_header_chain, BlockHeader};
use crate::crypto::Hash256;
use async_trait::async_trait;
use tokio::sync::RwLock;

#[derive(Debug)]
struct MirrorState {
    /// Height of the trusted header
    base_height: u32,
    /// Recorded hashes; index 0 is the trusted header
    hashes: Vec<Hash256>,
    /// Accepted batches so far
    submissions: u64,
}

impl MirrorState {
    fn tip_height(&self) -> u32 {
        // `hashes` is never empty and never grows past u32 heights
        self.base_height + (self.hashes.len() as u32 - 1)
    }

    fn hash_at(&self, height: u32) -> Option<Hash256> {
        let offset = height.checked_sub(self.base_height)? as usize;
        self.hashes.get(offset).copied()
    }
}

/// Relay mirror kept in memory
#[derive(Debug)]
pub struct LocalMirror {
    state: RwLock<MirrorState>,
}

impl LocalMirror {
    /// Create a mirror trusting `hash` at `height`
    pub fn new(height: u32, hash: Hash256) -> Self {
        Self {
            state: RwLock::new(MirrorState {
                base_height: height,
                hashes: vec![hash],
                submissions: 0,
            }),
        }
    }

    /// Create a mirror trusting `header`
    pub fn from_header(header: &BlockHeader) -> Self {
        Self::new(header.height, header.hash)
    }

    /// Number of batches accepted
    pub async fn submissions(&self) -> u64 {
        self.state.read().await.submissions
    }
}

#[async_trait]
impl MirrorReader for LocalMirror {
    async fn latest_height(&self) -> Result<u32, ClientError> {
        Ok(self.state.read().await.tip_height())
    }

    async fn hash_at_height(&self, height: u32) -> Result<Hash256, ClientError> {
        self.state
            .read()
            .await
            .hash_at(height)
            .ok_or(ClientError::UnknownHeight(height))
    }
}

#[async_trait]
impl MirrorWriter for LocalMirror {
    async fn submit_headers(
        &self,
        start_height: u32,
        headers: &[BlockHeader],
    ) -> Result<SubmissionReceipt, ClientError> {
        let mut state = self.state.write().await;

        if headers.is_empty() {
            return Err(ClientError::Rejected("empty header batch".to_string()));
        }
        let tip = state.tip_height();
        if start_height <= state.base_height || start_height > tip + 1 {
            return Err(ClientError::Rejected(format!(
                "start height {} outside ({}, {}]",
                start_height,
                state.base_height,
                tip + 1
            )));
        }
        let count = u32::try_from(headers.len())
            .map_err(|_| ClientError::Rejected("header batch too large".to_string()))?;

        let parent = state
            .hash_at(start_height - 1)
            .ok_or(ClientError::UnknownHeight(start_height - 1))?;
        validate_header_chain(start_height, &parent, headers)
            .map_err(|e| ClientError::Rejected(e.to_string()))?;

        // Replace everything above the parent
        let keep = (start_height - state.base_height) as usize;
        state.hashes.truncate(keep);
        state.hashes.extend(headers.iter().map(|h| h.hash));
        state.submissions += 1;

        let tip_hash = headers[headers.len() - 1].hash;
        log::debug!(
            "Local mirror accepted {} headers at {}, tip {}",
            count,
            start_height,
            tip_hash
        );

        Ok(SubmissionReceipt {
            start_height,
            count,
            tip_hash,
            reference: format!("local-{}", state.submissions),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::testing::build_chain;

    fn seeded() -> (LocalMirror, Vec<BlockHeader>) {
        let chain = build_chain(Hash256::ZERO, 10, 6, 0);
        (LocalMirror::from_header(&chain[0]), chain)
    }

    #[tokio::test]
    async fn test_trusted_header() {
        let (mirror, chain) = seeded();
        assert_eq!(mirror.latest_height().await.unwrap(), 10);
        assert_eq!(mirror.hash_at_height(10).await.unwrap(), chain[0].hash);
        assert_eq!(
            mirror.hash_at_height(9).await,
            Err(ClientError::UnknownHeight(9))
        );
    }

    #[tokio::test]
    async fn test_extend() {
        let (mirror, chain) = seeded();
        let receipt = mirror.submit_headers(11, &chain[1..4]).await.unwrap();
        assert_eq!(receipt.count, 3);
        assert_eq!(receipt.tip_hash, chain[3].hash);
        assert_eq!(mirror.latest_height().await.unwrap(), 13);
        assert_eq!(mirror.submissions().await, 1);
    }

    #[tokio::test]
    async fn test_reorg_replaces_suffix() {
        let (mirror, chain) = seeded();
        mirror.submit_headers(11, &chain[1..6]).await.unwrap();

        let branch = build_chain(chain[2].hash, 13, 2, 7);
        mirror.submit_headers(13, &branch).await.unwrap();
        assert_eq!(mirror.latest_height().await.unwrap(), 14);
        assert_eq!(mirror.hash_at_height(13).await.unwrap(), branch[0].hash);
        assert_eq!(mirror.hash_at_height(15).await, Err(ClientError::UnknownHeight(15)));
    }

    #[tokio::test]
    async fn test_rejections() {
        let (mirror, chain) = seeded();

        // Gap above tip
        assert!(matches!(
            mirror.submit_headers(12, &chain[2..3]).await,
            Err(ClientError::Rejected(_))
        ));
        // Rewriting the trusted header
        assert!(matches!(
            mirror.submit_headers(10, &chain[0..2]).await,
            Err(ClientError::Rejected(_))
        ));
        // Wrong parent
        let orphan = build_chain(Hash256([1; 32]), 11, 1, 0);
        assert!(matches!(
            mirror.submit_headers(11, &orphan).await,
            Err(ClientError::Rejected(_))
        ));
        // Tampered identity
        let mut forged = chain[1].clone();
        forged.nonce ^= 1;
        assert!(matches!(
            mirror.submit_headers(11, &[forged]).await,
            Err(ClientError::Rejected(_))
        ));
        assert!(matches!(
            mirror.submit_headers(11, &[]).await,
            Err(ClientError::Rejected(_))
        ));

        assert_eq!(mirror.latest_height().await.unwrap(), 10);
        assert_eq!(mirror.submissions().await, 0);
    }
}
