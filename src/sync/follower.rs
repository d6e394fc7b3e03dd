//! Chain follower
//!
//! Keeps the relay mirror on the source chain's best chain. Each pass
//! compares the two tips, walks back to the last height both agree on when
//! they differ, and submits the next batch of source headers from there.
//! Passes run strictly one after another; nothing is cached between them.

use super::config::SyncConfig;
use super::error::SyncError;
use super::state::{ChainTip, PassOutcome, SyncPhase, SyncState};
use crate::chain::{ClientError, MirrorReader, MirrorWriter, SourceChain, SubmissionReceipt};
use crate::core::{validate_header_chain, BlockHeader};
use crate::crypto::{EncodingError, Hash256};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Reorg-aware header synchronizer
pub struct ChainFollower<M, S> {
    mirror: Arc<M>,
    source: Arc<S>,
    config: SyncConfig,
    cancel: CancellationToken,
    phase: watch::Sender<SyncPhase>,
}

impl<M, S> ChainFollower<M, S>
where
    M: MirrorReader + MirrorWriter,
    S: SourceChain,
{
    /// Create a follower; fails on an invalid configuration
    pub fn new(mirror: Arc<M>, source: Arc<S>, config: SyncConfig) -> Result<Self, SyncError> {
        config.validate()?;
        let (phase, _) = watch::channel(SyncPhase::Idle);

        Ok(Self {
            mirror,
            source,
            config,
            cancel: CancellationToken::new(),
            phase,
        })
    }

    /// Token that stops `run` when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Watch phase transitions
    pub fn subscribe(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    /// Current phase
    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn set_phase(&self, phase: SyncPhase) {
        log::trace!("Follower phase: {}", phase);
        self.phase.send_replace(phase);
    }

    async fn read<T, F, Fut>(&self, operation: &str, op: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        self.config.retry.run(operation, &self.cancel, op).await
    }

    // =========================================================================
    // State machine steps
    // =========================================================================

    /// Read both tips
    pub async fn compare(&self) -> Result<SyncState, SyncError> {
        self.set_phase(SyncPhase::Comparing);

        let mirror_height = self
            .read("mirror height", || self.mirror.latest_height())
            .await?;
        let mirror_hash = self
            .read("mirror hash", || self.mirror.hash_at_height(mirror_height))
            .await?;
        let source_height = self
            .read("source height", || self.source.current_height())
            .await?;
        let source_hash = self
            .read("source hash", || self.source.hash_at_height(source_height))
            .await?;

        let state = SyncState::new(
            ChainTip::new(mirror_height, mirror_hash),
            ChainTip::new(source_height, source_hash),
        );
        log::debug!(
            "Mirror tip {}, source tip {}",
            state.mirror_tip(),
            state.source_tip()
        );

        self.set_phase(if state.is_matched() {
            SyncPhase::Matched
        } else {
            SyncPhase::Diverged
        });
        Ok(state)
    }

    /// Walk back from the lower of the two tips until mirror and source
    /// agree. Returns the first divergent height and the agreed hash just
    /// below it.
    pub async fn locate_fork(&self, state: &SyncState) -> Result<(u32, Hash256), SyncError> {
        self.set_phase(SyncPhase::LocatingFork);

        let start = state.mirror_height.min(state.source_height);
        let max_depth = self.config.max_reorg_depth;
        let mut height = start;

        loop {
            let mirror_hash = match self
                .read("mirror hash", || self.mirror.hash_at_height(height))
                .await
            {
                Ok(hash) => hash,
                // The mirror keeps nothing below its trusted base
                Err(SyncError::Client(ClientError::UnknownHeight(missing)))
                    if missing == height =>
                {
                    log::error!(
                        "Mirror has no header at {}; fork lies below its base",
                        height
                    );
                    return Err(SyncError::ReorgTooDeep {
                        from_height: start,
                        max_depth,
                    });
                }
                Err(e) => return Err(e),
            };
            let source_hash = self
                .read("source hash", || self.source.hash_at_height(height))
                .await?;

            if mirror_hash == source_hash {
                log::debug!(
                    "Mirror and source agree at {} ({} below {})",
                    height,
                    start - height,
                    start
                );
                return Ok((height + 1, mirror_hash));
            }

            if start - height >= max_depth || height == 0 {
                return Err(SyncError::ReorgTooDeep {
                    from_height: start,
                    max_depth,
                });
            }
            height -= 1;
        }
    }

    /// Fetch `[fork_height, source_height]` in ascending order, capped at
    /// the batch count, and check it chains from `agreed_hash`
    pub async fn build_batch(
        &self,
        fork_height: u32,
        agreed_hash: &Hash256,
        source_height: u32,
    ) -> Result<Vec<BlockHeader>, SyncError> {
        self.set_phase(SyncPhase::Batching);

        if fork_height > source_height {
            return Err(SyncError::SourceInconsistent(format!(
                "fork height {} above source tip {}",
                fork_height, source_height
            )));
        }
        let last = source_height.min(fork_height.saturating_add(self.config.batch_count - 1));
        let mut batch = Vec::with_capacity((last - fork_height + 1) as usize);

        for height in fork_height..=last {
            let hash = self
                .read("source hash", || self.source.hash_at_height(height))
                .await?;
            let header = self
                .read("source header", || self.source.header_at_hash(&hash))
                .await?;

            if header.height != height {
                return Err(SyncError::SourceInconsistent(format!(
                    "header {} reported at height {}, requested {}",
                    hash, header.height, height
                )));
            }
            log::debug!("Batched header {} at {}", header.hash, height);
            batch.push(header);
        }

        // The source may have reorganized while the batch was fetched
        validate_header_chain(fork_height, agreed_hash, &batch).map_err(|e| match e {
            EncodingError::BrokenChain { .. } => SyncError::SourceInconsistent(e.to_string()),
            other => SyncError::Encoding(other),
        })?;

        Ok(batch)
    }

    /// Hand a batch to the mirror writer. Not retried: submissions are not
    /// idempotent and the next pass re-derives the fork point instead.
    pub async fn submit(
        &self,
        start_height: u32,
        batch: &[BlockHeader],
    ) -> Result<SubmissionReceipt, SyncError> {
        self.set_phase(SyncPhase::AwaitingSubmitResult);

        let receipt = self
            .mirror
            .submit_headers(start_height, batch)
            .await
            .map_err(|e| match e {
                ClientError::Rejected(reason) => SyncError::SubmissionRejected {
                    start_height,
                    reason,
                },
                other => SyncError::Client(other),
            })?;

        log::info!(
            "Submitted {} headers [{}, {}], tip {} ({})",
            receipt.count,
            start_height,
            start_height + receipt.count.saturating_sub(1),
            receipt.tip_hash,
            receipt.reference
        );
        Ok(receipt)
    }

    // =========================================================================
    // Passes
    // =========================================================================

    /// Run a single compare / locate / batch / submit pass
    pub async fn run_pass(&self) -> Result<PassOutcome, SyncError> {
        let mut state = self.compare().await?;
        if state.is_matched() {
            return Ok(PassOutcome::InSync(state.mirror_tip()));
        }

        let (fork_height, agreed_hash) = self.locate_fork(&state).await?;
        state.fork_height = Some(fork_height);

        if fork_height > state.source_height {
            log::warn!(
                "Mirror tip {} is ahead of source tip {}; waiting for the source",
                state.mirror_tip(),
                state.source_tip()
            );
            return Ok(PassOutcome::SourceBehind {
                mirror: state.mirror_tip(),
                source: state.source_tip(),
            });
        }

        let batch = self
            .build_batch(fork_height, &agreed_hash, state.source_height)
            .await?;
        let receipt = self.submit(fork_height, &batch).await?;

        Ok(PassOutcome::Submitted {
            fork_height,
            receipt,
        })
    }

    /// Run passes until cancelled.
    ///
    /// Sleeps the poll interval after an idle or failed pass and starts the
    /// next pass immediately after a submission. Returns an error only for
    /// fatal conditions.
    pub async fn run(&self) -> Result<(), SyncError> {
        log::info!(
            "Chain follower started (batch {}, poll {:?}, max reorg depth {})",
            self.config.batch_count,
            self.config.poll_interval,
            self.config.max_reorg_depth
        );

        while !self.cancel.is_cancelled() {
            match self.run_pass().await {
                Ok(PassOutcome::Submitted { .. }) => continue,
                Ok(PassOutcome::InSync(tip)) => log::debug!("Mirror in sync at {}", tip),
                Ok(PassOutcome::SourceBehind { .. }) => {}
                Err(SyncError::Cancelled) => break,
                Err(e) if e.is_fatal() => {
                    log::error!("Chain follower stopping: {}", e);
                    self.set_phase(SyncPhase::Stopped);
                    return Err(e);
                }
                Err(e) => log::error!("Sync pass failed: {}", e),
            }

            self.set_phase(SyncPhase::Sleeping);
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        log::info!("Chain follower stopped");
        self.set_phase(SyncPhase::Stopped);
        Ok(())
    }
}
