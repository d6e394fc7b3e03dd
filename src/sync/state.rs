//! Synchronizer state

use crate::chain::SubmissionReceipt;
use crate::crypto::Hash256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in a header chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTip {
    pub height: u32,
    pub hash: Hash256,
}

impl ChainTip {
    pub fn new(height: u32, hash: Hash256) -> Self {
        Self { height, hash }
    }
}

impl fmt::Display for ChainTip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.hash, self.height)
    }
}

/// Tips observed in one pass; recomputed every pass and never persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    pub mirror_height: u32,
    pub mirror_hash: Hash256,
    pub source_height: u32,
    pub source_hash: Hash256,
    /// First height where the mirror disagrees with the source
    pub fork_height: Option<u32>,
}

impl SyncState {
    pub fn new(mirror: ChainTip, source: ChainTip) -> Self {
        Self {
            mirror_height: mirror.height,
            mirror_hash: mirror.hash,
            source_height: source.height,
            source_hash: source.hash,
            fork_height: None,
        }
    }

    pub fn mirror_tip(&self) -> ChainTip {
        ChainTip::new(self.mirror_height, self.mirror_hash)
    }

    pub fn source_tip(&self) -> ChainTip {
        ChainTip::new(self.source_height, self.source_hash)
    }

    /// Both tips agree in height and hash
    pub fn is_matched(&self) -> bool {
        self.mirror_tip() == self.source_tip()
    }
}

/// Phases of the follower state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncPhase {
    Idle,
    Comparing,
    Matched,
    Diverged,
    Sleeping,
    LocatingFork,
    Batching,
    AwaitingSubmitResult,
    Stopped,
}

impl SyncPhase {
    pub fn name(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Comparing => "comparing",
            SyncPhase::Matched => "matched",
            SyncPhase::Diverged => "diverged",
            SyncPhase::Sleeping => "sleeping",
            SyncPhase::LocatingFork => "locating-fork",
            SyncPhase::Batching => "batching",
            SyncPhase::AwaitingSubmitResult => "awaiting-submit-result",
            SyncPhase::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one completed pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Mirror and source agree
    InSync(ChainTip),
    /// Mirror agrees with the source up to the source tip but is ahead of
    /// it; nothing to submit until the source catches up
    SourceBehind { mirror: ChainTip, source: ChainTip },
    /// A batch starting at `fork_height` was accepted
    Submitted {
        fork_height: u32,
        receipt: SubmissionReceipt,
    },
}
