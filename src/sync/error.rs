//! Synchronizer errors

use crate::chain::ClientError;
use crate::crypto::EncodingError;
use thiserror::Error;

/// Errors that end a synchronization pass
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("no common ancestor within {max_depth} blocks below height {from_height}")]
    ReorgTooDeep { from_height: u32, max_depth: u32 },

    #[error("mirror rejected batch starting at {start_height}: {reason}")]
    SubmissionRejected { start_height: u32, reason: String },

    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last: ClientError,
    },

    #[error("source chain inconsistent: {0}")]
    SourceInconsistent(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("cancelled")]
    Cancelled,
}

impl SyncError {
    /// Whether the follower must stop instead of retrying on the next pass
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::ReorgTooDeep { .. } | SyncError::InvalidConfig(_)
        )
    }
}
