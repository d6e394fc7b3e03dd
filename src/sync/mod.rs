//! Header synchronization
//!
//! This module provides:
//! - The chain follower state machine
//! - Per-pass sync state and phases
//! - Retry policy for collaborator reads
//! - Relay and follower configuration

pub mod config;
pub mod error;
pub mod follower;
pub mod retry;
pub mod state;

pub use config::{ConfigError, RelayConfig, SyncConfig, SyncSettings};
pub use error::SyncError;
pub use follower::ChainFollower;
pub use retry::{Backoff, RetryPolicy};
pub use state::{ChainTip, PassOutcome, SyncPhase, SyncState};
