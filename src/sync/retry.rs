//! Retry policy for collaborator reads

use super::error::SyncError;
use crate::chain::ClientError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Delay growth between attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed,
    /// Delay multiplied by `multiplier` per retry, capped at `max_delay`
    Exponential { multiplier: f64, max_delay: Duration },
}

/// Bounded retry of transient failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(5))
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: Backoff::Fixed,
        }
    }

    pub fn exponential(
        max_attempts: u32,
        delay: Duration,
        multiplier: f64,
        max_delay: Duration,
    ) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: Backoff::Exponential {
                multiplier,
                max_delay,
            },
        }
    }

    /// Check the policy can make progress
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.max_attempts == 0 {
            return Err(SyncError::InvalidConfig(
                "retry attempts must be at least 1".to_string(),
            ));
        }
        if let Backoff::Exponential { multiplier, .. } = self.backoff {
            if !multiplier.is_finite() || multiplier < 1.0 {
                return Err(SyncError::InvalidConfig(format!(
                    "retry multiplier must be a finite value >= 1, got {}",
                    multiplier
                )));
            }
        }
        Ok(())
    }

    /// Delay after the `attempt`-th failure (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential {
                multiplier,
                max_delay,
            } => {
                let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
                let secs = self.delay.as_secs_f64() * multiplier.powi(exponent);
                Duration::try_from_secs_f64(secs)
                    .map_or(max_delay, |delay| delay.min(max_delay))
            }
        }
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Retry delays observe `cancel`.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !error.is_transient() {
                return Err(SyncError::Client(error));
            }
            if attempt >= max_attempts {
                return Err(SyncError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    last: error,
                });
            }

            let delay = self.delay_for(attempt);
            log::warn!(
                "{} failed (attempt {}/{}): {}; retrying in {:?}",
                operation,
                attempt,
                max_attempts,
                error,
                delay
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
