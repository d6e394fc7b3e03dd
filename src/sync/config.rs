//! Relay configuration
//!
//! Settings are layered: built-in defaults, then an optional JSON file,
//! then command-line flags and environment variables applied by the caller.

use super::error::SyncError;
use super::retry::RetryPolicy;
use crate::core::Network;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default poll interval between passes
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Default maximum headers per submission
pub const DEFAULT_BATCH_COUNT: u32 = 5;

/// Default backward scan bound (~1 day of blocks)
pub const DEFAULT_MAX_REORG_DEPTH: u32 = 144;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime settings of the chain follower
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Sleep between passes once the mirror is caught up
    pub poll_interval: Duration,
    /// Maximum headers submitted in one batch
    pub batch_count: u32,
    /// Maximum heights walked backward looking for a common ancestor
    pub max_reorg_depth: u32,
    /// Retry policy for collaborator reads
    pub retry: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_count: DEFAULT_BATCH_COUNT,
            max_reorg_depth: DEFAULT_MAX_REORG_DEPTH,
            retry: RetryPolicy::default(),
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.batch_count == 0 {
            return Err(SyncError::InvalidConfig(
                "batch count must be at least 1".to_string(),
            ));
        }
        if self.max_reorg_depth == 0 {
            return Err(SyncError::InvalidConfig(
                "max reorg depth must be at least 1".to_string(),
            ));
        }
        self.retry.validate()
    }
}

/// Sync section of the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub poll_interval_secs: u64,
    pub batch_count: u32,
    pub max_reorg_depth: u32,
    pub retry_attempts: u32,
    pub retry_delay_secs: u64,
    /// Enables exponential backoff when set
    pub retry_multiplier: Option<f64>,
    pub retry_max_delay_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        let defaults = SyncConfig::default();
        Self {
            poll_interval_secs: defaults.poll_interval.as_secs(),
            batch_count: defaults.batch_count,
            max_reorg_depth: defaults.max_reorg_depth,
            retry_attempts: defaults.retry.max_attempts,
            retry_delay_secs: defaults.retry.delay.as_secs(),
            retry_multiplier: None,
            retry_max_delay_secs: 300,
        }
    }
}

impl SyncSettings {
    /// Build and validate the follower configuration
    pub fn to_config(&self) -> Result<SyncConfig, ConfigError> {
        let delay = Duration::from_secs(self.retry_delay_secs);
        let retry = match self.retry_multiplier {
            Some(multiplier) => RetryPolicy::exponential(
                self.retry_attempts,
                delay,
                multiplier,
                Duration::from_secs(self.retry_max_delay_secs),
            ),
            None => RetryPolicy::fixed(self.retry_attempts, delay),
        };

        let config = SyncConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            batch_count: self.batch_count,
            max_reorg_depth: self.max_reorg_depth,
            retry,
        };
        config
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(config)
    }
}

/// Complete relay configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub chain: Network,
    /// Bitcoin Core JSON-RPC endpoint
    pub btc_rpc_url: Option<String>,
    pub rpc_user: Option<String>,
    pub rpc_password: Option<String>,
    pub sync: SyncSettings,
}

impl RelayConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = fs::File::open(path)?;
        let config = serde_json::from_reader(BufReader::new(file))?;
        Ok(config)
    }

    /// RPC endpoint, falling back to the network's local default
    pub fn rpc_url(&self) -> Result<String, ConfigError> {
        self.btc_rpc_url
            .clone()
            .or_else(|| self.chain.default_rpc_url().map(str::to_string))
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "no RPC URL configured for {} (use --btc-rpc-url or BTCRELAY_BTCRPC)",
                    self.chain
                ))
            })
    }

    /// RPC user and password; without a configured user a regtest node
    /// falls back to its local defaults
    pub fn rpc_credentials(&self) -> Option<(String, Option<String>)> {
        match &self.rpc_user {
            Some(user) => Some((user.clone(), self.rpc_password.clone())),
            None => self
                .chain
                .default_rpc_auth()
                .map(|(user, password)| (user.to_string(), Some(password.to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = SyncSettings::default().to_config().unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.batch_count, 5);
        assert_eq!(config.max_reorg_depth, 144);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_rejects_zero_bounds() {
        let mut settings = SyncSettings::default();
        settings.batch_count = 0;
        assert!(matches!(settings.to_config(), Err(ConfigError::Invalid(_))));

        let mut settings = SyncSettings::default();
        settings.max_reorg_depth = 0;
        assert!(matches!(settings.to_config(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"chain": "btc-regtest", "sync": {{"batch_count": 20, "retry_multiplier": 2.0}}}}"#
        )
        .unwrap();

        let config = RelayConfig::load(file.path()).unwrap();
        assert_eq!(config.chain, Network::Regtest);
        assert_eq!(config.rpc_url().unwrap(), "http://127.0.0.1:18443");
        assert_eq!(
            config.rpc_credentials(),
            Some(("user".to_string(), Some("pass".to_string())))
        );

        let sync = config.sync.to_config().unwrap();
        assert_eq!(sync.batch_count, 20);
        assert_eq!(sync.max_reorg_depth, DEFAULT_MAX_REORG_DEPTH);
        assert!(matches!(
            sync.retry.backoff,
            crate::sync::retry::Backoff::Exponential { .. }
        ));
    }

    #[test]
    fn test_missing_rpc_url() {
        let config = RelayConfig::default();
        assert!(config.rpc_url().is_err());
        assert_eq!(config.rpc_credentials(), None);
    }

    #[test]
    fn test_configured_user_beats_regtest_default() {
        let config = RelayConfig {
            chain: Network::Regtest,
            rpc_user: Some("alice".to_string()),
            ..Default::default()
        };
        assert_eq!(config.rpc_credentials(), Some(("alice".to_string(), None)));
    }

    #[test]
    fn test_bad_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            RelayConfig::load(file.path()),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            RelayConfig::load(Path::new("/nonexistent/relay.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
