//! Operator command line
//!
//! Command handlers and the helpers `main` uses to layer configuration and
//! set up logging.

pub mod commands;

pub use commands::*;

use log::LevelFilter;

/// Parse a `--log-level` value
pub fn parse_log_level(level: &str) -> Result<LevelFilter, String> {
    match level.to_ascii_lowercase().as_str() {
        "d" | "debug" => Ok(LevelFilter::Debug),
        "i" | "info" => Ok(LevelFilter::Info),
        "w" | "warn" | "warning" => Ok(LevelFilter::Warn),
        "e" | "error" => Ok(LevelFilter::Error),
        other => Err(format!(
            "unknown log level '{}' (expected debug, info, warn or error)",
            other
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("d"), Ok(LevelFilter::Debug));
        assert_eq!(parse_log_level("INFO"), Ok(LevelFilter::Info));
        assert_eq!(parse_log_level("warning"), Ok(LevelFilter::Warn));
        assert_eq!(parse_log_level("e"), Ok(LevelFilter::Error));
        assert!(parse_log_level("trace").is_err());
    }
}
