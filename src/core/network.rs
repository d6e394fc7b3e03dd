//! Source chain networks
//!
//! Network selection drives address version bytes and the default RPC
//! endpoint for local development.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bitcoin networks the relay can follow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum Network {
    #[default]
    #[serde(rename = "btc-mainnet")]
    #[value(name = "btc-mainnet")]
    Mainnet,
    #[serde(rename = "btc-testnet")]
    #[value(name = "btc-testnet")]
    Testnet,
    #[serde(rename = "btc-regtest")]
    #[value(name = "btc-regtest")]
    Regtest,
}

impl Network {
    /// Base58Check version byte for P2PKH addresses
    pub fn p2pkh_version(&self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            Network::Testnet | Network::Regtest => 0x6f,
        }
    }

    /// Base58Check version byte for P2SH addresses
    pub fn p2sh_version(&self) -> u8 {
        match self {
            Network::Mainnet => 0x05,
            Network::Testnet | Network::Regtest => 0xc4,
        }
    }

    /// Default JSON-RPC credentials, matching the default regtest endpoint
    pub fn default_rpc_auth(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Network::Regtest => Some(("user", "pass")),
            _ => None,
        }
    }

    /// Default JSON-RPC endpoint, only known for a local regtest node
    pub fn default_rpc_url(&self) -> Option<&'static str> {
        match self {
            Network::Regtest => Some("http://127.0.0.1:18443"),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "btc-mainnet",
            Network::Testnet => "btc-testnet",
            Network::Regtest => "btc-regtest",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions() {
        assert_eq!(Network::Mainnet.p2pkh_version(), 0x00);
        assert_eq!(Network::Mainnet.p2sh_version(), 0x05);
        assert_eq!(Network::Regtest.p2sh_version(), 0xc4);
        assert_eq!(Network::Regtest.default_rpc_auth(), Some(("user", "pass")));
        assert_eq!(Network::Mainnet.default_rpc_auth(), None);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Network::Regtest).unwrap();
        assert_eq!(json, "\"btc-regtest\"");
        let back: Network = serde_json::from_str("\"btc-testnet\"").unwrap();
        assert_eq!(back, Network::Testnet);
    }
}
