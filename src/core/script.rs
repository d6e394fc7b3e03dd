//! Output locking scripts
//!
//! Recognizes the two standard templates a payment attestation accepts,
//! purely by structure:
//! - P2PKH: `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`
//! - P2SH:  `OP_HASH160 <20> OP_EQUAL`

use crate::core::network::Network;
use crate::crypto::{double_sha256, hash160};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Script Constants
// =============================================================================

pub const OP_DUP: u8 = 0x76;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_CHECKSIG: u8 = 0xac;

/// Push of exactly 20 bytes
const OP_PUSHBYTES_20: u8 = 0x14;

/// P2PKH script length
pub const P2PKH_SCRIPT_SIZE: usize = 25;

/// P2SH script length
pub const P2SH_SCRIPT_SIZE: usize = 23;

// =============================================================================
// Script Types
// =============================================================================

/// Output script templates the verifier recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptType {
    /// Pay to Public Key Hash
    P2PKH,
    /// Pay to Script Hash
    P2SH,
}

impl ScriptType {
    /// Get the script type name
    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptType::P2PKH => "P2PKH",
            ScriptType::P2SH => "P2SH",
        }
    }

    /// Size of the script template in bytes
    pub fn script_size(&self) -> usize {
        match self {
            ScriptType::P2PKH => P2PKH_SCRIPT_SIZE,
            ScriptType::P2SH => P2SH_SCRIPT_SIZE,
        }
    }

    /// Build the locking script for `hash`
    pub fn script_for(&self, hash: &[u8; 20]) -> Vec<u8> {
        let mut script = Vec::with_capacity(self.script_size());
        match self {
            ScriptType::P2PKH => {
                script.extend_from_slice(&[OP_DUP, OP_HASH160, OP_PUSHBYTES_20]);
                script.extend_from_slice(hash);
                script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
            }
            ScriptType::P2SH => {
                script.extend_from_slice(&[OP_HASH160, OP_PUSHBYTES_20]);
                script.extend_from_slice(hash);
                script.push(OP_EQUAL);
            }
        }
        script
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

fn embedded_hash(bytes: &[u8]) -> [u8; 20] {
    let mut hash = [0u8; 20];
    hash.copy_from_slice(bytes);
    hash
}

/// Match a locking script against the templates.
///
/// The script must be exactly the template; anything else (extra opcodes,
/// other push lengths) is not recognized.
pub fn classify(script: &[u8]) -> Option<(ScriptType, [u8; 20])> {
    match script {
        [OP_DUP, OP_HASH160, OP_PUSHBYTES_20, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG]
            if hash.len() == 20 =>
        {
            Some((ScriptType::P2PKH, embedded_hash(hash)))
        }
        [OP_HASH160, OP_PUSHBYTES_20, hash @ .., OP_EQUAL] if hash.len() == 20 => {
            Some((ScriptType::P2SH, embedded_hash(hash)))
        }
        _ => None,
    }
}

// =============================================================================
// Output Claims
// =============================================================================

/// A decoded, proven transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutputClaim {
    pub script_type: ScriptType,
    /// HASH160 embedded in the locking script
    #[serde(with = "hex::serde")]
    pub decoded_hash: [u8; 20],
    /// Output value in satoshis
    pub value: u64,
}

impl TransactionOutputClaim {
    /// Base58Check address for this output on `network`
    pub fn address(&self, network: Network) -> String {
        let version = match self.script_type {
            ScriptType::P2PKH => network.p2pkh_version(),
            ScriptType::P2SH => network.p2sh_version(),
        };

        let mut address_bytes = vec![version];
        address_bytes.extend_from_slice(&self.decoded_hash);

        // Checksum is the first 4 bytes of double SHA256
        let checksum = double_sha256(&address_bytes);
        address_bytes.extend_from_slice(&checksum[..4]);

        bs58::encode(address_bytes).into_string()
    }

    /// Whether this output pays to `public_key` (P2PKH only)
    pub fn pays_to_pubkey(&self, public_key: &[u8]) -> bool {
        self.script_type == ScriptType::P2PKH && hash160(public_key) == self.decoded_hash
    }

    /// Whether this output pays to `redeem_script` (P2SH only)
    pub fn pays_to_redeem_script(&self, redeem_script: &[u8]) -> bool {
        self.script_type == ScriptType::P2SH && hash160(redeem_script) == self.decoded_hash
    }
}

// =============================================================================
// Tests
// =============================================================================
