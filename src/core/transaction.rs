//! Raw Bitcoin transactions
//!
//! Parses the legacy and witness wire serializations far enough to reach
//! outputs and to recompute the transaction id. Nothing here validates
//! signatures or amounts; the relay only needs the structure.

use crate::crypto::{double_sha256, EncodingError, Hash256};
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

// =============================================================================
// Constants
// =============================================================================

/// Marker byte introducing the witness serialization (BIP-144)
const WITNESS_MARKER: u8 = 0x00;

/// Flag byte following the witness marker
const WITNESS_FLAG: u8 = 0x01;

// =============================================================================
// Transaction Types
// =============================================================================

/// Transaction input (reference to a previous output)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub prev_txid: Hash256,
    pub prev_vout: u32,
    #[serde(with = "hex::serde")]
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Amount in satoshis
    pub value: u64,
    #[serde(with = "hex::serde")]
    pub script_pubkey: Vec<u8>,
}

/// A fully parsed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub version: i32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    /// Witness stacks, one per input; empty for legacy transactions
    pub witnesses: Vec<Vec<Vec<u8>>>,
    pub lock_time: u32,
}

/// Result of looking up one output by index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLookup {
    Found(TxOutput),
    OutOfRange { count: u64 },
}

// =============================================================================
// Byte Reader
// =============================================================================

/// Bounds-checked cursor over serialized transaction bytes
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn need(&self, n: usize, what: &str) -> Result<(), EncodingError> {
        if self.buf.remaining() < n {
            return Err(EncodingError::MalformedTransaction(format!(
                "truncated while reading {} ({} bytes left, {} needed)",
                what,
                self.buf.remaining(),
                n
            )));
        }
        Ok(())
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.buf.get(offset).copied()
    }

    fn u8(&mut self, what: &str) -> Result<u8, EncodingError> {
        self.need(1, what)?;
        Ok(self.buf.get_u8())
    }

    fn u32_le(&mut self, what: &str) -> Result<u32, EncodingError> {
        self.need(4, what)?;
        Ok(self.buf.get_u32_le())
    }

    fn i32_le(&mut self, what: &str) -> Result<i32, EncodingError> {
        self.need(4, what)?;
        Ok(self.buf.get_i32_le())
    }

    fn u64_le(&mut self, what: &str) -> Result<u64, EncodingError> {
        self.need(8, what)?;
        Ok(self.buf.get_u64_le())
    }

    fn bytes(&mut self, n: usize, what: &str) -> Result<&'a [u8], EncodingError> {
        self.need(n, what)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn hash(&mut self, what: &str) -> Result<Hash256, EncodingError> {
        Hash256::from_slice(self.bytes(32, what)?)
    }

    /// Bitcoin compact-size integer
    fn compact_size(&mut self, what: &str) -> Result<u64, EncodingError> {
        let value = match self.u8(what)? {
            0xfd => {
                self.need(2, what)?;
                u64::from(self.buf.get_u16_le())
            }
            0xfe => u64::from(self.u32_le(what)?),
            0xff => self.u64_le(what)?,
            n => u64::from(n),
        };
        Ok(value)
    }

    /// A compact-size count that cannot exceed the bytes left
    fn count(&mut self, what: &str) -> Result<usize, EncodingError> {
        let n = self.compact_size(what)?;
        if n > self.buf.remaining() as u64 {
            return Err(EncodingError::MalformedTransaction(format!(
                "{} count {} exceeds remaining {} bytes",
                what,
                n,
                self.buf.remaining()
            )));
        }
        Ok(n as usize)
    }

    fn var_bytes(&mut self, what: &str) -> Result<&'a [u8], EncodingError> {
        let len = self.count(what)?;
        self.bytes(len, what)
    }

    /// Consume the witness marker/flag if present
    fn witness_flag(&mut self) -> Result<bool, EncodingError> {
        if self.peek(0) == Some(WITNESS_MARKER) && self.peek(1) == Some(WITNESS_FLAG) {
            self.bytes(2, "witness marker")?;
            return Ok(true);
        }
        Ok(false)
    }

    fn input(&mut self) -> Result<TxInput, EncodingError> {
        Ok(TxInput {
            prev_txid: self.hash("outpoint txid")?,
            prev_vout: self.u32_le("outpoint index")?,
            script_sig: self.var_bytes("script_sig")?.to_vec(),
            sequence: self.u32_le("sequence")?,
        })
    }

    fn skip_input(&mut self) -> Result<(), EncodingError> {
        self.bytes(36, "outpoint")?;
        self.var_bytes("script_sig")?;
        self.bytes(4, "sequence")?;
        Ok(())
    }

    fn output(&mut self) -> Result<TxOutput, EncodingError> {
        Ok(TxOutput {
            value: self.u64_le("output value")?,
            script_pubkey: self.var_bytes("script_pubkey")?.to_vec(),
        })
    }

    fn skip_output(&mut self) -> Result<(), EncodingError> {
        self.bytes(8, "output value")?;
        self.var_bytes("script_pubkey")?;
        Ok(())
    }

    fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }
}

// =============================================================================
// Writing
// =============================================================================

fn put_compact_size(out: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => out.put_u8(n as u8),
        0xfd..=0xffff => {
            out.put_u8(0xfd);
            out.put_u16_le(n as u16);
        }
        0x1_0000..=0xffff_ffff => {
            out.put_u8(0xfe);
            out.put_u32_le(n as u32);
        }
        _ => {
            out.put_u8(0xff);
            out.put_u64_le(n);
        }
    }
}

fn put_var_bytes(out: &mut Vec<u8>, data: &[u8]) {
    put_compact_size(out, data.len() as u64);
    out.put_slice(data);
}

// =============================================================================
// Transaction
// =============================================================================

impl RawTransaction {
    /// Parse a complete serialized transaction (legacy or witness form)
    pub fn parse(bytes: &[u8]) -> Result<Self, EncodingError> {
        let mut reader = Reader::new(bytes);

        let version = reader.i32_le("version")?;
        let has_witness = reader.witness_flag()?;

        let input_count = reader.count("input")?;
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            inputs.push(reader.input()?);
        }

        let output_count = reader.count("output")?;
        let mut outputs = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            outputs.push(reader.output()?);
        }

        let mut witnesses = Vec::new();
        if has_witness {
            for _ in 0..input_count {
                let items = reader.count("witness item")?;
                let mut stack = Vec::with_capacity(items);
                for _ in 0..items {
                    stack.push(reader.var_bytes("witness item")?.to_vec());
                }
                witnesses.push(stack);
            }
        }

        let lock_time = reader.u32_le("lock_time")?;

        if !reader.is_empty() {
            return Err(EncodingError::MalformedTransaction(
                "trailing bytes after lock_time".to_string(),
            ));
        }

        Ok(Self {
            version,
            inputs,
            outputs,
            witnesses,
            lock_time,
        })
    }

    /// Parse from hex
    pub fn from_hex(s: &str) -> Result<Self, EncodingError> {
        Self::parse(&hex::decode(s.trim())?)
    }

    /// Whether any input carries witness data
    pub fn has_witness(&self) -> bool {
        self.witnesses.iter().any(|stack| !stack.is_empty())
    }

    fn write_body(&self, out: &mut Vec<u8>) {
        put_compact_size(out, self.inputs.len() as u64);
        for input in &self.inputs {
            out.put_slice(input.prev_txid.as_bytes());
            out.put_u32_le(input.prev_vout);
            put_var_bytes(out, &input.script_sig);
            out.put_u32_le(input.sequence);
        }

        put_compact_size(out, self.outputs.len() as u64);
        for output in &self.outputs {
            out.put_u64_le(output.value);
            put_var_bytes(out, &output.script_pubkey);
        }
    }

    /// Serialization without witness data; its hash is the txid
    pub fn to_legacy_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.put_i32_le(self.version);
        self.write_body(&mut out);
        out.put_u32_le(self.lock_time);
        out
    }

    /// Full serialization, including witness data when present
    pub fn to_bytes(&self) -> Vec<u8> {
        if !self.has_witness() {
            return self.to_legacy_bytes();
        }

        let mut out = Vec::new();
        out.put_i32_le(self.version);
        out.put_u8(WITNESS_MARKER);
        out.put_u8(WITNESS_FLAG);
        self.write_body(&mut out);
        for i in 0..self.inputs.len() {
            let stack = self.witnesses.get(i).map(Vec::as_slice).unwrap_or(&[]);
            put_compact_size(&mut out, stack.len() as u64);
            for item in stack {
                put_var_bytes(&mut out, item);
            }
        }
        out.put_u32_le(self.lock_time);
        out
    }

    /// Transaction id: double SHA-256 of the witness-stripped serialization
    pub fn txid(&self) -> Hash256 {
        Hash256(double_sha256(&self.to_legacy_bytes()))
    }

    /// Whether this is a coinbase (single input spending the null outpoint)
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1
            && self.inputs[0].prev_txid == Hash256::ZERO
            && self.inputs[0].prev_vout == u32::MAX
    }
}

/// Read a single output without materializing the rest of the transaction.
///
/// Walks version, inputs and preceding outputs of `raw`; trailing data
/// (remaining outputs, witnesses, lock time) is not inspected.
pub fn output_at(raw: &[u8], index: u64) -> Result<OutputLookup, EncodingError> {
    let mut reader = Reader::new(raw);

    reader.i32_le("version")?;
    reader.witness_flag()?;

    let input_count = reader.count("input")?;
    for _ in 0..input_count {
        reader.skip_input()?;
    }

    let output_count = reader.count("output")? as u64;
    if index >= output_count {
        return Ok(OutputLookup::OutOfRange {
            count: output_count,
        });
    }

    for _ in 0..index {
        reader.skip_output()?;
    }

    Ok(OutputLookup::Found(reader.output()?))
}
