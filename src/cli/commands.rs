//! CLI commands for the relay
//!
//! Implements all command handlers for the CLI interface.

use crate::chain::{LocalMirror, MirrorReader, SourceChain};
use crate::core::{verify_output_inclusion, Network, RawTransaction};
use crate::crypto::{decode_from_wire_hash, Hash256};
use crate::rpc::{BitcoinRpcClient, RpcAuth};
use crate::sync::{ChainFollower, RelayConfig};
use std::path::Path;
use std::sync::Arc;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Satoshis per bitcoin
const SATS_PER_BTC: f64 = 100_000_000.0;

/// Settings given on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub chain: Option<Network>,
    pub btc_rpc_url: Option<String>,
    pub rpc_user: Option<String>,
    pub rpc_password: Option<String>,
}

/// Options of the `fetchd` command
#[derive(Debug, Clone, Default)]
pub struct FetchdOptions {
    pub batch_count: Option<u32>,
    pub poll_interval_secs: Option<u64>,
    pub max_reorg_depth: Option<u32>,
    pub start_height: Option<u32>,
    pub dry_run: bool,
}

/// Layer defaults, the optional config file and the overrides
pub fn load_config(path: Option<&Path>, overrides: ConfigOverrides) -> CliResult<RelayConfig> {
    let mut config = match path {
        Some(path) => {
            log::debug!("Loading configuration from {:?}", path);
            RelayConfig::load(path)?
        }
        None => RelayConfig::default(),
    };

    if let Some(chain) = overrides.chain {
        config.chain = chain;
    }
    if overrides.btc_rpc_url.is_some() {
        config.btc_rpc_url = overrides.btc_rpc_url;
    }
    if overrides.rpc_user.is_some() {
        config.rpc_user = overrides.rpc_user;
    }
    if overrides.rpc_password.is_some() {
        config.rpc_password = overrides.rpc_password;
    }

    Ok(config)
}

/// Create the node client described by `config`
pub fn connect(config: &RelayConfig) -> CliResult<BitcoinRpcClient> {
    let url = config.rpc_url()?;
    let auth = config
        .rpc_credentials()
        .map(|(user, password)| RpcAuth { user, password });

    log::debug!("Using {} node at {}", config.chain, url);
    Ok(BitcoinRpcClient::new(url, auth)?)
}

fn parse_txid(txid: &str) -> CliResult<Hash256> {
    Ok(decode_from_wire_hash(txid)?)
}

/// Follow the source chain into the relay mirror
pub async fn cmd_fetchd(config: &RelayConfig, options: FetchdOptions) -> CliResult<()> {
    if !options.dry_run {
        return Err("no relay contract writer is configured; run with --dry-run to follow \
                    into an in-process mirror"
            .into());
    }

    let mut settings = config.sync.clone();
    if let Some(batch_count) = options.batch_count {
        settings.batch_count = batch_count;
    }
    if let Some(poll) = options.poll_interval_secs {
        settings.poll_interval_secs = poll;
    }
    if let Some(depth) = options.max_reorg_depth {
        settings.max_reorg_depth = depth;
    }
    let sync_config = settings.to_config()?;

    let source = Arc::new(connect(config)?);
    let start_height = match options.start_height {
        Some(height) => height,
        None => source.current_height().await?,
    };
    let trusted_hash = source.hash_at_height(start_height).await?;
    let trusted = source.header_at_hash(&trusted_hash).await?;
    let mirror = Arc::new(LocalMirror::from_header(&trusted));

    println!("🔭 Following {} from block {}", config.chain, start_height);
    println!("   ├─ Trusted hash: {}", trusted.hash);
    println!("   ├─ Batch size: {}", sync_config.batch_count);
    println!("   ├─ Poll interval: {:?}", sync_config.poll_interval);
    println!("   └─ Mirror: in-process (dry run)");

    let follower = ChainFollower::new(mirror.clone(), source, sync_config)?;

    // Handle Ctrl+C
    let cancel = follower.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n📴 Stopping chain follower...");
            cancel.cancel();
        }
    });

    follower.run().await?;

    println!(
        "✅ Mirror at height {} after {} submissions",
        mirror.latest_height().await?,
        mirror.submissions().await
    );
    Ok(())
}

/// Fetch a header and check its identity hash and merkle root
pub async fn cmd_header<S: SourceChain>(source: &S, height: u32) -> CliResult<()> {
    let hash = source.hash_at_height(height).await?;
    let header = source.header_at_hash(&hash).await?;

    // Recompute every txid locally rather than trusting the node's list
    let txids = source
        .transactions_in_block(&hash)
        .await?
        .iter()
        .map(|raw| RawTransaction::parse(raw).map(|tx| tx.txid()))
        .collect::<Result<Vec<_>, _>>()?;
    header.verify_merkle_root(&txids)?;

    println!("🧱 Block {}", header.height);
    println!("   ├─ Hash: {}", header.hash);
    println!("   ├─ Previous: {}", header.prev_hash);
    println!("   ├─ Merkle root: {}", header.merkle_root);
    match header.timestamp() {
        Some(time) => println!("   ├─ Time: {} ({})", header.time, time.to_rfc3339()),
        None => println!("   ├─ Time: {}", header.time),
    }
    println!("   ├─ Bits: {:08x}", header.bits);
    println!("   ├─ Nonce: {}", header.nonce);
    println!("   ├─ Version: {:#010x}", header.version);
    println!("   ├─ Transactions: {}", txids.len());
    println!("   └─ Serialized: {}", header.to_hex());
    println!("✅ Identity hash and merkle root verified");

    Ok(())
}

/// Print the inclusion proof of a confirmed transaction
pub async fn cmd_prove<S: SourceChain>(source: &S, txid: &str) -> CliResult<()> {
    let txid = parse_txid(txid)?;
    let proof = source.merkle_proof_for_transaction(&txid).await?;

    if !proof.verify() {
        return Err(format!("proof for {} does not reconstruct its root", txid).into());
    }

    println!("{}", serde_json::to_string_pretty(&proof)?);
    Ok(())
}

/// Prove a transaction's inclusion and decode one of its outputs
pub async fn cmd_verify<S: SourceChain>(
    source: &S,
    network: Network,
    txid: &str,
    vout: u64,
) -> CliResult<()> {
    let txid = parse_txid(txid)?;

    let raw = source.raw_transaction(&txid).await?;
    let tx = RawTransaction::parse(&raw)?;
    if tx.txid() != txid {
        return Err(format!("node returned transaction {} for {}", tx.txid(), txid).into());
    }

    let proof = source.merkle_proof_for_transaction(&txid).await?;
    let block_hash = source.hash_at_height(proof.block_height).await?;
    let header = source.header_at_hash(&block_hash).await?;

    // The proof leaf is the txid, which commits to the stripped serialization
    let claim = verify_output_inclusion(&tx.to_legacy_bytes(), &proof, &header, vout)?;

    println!("✅ Output {}:{} included in block {}", txid, vout, header.height);
    println!("   ├─ Block hash: {}", header.hash);
    println!("   ├─ Script type: {}", claim.script_type);
    println!("   ├─ Hash160: {}", hex::encode(claim.decoded_hash));
    println!("   ├─ Address: {}", claim.address(network));
    println!(
        "   └─ Value: {} sats ({:.8} BTC)",
        claim.value,
        claim.value as f64 / SATS_PER_BTC
    );
    println!("{}", serde_json::to_string_pretty(&claim)?);

    Ok(())
}
