//! BTC relay CLI application
//!
//! Keeps a relay mirror in step with the Bitcoin header chain and proves
//! transaction outputs against it.

use btc_relay::cli::{self, ConfigOverrides, FetchdOptions};
use btc_relay::core::Network;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "btcrelay")]
#[command(version)]
#[command(about = "Bitcoin header relay and payment verifier", long_about = None)]
struct Cli {
    /// Source chain
    #[arg(long, global = true, value_enum)]
    chain: Option<Network>,

    /// Bitcoin Core JSON-RPC URL
    #[arg(long, global = true, env = "BTCRELAY_BTCRPC")]
    btc_rpc_url: Option<String>,

    /// JSON-RPC user
    #[arg(long, global = true, env = "BTCRELAY_RPC_USER")]
    rpc_user: Option<String>,

    /// JSON-RPC password
    #[arg(long, global = true, env = "BTCRELAY_RPC_PASSWORD", hide_env_values = true)]
    rpc_password: Option<String>,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level: debug, info, warn or error (overrides RUST_LOG)
    #[arg(long, global = true, value_parser = cli::parse_log_level)]
    log_level: Option<LevelFilter>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow the source chain and submit headers to the mirror
    Fetchd {
        /// Maximum headers per submission
        #[arg(long)]
        batch_count: Option<u32>,

        /// Seconds to sleep when the mirror is caught up
        #[arg(long)]
        poll_interval: Option<u64>,

        /// Maximum blocks walked back looking for a common ancestor
        #[arg(long)]
        max_reorg_depth: Option<u32>,

        /// Height of the trusted header the mirror starts from (default: source tip)
        #[arg(long)]
        start_height: Option<u32>,

        /// Follow into an in-process mirror instead of a relay contract
        #[arg(long)]
        dry_run: bool,
    },

    /// Fetch a header, serialize it and check its hash
    Header {
        /// Block height
        height: u32,
    },

    /// Print the merkle inclusion proof of a transaction
    Prove {
        /// Transaction id (RPC hex)
        txid: String,
    },

    /// Prove a transaction and decode one of its outputs
    Verify {
        /// Transaction id (RPC hex)
        txid: String,

        /// Output index
        vout: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logger
    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = cli.log_level {
        logger.filter_level(level);
    }
    logger.init();

    let config = cli::load_config(
        cli.config.as_deref(),
        ConfigOverrides {
            chain: cli.chain,
            btc_rpc_url: cli.btc_rpc_url,
            rpc_user: cli.rpc_user,
            rpc_password: cli.rpc_password,
        },
    )?;

    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        match cli.command {
            Commands::Fetchd {
                batch_count,
                poll_interval,
                max_reorg_depth,
                start_height,
                dry_run,
            } => {
                let options = FetchdOptions {
                    batch_count,
                    poll_interval_secs: poll_interval,
                    max_reorg_depth,
                    start_height,
                    dry_run,
                };
                cli::cmd_fetchd(&config, options).await
            }

            Commands::Header { height } => {
                let client = cli::connect(&config)?;
                cli::cmd_header(&client, height).await
            }

            Commands::Prove { txid } => {
                let client = cli::connect(&config)?;
                cli::cmd_prove(&client, &txid).await
            }

            Commands::Verify { txid, vout } => {
                let client = cli::connect(&config)?;
                cli::cmd_verify(&client, config.chain, &txid, vout).await
            }
        }
    })
}
