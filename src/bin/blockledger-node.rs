#![forbid(unsafe_code)]
//! Ledger node: HTTP API, mining and consensus in one process

use blockledger::config::{load_config, load_config_from};
use blockledger::node::{init_tracing, Node};
use clap::Parser;
use std::path::PathBuf;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "blockledger-node", version, about = "Proof-of-work ledger node")]
struct Cli {
    /// Path to the configuration file (defaults to ./config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for the HTTP API, overriding the configuration
    #[arg(short, long)]
    port: Option<u16>,

    /// Extra peer to register at startup; may be repeated
    #[arg(long = "peer")]
    peers: Vec<String>,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    };
    let mut config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(port) = cli.port {
        config.network.api_port = port;
    }
    config.network.bootstrap_peers.extend(cli.peers);

    let node = match Node::init(config) {
        Ok(node) => node,
        Err(e) => {
            error!("Failed to initialise node: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = node.start().await {
        error!("Node stopped: {}", e);
        std::process::exit(1);
    }
}
