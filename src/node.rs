use crate::api;
use crate::blockchain::Blockchain;
use crate::config::Config;
use crate::error::ChainError;
use crate::network::{HttpPeerChainFetcher, NodeRegistry};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber. `RUST_LOG` wins over the
/// `info` default. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Process-level wiring: configuration, ledger, peer registry and API server.
pub struct Node {
    pub config: Config,
    pub blockchain: Arc<RwLock<Blockchain>>,
    pub registry: Arc<parking_lot::RwLock<NodeRegistry>>,
    pub node_identifier: String,
}

impl Node {
    pub fn init(config: Config) -> Result<Self, ChainError> {
        let node_identifier = config.miner.resolve_node_identifier();
        info!(
            node_identifier = %node_identifier,
            "Starting ledger node"
        );

        let mut registry = NodeRegistry::new();
        if !config.network.bootstrap_peers.is_empty() {
            let total = registry.register_all(&config.network.bootstrap_peers)?;
            info!("Registered {} bootstrap peer(s)", total);
        }

        Ok(Self {
            config,
            blockchain: Arc::new(RwLock::new(Blockchain::new())),
            registry: Arc::new(parking_lot::RwLock::new(registry)),
            node_identifier,
        })
    }

    pub fn api_addr(&self) -> Result<SocketAddr, ChainError> {
        let ip: IpAddr = self.config.network.bind_address.parse().map_err(|e| {
            ChainError::Config(format!(
                "Invalid bind address {}: {}",
                self.config.network.bind_address, e
            ))
        })?;
        Ok(SocketAddr::new(ip, self.config.network.api_port))
    }

    /// API state sharing this node's ledger and registry.
    pub fn api_node(&self) -> Result<Arc<api::Node>, ChainError> {
        let fetcher = HttpPeerChainFetcher::new(self.config.network.peer_timeout())?;
        Ok(Arc::new(api::Node::new_shared(
            self.blockchain.clone(),
            self.registry.clone(),
            Arc::new(fetcher),
            self.node_identifier.clone(),
        )))
    }

    /// Serve the API. With bootstrap peers configured, one consensus round
    /// runs in the background first so the node starts from the network's
    /// chain instead of its own genesis.
    pub async fn start(self) -> Result<(), ChainError> {
        let addr = self.api_addr()?;
        let api_node = self.api_node()?;

        if !self.registry.read().is_empty() {
            let syncing = api_node.clone();
            tokio::spawn(async move {
                let (replaced, chain) = syncing.resolve_conflicts().await;
                if replaced {
                    info!("Initial sync adopted a chain of {} blocks", chain.len());
                } else {
                    warn!("Initial sync kept the local chain ({} blocks)", chain.len());
                }
            });
        }

        api::run_api_server(api_node, addr).await
    }
}
