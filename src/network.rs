//! Peer bookkeeping and chain retrieval.
//!
//! - [`NodeRegistry`] holds the addresses of known peers
//! - [`PeerChainFetcher`] is the capability consensus uses to read a peer's chain
//! - [`HttpPeerChainFetcher`] implements it over `GET {address}/chain`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

use crate::blockchain::Block;
use crate::error::ChainError;

/// A chain as served by `GET /chain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerChain {
    pub chain: Vec<Block>,
    pub length: usize,
}

impl PeerChain {
    pub fn new(chain: Vec<Block>) -> Self {
        let length = chain.len();
        Self { chain, length }
    }
}

/// Known peer addresses. Each address is stored once.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    nodes: HashSet<String>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer. Returns `false` if it was already known.
    ///
    /// A trailing `/` is dropped so `http://a` and `http://a/` are one peer.
    pub fn register(&mut self, address: &str) -> bool {
        self.nodes.insert(normalize(address).to_string())
    }

    /// Register every address and return the total number of known peers.
    ///
    /// Nothing is registered if `addresses` is empty or holds a blank entry.
    pub fn register_all<I, S>(&mut self, addresses: I) -> Result<usize, ChainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let addresses: Vec<S> = addresses.into_iter().collect();
        if addresses.is_empty() {
            return Err(ChainError::InvalidRequest(
                "Please supply a valid list of nodes".to_string(),
            ));
        }
        if addresses.iter().any(|a| normalize(a.as_ref()).is_empty()) {
            return Err(ChainError::InvalidRequest(
                "Node address cannot be empty".to_string(),
            ));
        }

        for address in &addresses {
            if self.register(address.as_ref()) {
                debug!("Registered peer {}", normalize(address.as_ref()));
            }
        }
        Ok(self.nodes.len())
    }

    /// All peers, sorted so iteration order is stable.
    pub fn all(&self) -> Vec<String> {
        let mut nodes: Vec<String> = self.nodes.iter().cloned().collect();
        nodes.sort();
        nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn normalize(address: &str) -> &str {
    address.trim().trim_end_matches('/')
}

/// Reads a peer's current chain.
///
/// Transport problems (refused connection, timeout, bad status, undecodable
/// body) come back as [`ChainError::PeerUnreachable`]. Whether the chain is any
/// good is for the caller to decide.
#[async_trait]
pub trait PeerChainFetcher: Send + Sync {
    async fn fetch_chain(&self, address: &str) -> Result<PeerChain, ChainError>;
}

/// [`PeerChainFetcher`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPeerChainFetcher {
    client: reqwest::Client,
}

impl HttpPeerChainFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PeerChainFetcher for HttpPeerChainFetcher {
    async fn fetch_chain(&self, address: &str) -> Result<PeerChain, ChainError> {
        let url = format!("{}/chain", normalize(address));
        let to_unreachable = |e: reqwest::Error| ChainError::PeerUnreachable {
            address: address.to_string(),
            reason: if e.is_timeout() {
                format!("timed out: {}", e)
            } else {
                e.to_string()
            },
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(to_unreachable)?;

        response.json::<PeerChain>().await.map_err(to_unreachable)
    }
}
