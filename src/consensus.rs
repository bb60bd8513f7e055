//! Longest-valid-chain consensus.
//!
//! Every registered peer is asked for its chain. Requests go out together;
//! answers are then judged one at a time in peer order against the best chain
//! seen so far, so the longest valid chain on the network wins no matter which
//! peer reported it first.

use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::blockchain::{validate_chain, Block, Blockchain};
use crate::error::ChainError;
use crate::network::{PeerChain, PeerChainFetcher};

/// Outcome of one consensus round.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Whether a peer chain beat the local one.
    pub adopted: bool,
    /// The winning chain, when `adopted`.
    pub chain: Option<Vec<Block>>,
    /// One [`ChainError::PeerUnreachable`] per peer that could not be read.
    pub unreachable: Vec<ChainError>,
    /// Longer chains that failed validation.
    pub rejected: Vec<ChainError>,
}

pub struct ConsensusResolver {
    fetcher: Arc<dyn PeerChainFetcher>,
}

impl ConsensusResolver {
    pub fn new(fetcher: Arc<dyn PeerChainFetcher>) -> Self {
        Self { fetcher }
    }

    /// Pick the longest valid chain among `peers` that is longer than `local_chain`.
    ///
    /// Unreachable peers and invalid chains are recorded in the returned
    /// [`Resolution`] and never stop the round.
    pub async fn resolve(&self, local_chain: &[Block], peers: &[String]) -> Resolution {
        let responses = self.fetch_all(peers).await;

        let mut best_length = local_chain.len();
        let mut best_chain: Option<Vec<Block>> = None;
        let mut resolution = Resolution::default();

        for (address, response) in peers.iter().zip(responses) {
            let peer_chain = match response {
                Ok(peer_chain) => peer_chain,
                Err(e) => {
                    warn!("Error connecting to node {}: {}", address, e);
                    resolution.unreachable.push(e);
                    continue;
                }
            };

            if peer_chain.length != peer_chain.chain.len() {
                let err = ChainError::InvalidChain(format!(
                    "Peer {} reported length {} for {} blocks",
                    address,
                    peer_chain.length,
                    peer_chain.chain.len()
                ));
                info!("Skipping chain: {}", err);
                resolution.rejected.push(err);
                continue;
            }

            if peer_chain.length <= best_length {
                debug!(
                    "Chain from {} ({} blocks) is not longer than {}",
                    address, peer_chain.length, best_length
                );
                continue;
            }

            match validate_chain(&peer_chain.chain) {
                Ok(()) => {
                    debug!("New best chain from {} ({} blocks)", address, peer_chain.length);
                    best_length = peer_chain.length;
                    best_chain = Some(peer_chain.chain);
                }
                Err(e) => {
                    info!("Skipping chain from {}: {}", address, e);
                    resolution.rejected.push(e);
                }
            }
        }

        resolution.adopted = best_chain.is_some();
        resolution.chain = best_chain;
        resolution
    }

    /// Run a consensus round against the shared ledger.
    ///
    /// Peers are queried without holding the ledger lock. The winning chain is
    /// then offered to [`Blockchain::replace_chain`] under the write lock, which
    /// refuses it if the local chain has caught up in the meantime. Returns
    /// whether the chain was replaced and the chain as it stands afterwards.
    pub async fn resolve_conflicts(
        &self,
        blockchain: &RwLock<Blockchain>,
        peers: &[String],
    ) -> (bool, Vec<Block>) {
        let local_chain = blockchain.read().await.blocks().to_vec();
        let resolution = self.resolve(&local_chain, peers).await;

        let mut blockchain = blockchain.write().await;
        let replaced = match resolution.chain {
            Some(chain) => {
                let length = chain.len();
                let replaced = blockchain.replace_chain(chain);
                if replaced {
                    info!("Local chain replaced by peer chain of {} blocks", length);
                } else {
                    info!(
                        "Peer chain of {} blocks no longer beats local chain of {}",
                        length,
                        blockchain.len()
                    );
                }
                replaced
            }
            None => false,
        };

        (replaced, blockchain.blocks().to_vec())
    }

    /// Fetch every peer concurrently; results come back in `peers` order.
    async fn fetch_all(&self, peers: &[String]) -> Vec<Result<PeerChain, ChainError>> {
        let mut tasks = JoinSet::new();
        for (position, address) in peers.iter().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let address = address.clone();
            tasks.spawn(async move { (position, fetcher.fetch_chain(&address).await) });
        }

        let mut responses: Vec<Option<Result<PeerChain, ChainError>>> =
            peers.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, response)) => responses[position] = Some(response),
                Err(e) => warn!("Peer fetch task failed: {}", e),
            }
        }

        responses
            .into_iter()
            .zip(peers)
            .map(|(response, address)| {
                response.unwrap_or_else(|| {
                    Err(ChainError::PeerUnreachable {
                        address: address.clone(),
                        reason: "fetch task did not complete".to_string(),
                    })
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Serves canned answers, optionally after a delay so completion order
    /// differs from peer order.
    #[derive(Default)]
    struct MockFetcher {
        responses: HashMap<String, (Duration, Result<PeerChain, ChainError>)>,
    }

    impl MockFetcher {
        fn with_chain(mut self, address: &str, delay_ms: u64, chain: Vec<Block>) -> Self {
            self.responses.insert(
                address.to_string(),
                (Duration::from_millis(delay_ms), Ok(PeerChain::new(chain))),
            );
            self
        }

        fn with_response(mut self, address: &str, response: Result<PeerChain, ChainError>) -> Self {
            self.responses
                .insert(address.to_string(), (Duration::ZERO, response));
            self
        }

        fn unreachable(self, address: &str) -> Self {
            let err = ChainError::PeerUnreachable {
                address: address.to_string(),
                reason: "connection refused".to_string(),
            };
            self.with_response(address, Err(err))
        }
    }

    #[async_trait]
    impl PeerChainFetcher for MockFetcher {
        async fn fetch_chain(&self, address: &str) -> Result<PeerChain, ChainError> {
            let (delay, response) = self.responses.get(address).cloned().unwrap_or_else(|| {
                (
                    Duration::ZERO,
                    Err(ChainError::PeerUnreachable {
                        address: address.to_string(),
                        reason: "unknown peer".to_string(),
                    }),
                )
            });
            tokio::time::sleep(delay).await;
            response
        }
    }

    /// A valid chain of `length` blocks; shorter prefixes of it are valid too.
    fn mined_chain(length: usize) -> Vec<Block> {
        let mut blockchain = Blockchain::new();
        while blockchain.len() < length {
            blockchain.mine("peer").unwrap();
        }
        blockchain.blocks().to_vec()
    }

    fn peers(addresses: &[&str]) -> Vec<String> {
        addresses.iter().map(|a| a.to_string()).collect()
    }

    #[tokio::test]
    async fn test_adopts_longest_of_several_valid_chains() {
        let long = mined_chain(5);
        let short = long[..3].to_vec();
        let local = Blockchain::new();

        let fetcher = MockFetcher::default()
            .with_chain("http://a", 0, short)
            .with_chain("http://b", 0, long.clone());
        let resolver = ConsensusResolver::new(Arc::new(fetcher));

        let resolution = resolver
            .resolve(local.blocks(), &peers(&["http://a", "http://b"]))
            .await;
        assert!(resolution.adopted);
        assert_eq!(resolution.chain.unwrap(), long);
    }

    #[tokio::test]
    async fn test_later_shorter_chain_does_not_displace_best() {
        let long = mined_chain(5);
        let short = long[..3].to_vec();
        let local = Blockchain::new();

        // The first peer answers last; selection still follows peer order.
        let fetcher = MockFetcher::default()
            .with_chain("http://a", 50, long.clone())
            .with_chain("http://b", 0, short);
        let resolver = ConsensusResolver::new(Arc::new(fetcher));

        let resolution = resolver
            .resolve(local.blocks(), &peers(&["http://a", "http://b"]))
            .await;
        assert!(resolution.adopted);
        assert_eq!(resolution.chain.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_unreachable_peer_does_not_abort_round() {
        let long = mined_chain(3);
        let local = Blockchain::new();

        let fetcher = MockFetcher::default()
            .unreachable("http://x")
            .with_chain("http://y", 0, long.clone());
        let resolver = ConsensusResolver::new(Arc::new(fetcher));

        let resolution = resolver
            .resolve(local.blocks(), &peers(&["http://x", "http://y"]))
            .await;
        assert!(resolution.adopted);
        assert_eq!(resolution.chain.unwrap(), long);
        assert_eq!(resolution.unreachable.len(), 1);
        assert!(matches!(
            &resolution.unreachable[0],
            ChainError::PeerUnreachable { address, .. } if address == "http://x"
        ));
    }

    #[tokio::test]
    async fn test_invalid_longer_chain_is_skipped() {
        let mut tampered = mined_chain(3);
        tampered[2].previous_hash = "f".repeat(128);
        let local = Blockchain::new();

        let fetcher = MockFetcher::default().with_chain("http://a", 0, tampered);
        let resolver = ConsensusResolver::new(Arc::new(fetcher));

        let resolution = resolver.resolve(local.blocks(), &peers(&["http://a"])).await;
        assert!(!resolution.adopted);
        assert!(resolution.chain.is_none());
        assert_eq!(resolution.rejected.len(), 1);
        assert!(resolution.unreachable.is_empty());
    }

    #[tokio::test]
    async fn test_misreported_length_is_skipped() {
        let chain = mined_chain(2);
        let local = Blockchain::new();

        let fetcher = MockFetcher::default()
            .with_response("http://a", Ok(PeerChain { chain, length: 10 }));
        let resolver = ConsensusResolver::new(Arc::new(fetcher));

        let resolution = resolver.resolve(local.blocks(), &peers(&["http://a"])).await;
        assert!(!resolution.adopted);
        assert!(matches!(&resolution.rejected[0], ChainError::InvalidChain(_)));
    }

    #[tokio::test]
    async fn test_no_peers_keeps_local_chain() {
        let local = Blockchain::new();
        let resolver = ConsensusResolver::new(Arc::new(MockFetcher::default()));

        let resolution = resolver.resolve(local.blocks(), &[]).await;
        assert!(!resolution.adopted);
        assert!(resolution.chain.is_none());
    }

    #[tokio::test]
    async fn test_resolve_conflicts_never_shrinks_chain() {
        let shared = RwLock::new(Blockchain::new());
        for _ in 0..3 {
            shared.write().await.mine("local").unwrap();
        }
        let before = shared.read().await.blocks().to_vec();

        let fetcher = MockFetcher::default()
            .with_chain("http://a", 0, mined_chain(2))
            .with_chain("http://b", 0, mined_chain(3));
        let resolver = ConsensusResolver::new(Arc::new(fetcher));

        let (replaced, chain) = resolver
            .resolve_conflicts(&shared, &peers(&["http://a", "http://b"]))
            .await;
        assert!(!replaced);
        assert_eq!(chain, before);
        assert_eq!(shared.read().await.len(), 4);
    }

    #[tokio::test]
    async fn test_resolve_conflicts_replaces_shared_chain() {
        let shared = RwLock::new(Blockchain::new());
        let long = mined_chain(4);

        let fetcher = MockFetcher::default().with_chain("http://a", 0, long.clone());
        let resolver = ConsensusResolver::new(Arc::new(fetcher));

        let (replaced, chain) = resolver
            .resolve_conflicts(&shared, &peers(&["http://a"]))
            .await;
        assert!(replaced);
        assert_eq!(chain, long);
        assert_eq!(shared.read().await.blocks(), long.as_slice());
    }
}
