//! REST API for the ledger node
//!
//! Exposes transaction submission, mining, chain retrieval, peer registration
//! and consensus over JSON. Handlers share one [`Node`]; the ledger sits behind
//! a single `RwLock`, so reads see a consistent chain and writes are serialized.

use axum::{
    extract::{Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

use crate::blockchain::{Block, Blockchain};
use crate::consensus::ConsensusResolver;
use crate::error::ChainError;
use crate::miner;
use crate::network::{NodeRegistry, PeerChain, PeerChainFetcher};
use crate::transaction::{
    Transaction, TransactionRequest, MINING_REWARD_AMOUNT, MINING_REWARD_SENDER,
};

/// Shared node state handed to every handler
#[derive(Clone)]
pub struct Node {
    pub blockchain: Arc<RwLock<Blockchain>>,
    pub registry: Arc<parking_lot::RwLock<NodeRegistry>>,
    resolver: Arc<ConsensusResolver>,
    node_identifier: String,
    // One mining job at a time; the ledger lock is not held during the search.
    mining_lock: Arc<Mutex<()>>,
    // Cancel flag of the running proof search, if any.
    current_search: Arc<parking_lot::Mutex<Option<Arc<AtomicBool>>>>,
    blocks_mined: Arc<AtomicU64>,
}

impl Node {
    /// Create a node with a fresh ledger and no peers
    pub fn new(node_identifier: impl Into<String>, fetcher: Arc<dyn PeerChainFetcher>) -> Self {
        Self::new_shared(
            Arc::new(RwLock::new(Blockchain::new())),
            Arc::new(parking_lot::RwLock::new(NodeRegistry::new())),
            fetcher,
            node_identifier,
        )
    }

    /// Create a node over an existing ledger and registry, so the API and the
    /// bootstrap code observe the same chain and peer list.
    pub fn new_shared(
        blockchain: Arc<RwLock<Blockchain>>,
        registry: Arc<parking_lot::RwLock<NodeRegistry>>,
        fetcher: Arc<dyn PeerChainFetcher>,
        node_identifier: impl Into<String>,
    ) -> Self {
        Self {
            blockchain,
            registry,
            resolver: Arc::new(ConsensusResolver::new(fetcher)),
            node_identifier: node_identifier.into(),
            mining_lock: Arc::new(Mutex::new(())),
            current_search: Arc::new(parking_lot::Mutex::new(None)),
            blocks_mined: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn node_identifier(&self) -> &str {
        &self.node_identifier
    }

    /// Blocks forged by this node since startup
    pub fn blocks_mined(&self) -> u64 {
        self.blocks_mined.load(Ordering::Relaxed)
    }

    pub async fn submit_transaction(&self, request: TransactionRequest) -> Result<u64, ApiError> {
        let mut blockchain = self.blockchain.write().await;
        let index = blockchain.new_transaction(request.sender, request.recipient, request.amount)?;
        Ok(index)
    }

    /// Find the next proof, pay ourselves the reward and forge the block.
    ///
    /// If the chain is swapped while the proof is being searched, the proof
    /// belongs to a block that is gone and the search starts over on the new
    /// last block. A swap made by [`Node::resolve_conflicts`] cancels the
    /// running search; one made directly on the ledger is noticed once the
    /// search ends. Dropping the returned future cancels the search too.
    pub async fn mine_block(&self) -> Result<Block, ApiError> {
        let _mining = self.mining_lock.lock().await;

        loop {
            let (last_proof, last_hash) = {
                let blockchain = self.blockchain.read().await;
                let last_block = blockchain.last_block()?;
                (last_block.proof, last_block.hash())
            };

            let search = miner::SearchHandle::new();
            *self.current_search.lock() = Some(search.flag());
            let Some(proof) = miner::mine_proof(last_proof, search.flag()).await? else {
                info!("Proof search cancelled, restarting on the new chain");
                continue;
            };

            let mut blockchain = self.blockchain.write().await;
            if blockchain.last_block()?.hash() != last_hash {
                info!("Chain changed while mining, restarting proof search");
                continue;
            }

            blockchain.new_transaction(
                MINING_REWARD_SENDER,
                self.node_identifier.as_str(),
                MINING_REWARD_AMOUNT,
            )?;
            let block = blockchain.new_block(last_hash, proof);
            self.current_search.lock().take();
            self.blocks_mined.fetch_add(1, Ordering::Relaxed);

            info!(
                index = block.index,
                proof = block.proof,
                transactions = block.transactions.len(),
                "New block forged"
            );
            return Ok(block);
        }
    }

    pub async fn chain(&self) -> PeerChain {
        PeerChain::new(self.blockchain.read().await.blocks().to_vec())
    }

    /// Register peers; returns the total number of known peers.
    pub fn register_nodes(&self, nodes: &[String]) -> Result<usize, ApiError> {
        let total = self.registry.write().register_all(nodes)?;
        info!("Registered {} node(s), {} known", nodes.len(), total);
        Ok(total)
    }

    pub fn peers(&self) -> Vec<String> {
        self.registry.read().all()
    }

    /// Run one consensus round. Returns whether the chain was replaced and
    /// the chain afterwards.
    pub async fn resolve_conflicts(&self) -> (bool, Vec<Block>) {
        let peers = self.peers();
        let (replaced, chain) = self
            .resolver
            .resolve_conflicts(&self.blockchain, &peers)
            .await;

        if replaced {
            if let Some(search) = self.current_search.lock().as_ref() {
                search.store(true, Ordering::Relaxed);
            }
        }
        (replaced, chain)
    }

    /// Transactions waiting for the next block.
    pub async fn pending_transactions(&self) -> Vec<Transaction> {
        self.blockchain.read().await.mempool().get_all_transactions()
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BlockchainError(ChainError),
    InvalidInput(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BlockchainError(ChainError::InvalidRequest(msg)) => {
                (StatusCode::BAD_REQUEST, format!("Error: {}", msg))
            }
            ApiError::BlockchainError(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::BlockchainError(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterNodesRequest {
    pub nodes: Vec<String>,
}

#[derive(Serialize)]
pub struct TransactionResponse {
    pub message: String,
    pub index: u64,
}

#[derive(Serialize)]
pub struct MineResponse {
    pub message: String,
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    #[serde(rename = "previousHash")]
    pub previous_hash: String,
}

#[derive(Serialize)]
pub struct RegisterNodesResponse {
    pub message: String,
    pub total_nodes: usize,
    pub nodes: Vec<String>,
}

#[derive(Serialize)]
pub struct ResolveResponse {
    pub message: String,
    pub replaced: bool,
    pub chain: Vec<Block>,
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware: method, path, status and duration per request.
async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints
pub fn build_api_router(node: Arc<Node>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    Router::new()
        // Ledger endpoints
        .route("/transactions/new", post(new_transaction))
        .route("/mine", get(mine))
        .route("/chain", get(full_chain))
        .route("/mempool", get(get_mempool))
        // Peer endpoints
        .route("/nodes", get(list_nodes))
        .route("/nodes/register", post(register_nodes))
        .route("/nodes/resolve", get(consensus))
        // System endpoints
        .route("/health", get(health_check))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(node)
        .layer(cors)
}

/// Serve the API on `addr` until the listener fails
pub async fn run_api_server(node: Arc<Node>, addr: SocketAddr) -> Result<(), ChainError> {
    let app = build_api_router(node.clone());
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        node_identifier = %node.node_identifier(),
        "API server listening on http://{}",
        listener.local_addr()?
    );

    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn health_check(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let length = node.blockchain.read().await.len();
    Json(serde_json::json!({
        "status": "healthy",
        "length": length,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn new_transaction(
    State(node): State<Arc<Node>>,
    Json(request): Json<TransactionRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), ApiError> {
    if request.sender.trim().is_empty() || request.recipient.trim().is_empty() {
        return Err(ApiError::InvalidInput(
            "Sender and recipient are required".to_string(),
        ));
    }

    let index = node.submit_transaction(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(TransactionResponse {
            message: format!("Transaction will be added to block {}", index),
            index,
        }),
    ))
}

async fn mine(State(node): State<Arc<Node>>) -> Result<Json<MineResponse>, ApiError> {
    let block = node.mine_block().await?;

    Ok(Json(MineResponse {
        message: "New Block Forged".to_string(),
        index: block.index,
        transactions: block.transactions,
        proof: block.proof,
        previous_hash: block.previous_hash,
    }))
}

async fn full_chain(State(node): State<Arc<Node>>) -> Json<PeerChain> {
    Json(node.chain().await)
}

async fn get_mempool(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let transactions = node.pending_transactions().await;
    Json(serde_json::json!({
        "count": transactions.len(),
        "transactions": transactions
    }))
}

async fn list_nodes(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let nodes = node.peers();
    Json(serde_json::json!({
        "count": nodes.len(),
        "nodes": nodes
    }))
}

async fn register_nodes(
    State(node): State<Arc<Node>>,
    Json(request): Json<RegisterNodesRequest>,
) -> Result<Json<RegisterNodesResponse>, ApiError> {
    let total_nodes = node.register_nodes(&request.nodes)?;

    Ok(Json(RegisterNodesResponse {
        message: "New nodes added".to_string(),
        total_nodes,
        nodes: node.peers(),
    }))
}

async fn consensus(State(node): State<Arc<Node>>) -> Json<ResolveResponse> {
    let (replaced, chain) = node.resolve_conflicts().await;

    let message = if replaced {
        "Our chain was replaced"
    } else {
        "Our chain is authoritative"
    };

    Json(ResolveResponse {
        message: message.to_string(),
        replaced,
        chain,
    })
}
