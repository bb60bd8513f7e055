//! Blockledger - a proof-of-work ledger node that settles with its peers by
//! the longest valid chain
//!
//! # Architecture
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, the ledger, hashing and chain validation
//! - [`transaction`] - Transaction types
//! - [`mempool`] - Transactions waiting for the next block
//!
//! ## Consensus & Mining
//! - [`miner`] - Proof-of-work search
//! - [`consensus`] - Longest-valid-chain resolution across peers
//!
//! ## Networking
//! - [`network`] - Peer registry and peer chain retrieval
//! - [`api`] - HTTP endpoints
//! - [`node`] - Process wiring and startup
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod mempool;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod consensus;
pub mod miner;

// ============================================================================
// Networking
// ============================================================================
pub mod network;

#[cfg(feature = "api")]
pub mod api;
#[cfg(feature = "api")]
pub mod node;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
