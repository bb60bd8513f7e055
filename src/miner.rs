//! Proof-of-work search.
//!
//! A proof `p` is accepted after a previous proof `l` when the hex SHA-512 of
//! the decimal string `"{l}{p}"` starts with [`DIFFICULTY_PREFIX`]. The search
//! tries candidates from zero upward and has no upper bound.

use sha2::{Digest, Sha512};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::error::ChainError;

/// Hex digits an accepted proof hash starts with.
pub const DIFFICULTY_PREFIX: &str = "0000";

const PROGRESS_INTERVAL: u64 = 100_000;

pub fn is_valid_proof(last_proof: u64, proof: u64) -> bool {
    let guess = format!("{}{}", last_proof, proof);
    let digest = Sha512::digest(guess.as_bytes());
    // Only the leading bytes can decide the prefix.
    let leading = &digest[..DIFFICULTY_PREFIX.len().div_ceil(2)];
    hex::encode(leading).starts_with(DIFFICULTY_PREFIX)
}

/// Smallest proof accepted after `last_proof`.
pub fn proof_of_work(last_proof: u64) -> u64 {
    let start_time = Instant::now();
    let mut proof = 0u64;
    while !is_valid_proof(last_proof, proof) {
        proof += 1;
        log_progress(proof, start_time);
    }
    proof
}

/// [`proof_of_work`] that gives up once `cancel` is set.
///
/// Candidates are tried in the same order, so a search that runs to the end
/// returns the same proof.
pub fn proof_of_work_until(last_proof: u64, cancel: &AtomicBool) -> Option<u64> {
    let start_time = Instant::now();
    let mut proof = 0u64;
    loop {
        if cancel.load(Ordering::Relaxed) {
            debug!("Proof search after {} cancelled at {}", last_proof, proof);
            return None;
        }
        if is_valid_proof(last_proof, proof) {
            return Some(proof);
        }
        proof += 1;
        log_progress(proof, start_time);
    }
}

/// Cancel flag for one proof search. Dropping the handle cancels the search,
/// so a caller that goes away does not leave a worker thread spinning.
#[derive(Debug, Default)]
pub struct SearchHandle {
    cancel: Arc<AtomicBool>,
}

impl SearchHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

impl Drop for SearchHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Run [`proof_of_work_until`] on the blocking pool so request handlers keep
/// running. Returns `Ok(None)` if `cancel` was set before a proof was found.
pub async fn mine_proof(last_proof: u64, cancel: Arc<AtomicBool>) -> Result<Option<u64>, ChainError> {
    let start_time = Instant::now();
    let proof = tokio::task::spawn_blocking(move || proof_of_work_until(last_proof, &cancel))
        .await
        .map_err(|e| ChainError::Mining(format!("Proof worker failed: {}", e)))?;

    if let Some(proof) = proof {
        info!(
            last_proof,
            proof,
            duration_ms = %start_time.elapsed().as_millis(),
            "Found proof of work"
        );
    }
    Ok(proof)
}

fn log_progress(attempts: u64, start_time: Instant) {
    if attempts % PROGRESS_INTERVAL == 0 {
        let elapsed = start_time.elapsed();
        debug!(
            "Mining attempts: {} ({:.1} KH/s)",
            attempts,
            attempts as f64 / elapsed.as_secs_f64() / 1000.0
        );
    }
}
