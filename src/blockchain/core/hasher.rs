//! Canonical block hashing.
//!
//! Peers compare hashes computed on different machines, so the byte layout is
//! fixed: integers little-endian, strings length-prefixed, transactions in
//! stored order.

use sha2::{Digest, Sha512};

use super::chain::Block;

/// SHA-512 of the block's canonical encoding, as lowercase hex.
pub fn hash_block(block: &Block) -> String {
    let mut hasher = Sha512::new();
    hasher.update(block.index.to_le_bytes());
    hasher.update(block.timestamp.to_le_bytes());
    hasher.update(block.proof.to_le_bytes());
    update_str(&mut hasher, &block.previous_hash);

    hasher.update((block.transactions.len() as u64).to_le_bytes());
    for tx in &block.transactions {
        update_str(&mut hasher, &tx.sender);
        update_str(&mut hasher, &tx.recipient);
        hasher.update(tx.amount.to_le_bytes());
        hasher.update(tx.timestamp.to_le_bytes());
    }

    hex::encode(hasher.finalize())
}

fn update_str(hasher: &mut Sha512, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}
