use crate::error::ChainError;
use crate::miner::is_valid_proof;

use super::chain::Block;

/// Walk `chain` pairwise and report the first broken link.
///
/// Each block must point at the hash of its predecessor, and its proof must
/// satisfy the proof-of-work predicate against the predecessor's proof.
/// Empty and single-block chains pass.
pub fn validate_chain(chain: &[Block]) -> Result<(), ChainError> {
    for pair in chain.windows(2) {
        let (prev, block) = (&pair[0], &pair[1]);

        let expected_hash = prev.hash();
        if block.previous_hash != expected_hash {
            return Err(ChainError::InvalidChain(format!(
                "Block {} links to {}, expected {}",
                block.index, block.previous_hash, expected_hash
            )));
        }

        if !is_valid_proof(prev.proof, block.proof) {
            return Err(ChainError::InvalidChain(format!(
                "Block {} has proof {} which does not solve proof {}",
                block.index, block.proof, prev.proof
            )));
        }
    }
    Ok(())
}

pub fn valid_chain(chain: &[Block]) -> bool {
    validate_chain(chain).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Blockchain;
    use crate::miner::proof_of_work;

    fn mined_chain(extra_blocks: usize) -> Vec<Block> {
        let mut blockchain = Blockchain::new();
        for _ in 0..extra_blocks {
            blockchain.mine("validator").unwrap();
        }
        blockchain.blocks().to_vec()
    }

    #[test]
    fn test_empty_and_single_block_chains_are_valid() {
        assert!(valid_chain(&[]));
        assert!(valid_chain(&mined_chain(0)));
    }

    #[test]
    fn test_mined_chain_is_valid() {
        assert!(valid_chain(&mined_chain(2)));
    }

    #[test]
    fn test_broken_previous_hash_is_invalid() {
        let mut chain = mined_chain(1);
        chain[1].previous_hash = "0".repeat(128);

        assert!(!valid_chain(&chain));
        assert!(matches!(
            validate_chain(&chain),
            Err(ChainError::InvalidChain(msg)) if msg.starts_with("Block 2 links to")
        ));
    }

    #[test]
    fn test_tampered_predecessor_is_invalid() {
        let mut chain = mined_chain(2);
        chain[1].transactions[0].amount = 1_000_000;
        assert!(!valid_chain(&chain));
    }

    #[test]
    fn test_bad_proof_is_invalid() {
        let genesis = mined_chain(0).remove(0);
        let good = proof_of_work(genesis.proof);
        let bad = (good + 1..)
            .find(|p| !is_valid_proof(genesis.proof, *p))
            .unwrap();

        let linked = |proof| Block::new(2, genesis.hash(), proof, Vec::new());

        assert!(valid_chain(&[genesis.clone(), linked(good)]));
        let invalid = [genesis.clone(), linked(bad)];
        assert!(!valid_chain(&invalid));
        assert!(matches!(
            validate_chain(&invalid),
            Err(ChainError::InvalidChain(msg)) if msg.contains("does not solve")
        ));
    }
}
