use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::miner;
use crate::transaction::types::now_millis;
use crate::transaction::Transaction;

use super::hasher::hash_block;
use super::validation::valid_chain;

/// Proof recorded in the genesis block.
pub const GENESIS_PROOF: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub proof: u64,
    #[serde(rename = "previousHash")]
    pub previous_hash: String,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(
        index: u64,
        previous_hash: impl Into<String>,
        proof: u64,
        transactions: Vec<Transaction>,
    ) -> Self {
        Block {
            index,
            timestamp: now_millis(),
            proof,
            previous_hash: previous_hash.into(),
            transactions,
        }
    }

    pub fn hash(&self) -> String {
        hash_block(self)
    }
}

/// The local ledger: the chain plus the transactions waiting for the next block.
///
/// Only three things ever change the chain: the genesis block appended by
/// [`Blockchain::new`], [`Blockchain::new_block`], and
/// [`Blockchain::replace_chain`].
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    mempool: Mempool,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Create a ledger holding only the genesis block.
    pub fn new() -> Self {
        let mut blockchain = Blockchain {
            blocks: Vec::new(),
            mempool: Mempool::new(),
        };
        blockchain.new_block("", GENESIS_PROOF);
        blockchain
    }

    /// Forge a block from the pending transactions and append it.
    ///
    /// `previous_hash` is trusted; callers pass `hash(last_block)`.
    pub fn new_block(&mut self, previous_hash: impl Into<String>, proof: u64) -> Block {
        let block = Block::new(
            self.blocks.len() as u64 + 1,
            previous_hash,
            proof,
            self.mempool.take_all(),
        );
        self.blocks.push(block.clone());
        block
    }

    /// Queue a transaction for the next block.
    ///
    /// Returns the index of the block it should land in. Another mined block
    /// or a chain replacement can change that, so the value is a hint only.
    pub fn new_transaction(
        &mut self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: i64,
    ) -> Result<u64, ChainError> {
        self.mempool
            .add_transaction(Transaction::new(sender, recipient, amount));
        Ok(self.last_block()?.index + 1)
    }

    pub fn last_block(&self) -> Result<&Block, ChainError> {
        self.blocks.last().ok_or(ChainError::EmptyChain)
    }

    pub fn hash(&self, block: &Block) -> String {
        hash_block(block)
    }

    pub fn proof_of_work(&self, last_proof: u64) -> u64 {
        miner::proof_of_work(last_proof)
    }

    pub fn valid_chain(&self, chain: &[Block]) -> bool {
        valid_chain(chain)
    }

    /// Mine the next block on the calling thread, rewarding `reward_recipient`.
    ///
    /// Same steps as the `/mine` endpoint: find the proof, queue the reward,
    /// then forge the block on top of the current last block.
    pub fn mine(&mut self, reward_recipient: &str) -> Result<Block, ChainError> {
        let last_block = self.last_block()?;
        let last_proof = last_block.proof;
        let previous_hash = last_block.hash();

        let proof = self.proof_of_work(last_proof);
        self.mempool
            .add_transaction(Transaction::mining_reward(reward_recipient));
        Ok(self.new_block(previous_hash, proof))
    }

    /// Adopt `candidate` if it is valid and strictly longer than the local chain.
    ///
    /// Returns whether the chain was replaced. Pending transactions are kept.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> bool {
        if candidate.len() <= self.blocks.len() || !valid_chain(&candidate) {
            return false;
        }
        self.blocks = candidate;
        true
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }
}
