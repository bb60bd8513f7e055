//! Transaction types for the ledger
use serde::{Deserialize, Serialize};

/// Sender used for the reward a node pays itself for mining a block.
pub const MINING_REWARD_SENDER: &str = "0";

/// Amount credited by a mining reward.
pub const MINING_REWARD_AMOUNT: i64 = 1;

/// A value transfer waiting in the pool or recorded in a block.
///
/// The timestamp is taken once, when the transaction is created, and is part
/// of the block hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: i64,
    pub timestamp: u64,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: i64) -> Self {
        Self::with_timestamp(sender, recipient, amount, now_millis())
    }

    pub fn with_timestamp(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: i64,
        timestamp: u64,
    ) -> Self {
        Transaction {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
            timestamp,
        }
    }

    /// The reward transaction a node adds before forging a block.
    pub fn mining_reward(node_identifier: impl Into<String>) -> Self {
        Self::new(MINING_REWARD_SENDER, node_identifier, MINING_REWARD_AMOUNT)
    }

    pub fn is_mining_reward(&self) -> bool {
        self.sender == MINING_REWARD_SENDER
    }
}

/// Body of `POST /transactions/new`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub sender: String,
    pub recipient: String,
    pub amount: i64,
}

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}
