use serde::{Deserialize, Serialize};

use crate::transactions::SignedTransaction;
use crate::utils::NodeId;

pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockStatus {
    /// Proposed by a leader, round in flight.
    Proposed,
    /// Reached quorum, irreversibly part of the confirmed chain.
    Finalized,
    /// Round abandoned before quorum.
    Rejected,
}

/// A block proposed by the round leader.
///
/// Invariant: `height == confirmed tip height + 1` and `previous_hash` links
/// to the confirmed tip's hash (genesis exempt).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub hash: String,
    pub previous_hash: String,
    pub timestamp: u64,
    pub proposer: NodeId,
    pub transactions: Vec<SignedTransaction>,
    pub status: BlockStatus,
}

/// Header view covered by the block hash.
#[derive(Serialize)]
struct BlockHashView<'a> {
    height: u64,
    previous_hash: &'a str,
    timestamp: u64,
    proposer: &'a NodeId,
    tx_hashes: Vec<String>,
}

pub fn compute_block_hash(
    height: u64,
    previous_hash: &str,
    timestamp: u64,
    proposer: &NodeId,
    transactions: &[SignedTransaction],
) -> String {
    use sha2::{Digest, Sha256};

    let view = BlockHashView {
        height,
        previous_hash,
        timestamp,
        proposer,
        tx_hashes: transactions.iter().map(|tx| tx.content_hash()).collect(),
    };
    let bytes = bincode::serialize(&view).expect("serialize block hash view");

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

impl Block {
    /// Builds a new `Proposed` block on top of the given tip.
    pub fn build(
        height: u64,
        previous_hash: String,
        timestamp: u64,
        proposer: NodeId,
        transactions: Vec<SignedTransaction>,
    ) -> Self {
        let hash = compute_block_hash(height, &previous_hash, timestamp, &proposer, &transactions);
        Block {
            height,
            hash,
            previous_hash,
            timestamp,
            proposer,
            transactions,
            status: BlockStatus::Proposed,
        }
    }

    pub fn genesis_parent_hash() -> String {
        GENESIS_HASH.to_string()
    }
}
