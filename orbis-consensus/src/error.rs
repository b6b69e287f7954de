use orbis_common::NodeId;
use thiserror::Error;

/// Consensus protocol errors, recoverable at round granularity.
///
/// None of these corrupt the node's term/height state; at worst the current
/// round is abandoned.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConsensusError {
    #[error("Not leader (current role: {0})")]
    NotLeader(String),

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    #[error("Unknown voter: {0}")]
    UnknownVoter(NodeId),

    #[error("Stale or unknown block: {0}")]
    StaleOrUnknownBlock(String),

    #[error("Round {0} timed out")]
    RoundTimedOut(u64),

    #[error("A round is already in progress")]
    RoundInProgress,

    #[error("Registry error: {0}")]
    Registry(String),
}
