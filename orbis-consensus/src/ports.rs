//! Boundary contracts consumed by the consensus core.
//!
//! Transport and persistence live behind these traits; the core never sees a
//! wire format or a storage engine.

use async_trait::async_trait;

use orbis_common::block::Block;
use orbis_common::error::Result;
use orbis_common::validator::Validator;
use orbis_common::vote::VoteData;

/// Outbound proposal/vote dissemination (gossip, in production).
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast_proposal(&self, block: &Block, term: u64) -> Result<()>;

    async fn broadcast_vote(&self, vote: &VoteData) -> Result<()>;

    /// Leader liveness signal carrying the current term.
    async fn broadcast_heartbeat(&self, term: u64) -> Result<()>;
}

/// Confirmed-chain persistence.
#[async_trait]
pub trait BlockStore: Send + Sync {
    async fn store_confirmed_block(&self, block: &Block) -> Result<()>;

    async fn get_block(&self, height: u64) -> Result<Option<Block>>;
}

/// External membership/stake feed for the validator registry.
#[async_trait]
pub trait ValidatorSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Validator>>;
}
