use std::sync::Arc;

use tracing::{debug, error, info, warn};

use orbis_common::block::Block;
use orbis_common::utils::NodeId;
use orbis_common::vote::VoteData;
use orbis_consensus::engine::VoteOutcome;
use orbis_consensus::Role;

use crate::node::OrbisNode;

/// Inbound consensus path: peer proposals and votes, plus this node's own
/// voting. Finalized blocks are committed to the store and flushed from the
/// pipeline here.
pub struct ConsensusDriver {
    node: Arc<OrbisNode>,
}

impl ConsensusDriver {
    pub fn new(node: Arc<OrbisNode>) -> Self {
        Self { node }
    }

    /// A proposal arrived from a peer leader. Accepting it opens the local
    /// round and immediately answers with an approve vote.
    pub async fn on_proposal(&self, block: Block, proposer: NodeId, term: u64) {
        let now = self.node.clock.now_ms();
        let block_hash = block.hash.clone();
        let height = block.height;

        let accepted = {
            let mut engine = self.node.engine.lock().await;
            engine.handle_proposal(block, proposer.clone(), term, now)
        };

        match accepted {
            Ok(()) => {
                info!(
                    "📥 Proposal [{}] (height {}) accepted from [{}]",
                    block_hash, height, proposer
                );
                self.cast_vote(&block_hash, true).await;
            }
            Err(e) => {
                warn!("❌ Rejected proposal [{}] from [{}]: {}", block_hash, proposer, e);
            }
        }
    }

    /// Signs, broadcasts and locally records this node's vote.
    ///
    /// Observers track rounds but never vote.
    pub async fn cast_vote(&self, block_hash: &str, approve: bool) {
        let (role, term) = {
            let engine = self.node.engine.lock().await;
            (engine.role(), engine.term())
        };
        if role == Role::Observer {
            debug!("Observer tracks [{}] without voting", block_hash);
            return;
        }
        let vote = match self.node.sign_vote(block_hash, approve, term) {
            Ok(vote) => vote,
            Err(e) => {
                error!("Failed to sign vote on [{}]: {}", block_hash, e);
                return;
            }
        };
        if let Err(e) = self.node.broadcaster.broadcast_vote(&vote).await {
            warn!("⚠️ Failed to broadcast vote on [{}]: {}", block_hash, e);
        }
        self.on_vote(vote).await;
    }

    /// A vote arrived (from a peer, or looped back from `cast_vote`).
    pub async fn on_vote(&self, vote: VoteData) {
        if let Err(e) = self.node.verify_vote(&vote) {
            warn!("❌ Discarding vote from [{}]: {}", vote.voter, e);
            return;
        }

        let now = self.node.clock.now_ms();
        let outcome = {
            let mut engine = self.node.engine.lock().await;
            engine.record_vote(vote.voter.clone(), &vote.block_hash, vote.approve, now)
        };

        match outcome {
            Ok(VoteOutcome::Recorded { approvals, quorum }) => {
                debug!(
                    "🗳️ Vote from [{}] recorded on [{}] ({}/{})",
                    vote.voter, vote.block_hash, approvals, quorum
                );
            }
            Ok(VoteOutcome::Finalized(block)) => {
                self.commit_block(block).await;
            }
            Err(e) => {
                warn!("Vote from [{}] on [{}] not recorded: {}", vote.voter, vote.block_hash, e);
            }
        }
    }

    /// Quorum reached: persist the block and drop its transactions from the
    /// pipeline.
    async fn commit_block(&self, block: Block) {
        info!(
            "🎉 Block [{}] FINALIZED at height {} with {} transactions",
            block.hash,
            block.height,
            block.transactions.len()
        );

        if let Err(e) = self.node.block_store.store_confirmed_block(&block).await {
            error!("Failed to persist finalized block [{}]: {}", block.hash, e);
            self.node
                .engine
                .lock()
                .await
                .degrade("finalized block could not be persisted");
            return;
        }

        let tx_ids: Vec<String> = block
            .transactions
            .iter()
            .map(|tx| tx.transaction.id.clone())
            .collect();
        if !tx_ids.is_empty() {
            self.node.pipeline.remove_finalized(&tx_ids);
            info!("🧹 Removed {} finalized txs from the pipeline", tx_ids.len());
        }
    }
}
