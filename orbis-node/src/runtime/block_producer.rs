use std::sync::Arc;

use tracing::{error, info, warn};

use orbis_common::block::Block;
use orbis_consensus::Role;

use crate::node::OrbisNode;

/// Leader-side production: drains the admission pipeline into a proposal.
pub struct BlockProducer {
    node: Arc<OrbisNode>,
}

impl BlockProducer {
    pub fn new(node: Arc<OrbisNode>) -> Self {
        Self { node }
    }

    /// Attempts to produce a block if this node currently leads and has no
    /// round in flight. Returns the proposed block so the caller can cast
    /// the leader's own vote.
    pub async fn try_produce(&self) -> Option<Block> {
        let mut engine = self.node.engine.lock().await;
        if engine.role() != Role::Leader || engine.current_round().is_some() {
            return None;
        }

        // Drain under the engine lock so leadership cannot change between
        // taking the batch and opening the round
        let batch = self.node.pipeline.drain_batch();
        if batch.is_empty() {
            return None;
        }

        info!("⛏️ Producing block with {} transactions", batch.len());
        let now = self.node.clock.now_ms();
        match engine.propose_block(batch, now) {
            Ok(block) => {
                let term = engine.term();
                drop(engine);
                if let Err(e) = self.node.broadcaster.broadcast_proposal(&block, term).await {
                    warn!("⚠️ Failed to broadcast proposal [{}]: {}", block.hash, e);
                }
                Some(block)
            }
            Err(e) => {
                error!("❌ Failed to produce block: {}", e);
                None
            }
        }
    }
}
