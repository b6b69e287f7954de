use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use orbis_consensus::Role;

use crate::events::NodeEvent;
use crate::node::OrbisNode;
use crate::runtime::block_producer::BlockProducer;
use crate::runtime::consensus_driver::ConsensusDriver;

/// The node's single event loop.
///
/// One `select!` multiplexes inbound events with the periodic work: role
/// ticks (election timeout, round timeout, leader heartbeat), pipeline
/// drains and health recomputation. Everything that touches the engine runs
/// here or in the drivers it owns, one step at a time.
pub struct Maestro {
    node: Arc<OrbisNode>,
    producer: BlockProducer,
    driver: ConsensusDriver,
}

impl Maestro {
    pub fn new(node: Arc<OrbisNode>) -> Self {
        Self {
            producer: BlockProducer::new(Arc::clone(&node)),
            driver: ConsensusDriver::new(Arc::clone(&node)),
            node,
        }
    }

    pub async fn run(self, mut events: mpsc::Receiver<NodeEvent>) {
        info!("🎼 Maestro loop started for [{}]", self.node.config.node_id);

        let config = &self.node.config;
        let mut role_timer = time::interval(Duration::from_millis(config.heartbeat_interval_ms));
        let mut drain_timer = time::interval(Duration::from_millis(config.drain_interval_ms));
        let mut health_timer = time::interval(Duration::from_millis(config.health_interval_ms));
        role_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        drain_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        health_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Seed health before the first role tick so a healthy node can stand
        // for election right away
        self.node.recompute_health();

        loop {
            tokio::select! {
                maybe_event = events.recv() => {
                    match maybe_event {
                        None => {
                            info!("Event channel closed, stopping maestro");
                            break;
                        }
                        Some(NodeEvent::Shutdown) => {
                            info!("🛑 Shutdown requested");
                            break;
                        }
                        Some(NodeEvent::Proposal { block, proposer, term }) => {
                            self.driver.on_proposal(block, proposer, term).await;
                        }
                        Some(NodeEvent::Vote(vote)) => {
                            self.driver.on_vote(vote).await;
                        }
                        Some(NodeEvent::Heartbeat { from, term }) => {
                            let now = self.node.clock.now_ms();
                            self.node.engine.lock().await.observe_heartbeat(&from, term, now);
                        }
                    }
                }

                _ = role_timer.tick() => {
                    self.role_tick().await;
                }

                _ = drain_timer.tick() => {
                    self.drain_tick().await;
                }

                _ = health_timer.tick() => {
                    let health = self.node.recompute_health();
                    debug!("🩺 Network health: {:.2}", health);

                    let avg_finality = self.node.engine.lock().await.status().avg_finality_ms;
                    if avg_finality > self.node.config.finality_target_ms as f64 {
                        warn!(
                            "⏰ Average finality {:.0}ms exceeds target {}ms",
                            avg_finality, self.node.config.finality_target_ms
                        );
                    }
                }
            }
        }

        info!("Maestro loop for [{}] stopped", self.node.config.node_id);
    }

    /// Drains the pending queue every tick, independent of role. A leader
    /// turns the batch into a proposal; followers and observers still drain
    /// and release the records so the queue stays bounded for the life of
    /// the process. Full batches are drained back-to-back in one tick.
    async fn drain_tick(&self) {
        let role = self.node.engine.lock().await.role();
        if role == Role::Leader {
            if let Some(block) = self.producer.try_produce().await {
                // Leader votes on its own proposal
                self.driver.cast_vote(&block.hash, true).await;
            }
            return;
        }

        loop {
            let drained = self.node.pipeline.drain_batch();
            if drained.is_empty() {
                break;
            }
            // Persisted at admission; only the in-memory records are released
            let ids: Vec<String> = drained
                .iter()
                .map(|tx| tx.transaction.id.clone())
                .collect();
            self.node.pipeline.remove_finalized(&ids);
            debug!("🚚 Released {} drained txs outside leadership", ids.len());
            if drained.len() < self.node.config.batch_size {
                break;
            }
        }
    }

    /// Expires timed-out rounds, drives role transitions and emits the
    /// leader heartbeat.
    async fn role_tick(&self) {
        let health = self.node.network_health();
        let now = self.node.clock.now_ms();

        let leader_term = {
            let mut engine = self.node.engine.lock().await;
            // The engine logs the abandoned round; the discarded block needs
            // no further handling here
            engine.check_round_timeout(now);
            engine.tick_role(now, health);
            (engine.role() == Role::Leader).then(|| engine.term())
        };

        if let Some(term) = leader_term {
            if let Err(e) = self.node.broadcaster.broadcast_heartbeat(term).await {
                warn!("⚠️ Failed to broadcast heartbeat: {}", e);
            }
        }
    }
}
