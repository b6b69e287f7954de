use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use orbis_common::block::{Block, BlockStatus};
use orbis_common::transactions::SignedTransaction;
use orbis_common::NodeId;

use crate::error::ConsensusError;
use crate::registry::ValidatorRegistry;
use crate::round::ConsensusRound;

/// Per-node consensus role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
    /// Non-voting node; never transitions except via reconfiguration.
    Observer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Follower => "Follower",
            Role::Candidate => "Candidate",
            Role::Leader => "Leader",
            Role::Observer => "Observer",
        };
        write!(f, "{}", s)
    }
}

/// Process-wide consensus state of the local node. `term` never decreases.
#[derive(Debug, Clone)]
pub struct NodeState {
    pub role: Role,
    pub term: u64,
    pub voted_for: Option<NodeId>,
    pub leader: Option<NodeId>,
    pub last_heartbeat_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub election_timeout_ms: u64,
    /// Minimum health score for a node to stand as Candidate.
    pub min_election_health: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            election_timeout_ms: 1_000,
            min_election_health: 0.5,
        }
    }
}

/// Result of an accepted vote.
#[derive(Debug, Clone)]
pub enum VoteOutcome {
    /// Vote recorded, quorum not yet reached.
    Recorded { approvals: usize, quorum: usize },
    /// The vote closed the round; the block is final.
    Finalized(Block),
}

/// Read-only snapshot of the engine for the status surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusStatus {
    pub role: Role,
    pub term: u64,
    pub leader: Option<NodeId>,
    pub round_number: Option<u64>,
    pub last_confirmed_height: u64,
    pub blocks_processed: u64,
    pub avg_finality_ms: f64,
}

/// The node-local consensus state machine.
///
/// Owns role/term transitions, the single active round, and the finality
/// decision. All mutation goes through one owner (the node wraps it in a
/// mutex), so proposal, vote recording and timeout checks are serialized.
#[derive(Debug)]
pub struct ConsensusEngine {
    local_id: NodeId,
    registry: Arc<ValidatorRegistry>,
    config: EngineConfig,
    state: NodeState,
    current_round: Option<ConsensusRound>,
    round_counter: u64,
    confirmed_height: u64,
    confirmed_hash: String,
    blocks_processed: u64,
    avg_finality_ms: f64,
}

impl ConsensusEngine {
    pub fn new(
        local_id: NodeId,
        registry: Arc<ValidatorRegistry>,
        config: EngineConfig,
        observer: bool,
        now_ms: u64,
    ) -> Self {
        let role = if observer { Role::Observer } else { Role::Follower };
        Self {
            local_id,
            registry,
            config,
            state: NodeState {
                role,
                term: 0,
                voted_for: None,
                leader: None,
                last_heartbeat_ms: now_ms,
            },
            current_round: None,
            round_counter: 0,
            confirmed_height: 0,
            confirmed_hash: Block::genesis_parent_hash(),
            blocks_processed: 0,
            avg_finality_ms: 0.0,
        }
    }

    pub fn local_id(&self) -> &NodeId {
        &self.local_id
    }

    pub fn role(&self) -> Role {
        self.state.role
    }

    pub fn term(&self) -> u64 {
        self.state.term
    }

    pub fn leader(&self) -> Option<&NodeId> {
        self.state.leader.as_ref()
    }

    pub fn confirmed_height(&self) -> u64 {
        self.confirmed_height
    }

    pub fn confirmed_hash(&self) -> &str {
        &self.confirmed_hash
    }

    pub fn current_round(&self) -> Option<&ConsensusRound> {
        self.current_round.as_ref()
    }

    pub fn status(&self) -> ConsensusStatus {
        ConsensusStatus {
            role: self.state.role,
            term: self.state.term,
            leader: self.state.leader.clone(),
            round_number: self.current_round.as_ref().map(|r| r.round_number),
            last_confirmed_height: self.confirmed_height,
            blocks_processed: self.blocks_processed,
            avg_finality_ms: self.avg_finality_ms,
        }
    }

    /// Per-tick role driver. Re-reads `now_ms` on every call; a delayed tick
    /// only delays re-election, never breaks safety.
    pub fn tick_role(&mut self, now_ms: u64, health: f64) {
        match self.state.role {
            Role::Observer => {}
            Role::Follower => {
                let elapsed = now_ms.saturating_sub(self.state.last_heartbeat_ms);
                if elapsed > self.config.election_timeout_ms {
                    if health < self.config.min_election_health {
                        // Unhealthy nodes stay Follower rather than contend
                        debug!(
                            "🩺 Leader timeout but local health {:.2} below {:.2}, staying Follower",
                            health, self.config.min_election_health
                        );
                        self.state.last_heartbeat_ms = now_ms;
                    } else {
                        info!(
                            "⏰ Leader heartbeat timeout after {}ms, becoming Candidate (term {})",
                            elapsed, self.state.term
                        );
                        self.state.role = Role::Candidate;
                        self.state.leader = None;
                        self.state.voted_for = None;
                    }
                }
            }
            Role::Candidate => {
                // Simplified election: the highest-stake active validator wins;
                // every node computes the same winner from its snapshot.
                let snapshot = self.registry.snapshot();
                match snapshot.select_leader() {
                    Some(winner) if winner == self.local_id => {
                        self.state.term += 1;
                        self.state.role = Role::Leader;
                        self.state.leader = Some(self.local_id.clone());
                        self.state.last_heartbeat_ms = now_ms;
                        info!(
                            "👑 Node [{}] elected Leader (term {})",
                            self.local_id, self.state.term
                        );
                        tracing::info!(
                            target: "consensus",
                            "EVENT:ELECTED leader={} term={}",
                            self.local_id,
                            self.state.term
                        );
                    }
                    Some(winner) => {
                        debug!("Election lost to [{}], back to Follower", winner);
                        self.state.role = Role::Follower;
                        self.state.leader = Some(winner);
                        self.state.last_heartbeat_ms = now_ms;
                    }
                    None => {
                        warn!("⚠️ No eligible validators, abdicating candidacy");
                        self.state.role = Role::Follower;
                        self.state.last_heartbeat_ms = now_ms;
                    }
                }
            }
            Role::Leader => {
                // Our own proposals/heartbeats keep the timer fresh
                self.state.last_heartbeat_ms = now_ms;
            }
        }
    }

    /// Opens a round for a new block built on the confirmed tip.
    ///
    /// Only valid for the Leader, with no round in flight. The caller
    /// broadcasts the returned block and records the leader's own vote.
    pub fn propose_block(
        &mut self,
        transactions: Vec<SignedTransaction>,
        now_ms: u64,
    ) -> Result<Block, ConsensusError> {
        if self.state.role != Role::Leader {
            return Err(ConsensusError::NotLeader(self.state.role.to_string()));
        }
        if self.current_round.is_some() {
            return Err(ConsensusError::RoundInProgress);
        }

        let block = Block::build(
            self.confirmed_height + 1,
            self.confirmed_hash.clone(),
            now_ms,
            self.local_id.clone(),
            transactions,
        );
        self.open_round(block.clone(), self.local_id.clone(), now_ms)?;

        tracing::info!(
            target: "consensus",
            "EVENT:PROPOSE height={} hash={} txs={} term={}",
            block.height,
            block.hash,
            block.transactions.len(),
            self.state.term
        );

        Ok(block)
    }

    /// Follower path: a proposal arrived from a peer leader.
    ///
    /// An equal-or-higher term from another node forces step-down before the
    /// block is considered (classic Raft convergence).
    pub fn handle_proposal(
        &mut self,
        block: Block,
        proposer: NodeId,
        term: u64,
        now_ms: u64,
    ) -> Result<(), ConsensusError> {
        if proposer != self.local_id && term >= self.state.term {
            self.step_down(&proposer, term, now_ms);
        }

        if let Some(round) = &self.current_round {
            if round.block.hash == block.hash {
                return Ok(()); // already tracking this round
            }
        }

        self.open_round(block, proposer, now_ms)
    }

    fn open_round(
        &mut self,
        block: Block,
        leader: NodeId,
        now_ms: u64,
    ) -> Result<(), ConsensusError> {
        self.validate_linkage(&block)?;

        let voting_set = self.registry.snapshot();
        if voting_set.active_count() == 0 {
            return Err(ConsensusError::Registry(
                "no active validators for round".to_string(),
            ));
        }

        self.round_counter += 1;
        info!(
            "📦 Round {} opened for block [{}] at height {} (leader: {}, quorum: {}/{})",
            self.round_counter,
            block.hash,
            block.height,
            leader,
            crate::round::quorum_threshold(voting_set.active_count()),
            voting_set.active_count()
        );

        self.current_round = Some(ConsensusRound::new(
            self.round_counter,
            leader,
            block,
            voting_set,
            now_ms,
            now_ms + self.config.election_timeout_ms,
        ));
        Ok(())
    }

    fn validate_linkage(&self, block: &Block) -> Result<(), ConsensusError> {
        if block.height != self.confirmed_height + 1 {
            return Err(ConsensusError::InvalidBlock(format!(
                "height {} does not follow confirmed height {}",
                block.height, self.confirmed_height
            )));
        }
        if block.previous_hash != self.confirmed_hash {
            return Err(ConsensusError::InvalidBlock(format!(
                "previous_hash {} does not match confirmed tip {}",
                block.previous_hash, self.confirmed_hash
            )));
        }
        Ok(())
    }

    /// Records a vote for the current round and evaluates quorum.
    ///
    /// Votes after finality find no round and report `StaleOrUnknownBlock`,
    /// which makes finalization idempotent from the caller's point of view.
    pub fn record_vote(
        &mut self,
        voter: NodeId,
        block_hash: &str,
        approve: bool,
        now_ms: u64,
    ) -> Result<VoteOutcome, ConsensusError> {
        // Timeout beats the vote: an expired round is abandoned, never finalized
        let (expired, round_number) = match self.current_round.as_ref() {
            None => return Err(ConsensusError::StaleOrUnknownBlock(block_hash.to_string())),
            Some(r) => (r.is_expired(now_ms), r.round_number),
        };
        if expired {
            self.abandon_round(now_ms);
            return Err(ConsensusError::RoundTimedOut(round_number));
        }

        let quorum_reached = {
            let round = self.current_round.as_mut().expect("round checked above");

            if round.block.hash != block_hash {
                return Err(ConsensusError::StaleOrUnknownBlock(block_hash.to_string()));
            }
            if !round.voting_set.is_active(&voter) {
                return Err(ConsensusError::UnknownVoter(voter));
            }

            if round.record_vote(voter.clone(), approve) {
                info!(
                    "📥 [{}] voted {} on block [{}] ({}/{} approvals)",
                    voter,
                    if approve { "Yes" } else { "No" },
                    block_hash,
                    round.approvals(),
                    round.quorum_threshold()
                );
            } else {
                debug!("Ignoring re-vote from [{}] on block [{}]", voter, block_hash);
            }

            round.has_quorum()
        };

        if quorum_reached {
            return Ok(VoteOutcome::Finalized(self.finalize_round(now_ms)));
        }

        let round = self.current_round.as_ref().expect("round still active");
        Ok(VoteOutcome::Recorded {
            approvals: round.approvals(),
            quorum: round.quorum_threshold(),
        })
    }

    /// Quorum reached: advance the confirmed tip and clear the round.
    fn finalize_round(&mut self, now_ms: u64) -> Block {
        let round = self
            .current_round
            .take()
            .expect("finalize_round requires an active round");

        let mut block = round.block;
        block.status = BlockStatus::Finalized;

        let finality_ms = now_ms.saturating_sub(round.start_ms);
        self.blocks_processed += 1;
        // Incremental running average
        self.avg_finality_ms +=
            (finality_ms as f64 - self.avg_finality_ms) / self.blocks_processed as f64;

        self.confirmed_height = block.height;
        self.confirmed_hash = block.hash.clone();

        info!(
            "🎉 Block [{}] FINALIZED at height {} in {}ms (avg {:.1}ms)",
            block.hash, block.height, finality_ms, self.avg_finality_ms
        );
        tracing::info!(
            target: "consensus",
            "EVENT:FINALIZE height={} hash={} finality_ms={}",
            block.height,
            block.hash,
            finality_ms
        );

        block
    }

    /// Abandons the current round if its deadline has passed.
    ///
    /// The term advances so a stale round can never be replayed; the block is
    /// discarded, not finalized.
    pub fn check_round_timeout(&mut self, now_ms: u64) -> Option<Block> {
        let expired = self
            .current_round
            .as_ref()
            .map(|r| r.is_expired(now_ms))
            .unwrap_or(false);

        if expired {
            Some(self.abandon_round(now_ms))
        } else {
            None
        }
    }

    fn abandon_round(&mut self, _now_ms: u64) -> Block {
        let round = self
            .current_round
            .take()
            .expect("abandon_round requires an active round");

        let round_number = round.round_number;
        let approvals = round.approvals();
        let quorum = round.quorum_threshold();

        let mut block = round.block;
        block.status = BlockStatus::Rejected;
        self.state.term += 1;

        warn!(
            "⌛ Round {} timed out with {}/{} approvals, block [{}] discarded (term now {})",
            round_number, approvals, quorum, block.hash, self.state.term
        );
        tracing::info!(
            target: "consensus",
            "EVENT:ROUND_TIMEOUT round={} hash={} term={}",
            round_number,
            block.hash,
            self.state.term
        );

        block
    }

    /// Heartbeat observed from a peer. Equal-or-higher terms from another
    /// node force an immediate step-down.
    pub fn observe_heartbeat(&mut self, from: &NodeId, term: u64, now_ms: u64) {
        if *from == self.local_id {
            self.state.last_heartbeat_ms = now_ms;
            return;
        }
        if term >= self.state.term {
            self.step_down(from, term, now_ms);
        } else {
            debug!(
                "Ignoring stale heartbeat from [{}] (term {} < {})",
                from, term, self.state.term
            );
        }
    }

    fn step_down(&mut self, leader: &NodeId, term: u64, now_ms: u64) {
        if self.state.role != Role::Observer && self.state.role != Role::Follower {
            info!(
                "⬇️ Stepping down from {} to Follower (observed term {} from [{}])",
                self.state.role, term, leader
            );
        }
        if self.state.role != Role::Observer {
            self.state.role = Role::Follower;
        }
        self.state.term = self.state.term.max(term);
        self.state.leader = Some(leader.clone());
        self.state.voted_for = None;
        self.state.last_heartbeat_ms = now_ms;
    }

    /// Failure boundary: internal errors degrade the node to Follower rather
    /// than crashing the process; the next tick retries.
    pub fn degrade(&mut self, reason: &str) {
        warn!("🛑 Degrading to Follower: {}", reason);
        if self.state.role != Role::Observer {
            self.state.role = Role::Follower;
        }
        self.state.leader = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbis_common::validator::Validator;

    fn registry(ids: &[&str]) -> Arc<ValidatorRegistry> {
        Arc::new(ValidatorRegistry::new(
            ids.iter()
                .map(|id| Validator::new(NodeId::new(*id), 100))
                .collect(),
        ))
    }

    /// Registry where the local node holds the most stake and always wins.
    fn leader_engine(local: &str, ids: &[&str]) -> ConsensusEngine {
        let validators: Vec<Validator> = ids
            .iter()
            .map(|id| {
                let stake = if *id == local { 1_000 } else { 100 };
                Validator::new(NodeId::new(*id), stake)
            })
            .collect();
        let registry = Arc::new(ValidatorRegistry::new(validators));
        let mut engine = ConsensusEngine::new(
            NodeId::new(local),
            registry,
            EngineConfig::default(),
            false,
            0,
        );
        // Follower -> Candidate (timeout) -> Leader (election)
        engine.tick_role(1_001, 1.0);
        assert_eq!(engine.role(), Role::Candidate);
        engine.tick_role(1_001, 1.0);
        assert_eq!(engine.role(), Role::Leader);
        engine
    }

    #[test]
    fn test_propose_requires_leader() {
        let mut engine = ConsensusEngine::new(
            NodeId::new("n1"),
            registry(&["n1", "n2"]),
            EngineConfig::default(),
            false,
            0,
        );
        let err = engine.propose_block(vec![], 10).unwrap_err();
        assert!(matches!(err, ConsensusError::NotLeader(_)));
    }

    #[test]
    fn test_single_validator_finalizes_immediately() {
        let mut engine = leader_engine("n1", &["n1"]);
        let block = engine.propose_block(vec![], 2_000).unwrap();

        // N=1 -> quorum 1: the leader's own vote finalizes
        let outcome = engine
            .record_vote(NodeId::new("n1"), &block.hash, true, 2_010)
            .unwrap();
        match outcome {
            VoteOutcome::Finalized(b) => {
                assert_eq!(b.height, 1);
                assert_eq!(b.status, BlockStatus::Finalized);
            }
            other => panic!("expected finalization, got {:?}", other),
        }
        assert_eq!(engine.confirmed_height(), 1);
        assert!(engine.current_round().is_none());
    }

    #[test]
    fn test_four_validators_three_approvals() {
        let mut engine = leader_engine("n1", &["n1", "n2", "n3", "n4"]);
        let block = engine.propose_block(vec![], 2_000).unwrap();

        // quorum = floor(8/3) + 1 = 3; the rejection arrives in the middle
        let o1 = engine.record_vote(NodeId::new("n1"), &block.hash, true, 2_001).unwrap();
        assert!(matches!(o1, VoteOutcome::Recorded { approvals: 1, quorum: 3 }));

        let o2 = engine.record_vote(NodeId::new("n4"), &block.hash, false, 2_002).unwrap();
        assert!(matches!(o2, VoteOutcome::Recorded { approvals: 1, .. }));

        let o3 = engine.record_vote(NodeId::new("n2"), &block.hash, true, 2_003).unwrap();
        assert!(matches!(o3, VoteOutcome::Recorded { approvals: 2, .. }));

        let o4 = engine.record_vote(NodeId::new("n3"), &block.hash, true, 2_004).unwrap();
        assert!(matches!(o4, VoteOutcome::Finalized(_)));
        assert_eq!(engine.confirmed_height(), 1);
    }

    #[test]
    fn test_vote_after_finality_has_no_effect() {
        let mut engine = leader_engine("n1", &["n1"]);
        let block = engine.propose_block(vec![], 2_000).unwrap();
        engine.record_vote(NodeId::new("n1"), &block.hash, true, 2_001).unwrap();

        let processed_before = engine.blocks_processed;
        let err = engine
            .record_vote(NodeId::new("n1"), &block.hash, true, 2_002)
            .unwrap_err();
        assert!(matches!(err, ConsensusError::StaleOrUnknownBlock(_)));
        assert_eq!(engine.blocks_processed, processed_before);
        assert_eq!(engine.confirmed_height(), 1);
    }

    #[test]
    fn test_unknown_voter_rejected() {
        let mut engine = leader_engine("n1", &["n1", "n2", "n3", "n4"]);
        let block = engine.propose_block(vec![], 2_000).unwrap();

        let err = engine
            .record_vote(NodeId::new("intruder"), &block.hash, true, 2_001)
            .unwrap_err();
        assert!(matches!(err, ConsensusError::UnknownVoter(_)));
    }

    #[test]
    fn test_stale_block_hash_rejected() {
        let mut engine = leader_engine("n1", &["n1", "n2", "n3", "n4"]);
        engine.propose_block(vec![], 2_000).unwrap();

        let err = engine
            .record_vote(NodeId::new("n2"), "deadbeef", true, 2_001)
            .unwrap_err();
        assert!(matches!(err, ConsensusError::StaleOrUnknownBlock(_)));
    }

    #[test]
    fn test_round_timeout_abandons_block_forever() {
        let mut engine = leader_engine("n1", &["n1", "n2", "n3", "n4"]);
        let term_before = engine.term();
        let block = engine.propose_block(vec![], 2_000).unwrap();

        // Deadline is 2_000 + 1_000; nothing happens at the deadline itself
        assert!(engine.check_round_timeout(3_000).is_none());

        let abandoned = engine.check_round_timeout(3_001).expect("round must expire");
        assert_eq!(abandoned.status, BlockStatus::Rejected);
        assert!(engine.current_round().is_none());
        assert_eq!(engine.term(), term_before + 1);

        // The same hash can never be finalized later
        let err = engine
            .record_vote(NodeId::new("n2"), &block.hash, true, 3_002)
            .unwrap_err();
        assert!(matches!(err, ConsensusError::StaleOrUnknownBlock(_)));
        assert_eq!(engine.confirmed_height(), 0);
    }

    #[test]
    fn test_height_chain_across_rounds() {
        let mut engine = leader_engine("n1", &["n1"]);

        let b1 = engine.propose_block(vec![], 2_000).unwrap();
        engine.record_vote(NodeId::new("n1"), &b1.hash, true, 2_001).unwrap();

        let b2 = engine.propose_block(vec![], 3_000).unwrap();
        assert_eq!(b2.height, b1.height + 1);
        assert_eq!(b2.previous_hash, b1.hash);
        engine.record_vote(NodeId::new("n1"), &b2.hash, true, 3_001).unwrap();

        assert_eq!(engine.confirmed_height(), 2);
        assert_eq!(engine.confirmed_hash(), b2.hash);
    }

    #[test]
    fn test_step_down_on_higher_term_heartbeat() {
        let mut engine = leader_engine("n1", &["n1", "n2"]);
        let term = engine.term();

        engine.observe_heartbeat(&NodeId::new("n2"), term + 5, 5_000);
        assert_eq!(engine.role(), Role::Follower);
        assert_eq!(engine.term(), term + 5);
        assert_eq!(engine.leader(), Some(&NodeId::new("n2")));
    }

    #[test]
    fn test_stale_heartbeat_is_ignored() {
        let mut engine = leader_engine("n1", &["n1", "n2"]);
        let term = engine.term();
        assert!(term > 0);

        engine.observe_heartbeat(&NodeId::new("n2"), term - 1, 5_000);
        assert_eq!(engine.role(), Role::Leader);
        assert_eq!(engine.term(), term);
    }

    #[test]
    fn test_unhealthy_node_stays_follower() {
        let mut engine = ConsensusEngine::new(
            NodeId::new("n1"),
            registry(&["n1"]),
            EngineConfig::default(),
            false,
            0,
        );
        engine.tick_role(2_000, 0.2);
        assert_eq!(engine.role(), Role::Follower);

        // Healthy again: candidacy allowed on the next timeout
        engine.tick_role(4_000, 0.9);
        assert_eq!(engine.role(), Role::Candidate);
    }

    #[test]
    fn test_observer_never_transitions() {
        let mut engine = ConsensusEngine::new(
            NodeId::new("n1"),
            registry(&["n1"]),
            EngineConfig::default(),
            true,
            0,
        );
        engine.tick_role(10_000, 1.0);
        assert_eq!(engine.role(), Role::Observer);

        engine.observe_heartbeat(&NodeId::new("n2"), 7, 10_001);
        assert_eq!(engine.role(), Role::Observer);
        assert_eq!(engine.term(), 7);
    }

    #[test]
    fn test_at_most_one_round() {
        let mut engine = leader_engine("n1", &["n1", "n2", "n3", "n4"]);
        engine.propose_block(vec![], 2_000).unwrap();
        let err = engine.propose_block(vec![], 2_100).unwrap_err();
        assert!(matches!(err, ConsensusError::RoundInProgress));
    }

    #[test]
    fn test_invalid_linkage_rejected() {
        let mut engine = leader_engine("n1", &["n1", "n2"]);
        let bogus = Block::build(5, "ffff".into(), 2_000, NodeId::new("n2"), vec![]);
        let err = engine
            .handle_proposal(bogus, NodeId::new("n2"), engine.term(), 2_000)
            .unwrap_err();
        assert!(matches!(err, ConsensusError::InvalidBlock(_)));
    }
}
