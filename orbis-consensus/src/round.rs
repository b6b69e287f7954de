use std::collections::HashMap;
use std::sync::Arc;

use orbis_common::block::Block;
use orbis_common::NodeId;

use crate::registry::ValidatorSet;

/// One attempt, under a specific leader/term, to finalize a single block.
///
/// Exactly one round is active per node at a time; the round owns a snapshot
/// of the voting set taken at round start, so `N` is stable for its lifetime.
#[derive(Debug, Clone)]
pub struct ConsensusRound {
    pub round_number: u64,
    pub leader_id: NodeId,
    pub block: Block,
    votes: HashMap<NodeId, bool>,
    pub voting_set: Arc<ValidatorSet>,
    pub start_ms: u64,
    pub deadline_ms: u64,
}

impl ConsensusRound {
    pub fn new(
        round_number: u64,
        leader_id: NodeId,
        block: Block,
        voting_set: Arc<ValidatorSet>,
        start_ms: u64,
        deadline_ms: u64,
    ) -> Self {
        Self {
            round_number,
            leader_id,
            block,
            votes: HashMap::new(),
            voting_set,
            start_ms,
            deadline_ms,
        }
    }

    /// Records a vote. The first vote from a validator wins; re-votes are
    /// ignored and reported as `false`.
    pub fn record_vote(&mut self, voter: NodeId, approve: bool) -> bool {
        if self.votes.contains_key(&voter) {
            return false;
        }
        self.votes.insert(voter, approve);
        true
    }

    pub fn approvals(&self) -> usize {
        self.votes.values().filter(|v| **v).count()
    }

    pub fn rejections(&self) -> usize {
        self.votes.values().filter(|v| !**v).count()
    }

    pub fn votes_received(&self) -> usize {
        self.votes.len()
    }

    /// BFT quorum over the round's voting set: `⌊2N/3⌋ + 1`, tolerating up to
    /// `⌊(N-1)/3⌋` faulty validators.
    pub fn quorum_threshold(&self) -> usize {
        quorum_threshold(self.voting_set.active_count())
    }

    pub fn has_quorum(&self) -> bool {
        self.approvals() >= self.quorum_threshold()
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.deadline_ms
    }
}

pub fn quorum_threshold(n: usize) -> usize {
    (2 * n) / 3 + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbis_common::block::Block;
    use orbis_common::validator::Validator;

    fn round_with(n: usize) -> ConsensusRound {
        let validators = (0..n)
            .map(|i| Validator::new(NodeId::new(format!("node{}", i)), 100))
            .collect();
        let set = Arc::new(ValidatorSet::new(validators));
        let block = Block::build(
            1,
            Block::genesis_parent_hash(),
            1_000,
            NodeId::new("node0"),
            vec![],
        );
        ConsensusRound::new(1, NodeId::new("node0"), block, set, 0, 1_000)
    }

    #[test]
    fn test_quorum_threshold_values() {
        // N=1 -> 1, N=3 -> 3, N=4 -> 3, N=7 -> 5
        assert_eq!(quorum_threshold(1), 1);
        assert_eq!(quorum_threshold(3), 3);
        assert_eq!(quorum_threshold(4), 3);
        assert_eq!(quorum_threshold(7), 5);
    }

    #[test]
    fn test_revote_is_ignored() {
        let mut round = round_with(4);
        assert!(round.record_vote(NodeId::new("node1"), true));
        assert!(!round.record_vote(NodeId::new("node1"), false));
        assert_eq!(round.approvals(), 1);
        assert_eq!(round.rejections(), 0);
    }

    #[test]
    fn test_quorum_requires_threshold_approvals() {
        let mut round = round_with(4);
        round.record_vote(NodeId::new("node0"), true);
        round.record_vote(NodeId::new("node1"), true);
        round.record_vote(NodeId::new("node2"), false);
        assert!(!round.has_quorum()); // 2 approvals < 3

        round.record_vote(NodeId::new("node3"), true);
        assert!(round.has_quorum()); // 3rd approval, rejection is irrelevant
    }

    #[test]
    fn test_deadline() {
        let round = round_with(1);
        assert!(!round.is_expired(1_000));
        assert!(round.is_expired(1_001));
    }
}
