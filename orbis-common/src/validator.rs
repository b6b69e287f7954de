use serde::{Deserialize, Serialize};

use crate::utils::NodeId;

/// A registered consensus participant.
///
/// Only `active` validators belong to the voting set used for quorum
/// calculations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Validator {
    pub id: NodeId,
    pub stake: u64,
    /// Rolling performance score in `[0, 1]`.
    pub performance_score: f64,
    pub active: bool,
}

impl Validator {
    pub fn new(id: NodeId, stake: u64) -> Self {
        Validator {
            id,
            stake,
            performance_score: 1.0,
            active: true,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.performance_score = score.clamp(0.0, 1.0);
        self
    }
}
