use std::collections::VecDeque;

use tracing::debug;

use crate::registry::ValidatorSet;

const HISTORY_LEN: usize = 60;

/// Composite health score for the local node's view of the validator set.
///
/// `health = clamp(0, 1, (active_ratio + mean_performance) / 2)`, recomputed
/// periodically by the scheduler. Feeds leader-election eligibility and the
/// status surface.
#[derive(Debug, Default)]
pub struct HealthMonitor {
    current: f64,
    history: VecDeque<f64>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recompute(&mut self, set: &ValidatorSet) -> f64 {
        let score = ((set.active_ratio() + set.mean_performance()) / 2.0).clamp(0.0, 1.0);

        self.current = score;
        self.history.push_back(score);
        while self.history.len() > HISTORY_LEN {
            self.history.pop_front();
        }

        debug!(
            "🩺 Health recomputed: {:.3} (active_ratio={:.2}, mean_perf={:.2})",
            score,
            set.active_ratio(),
            set.mean_performance()
        );
        score
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn history(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().copied()
    }
}
