use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use orbis_common::validator::Validator;
use orbis_common::NodeId;

use crate::ports::ValidatorSource;

/// Immutable snapshot of the validator set.
///
/// Quorum calculations hold one snapshot for their whole evaluation, so a
/// concurrent membership reload can never change `N` mid-round.
#[derive(Debug, Clone, Default)]
pub struct ValidatorSet {
    validators: BTreeMap<NodeId, Validator>,
}

impl ValidatorSet {
    pub fn new(validators: Vec<Validator>) -> Self {
        Self {
            validators: validators.into_iter().map(|v| (v.id.clone(), v)).collect(),
        }
    }

    pub fn get(&self, id: &NodeId) -> Option<&Validator> {
        self.validators.get(id)
    }

    pub fn is_active(&self, id: &NodeId) -> bool {
        self.validators.get(id).map(|v| v.active).unwrap_or(false)
    }

    pub fn active(&self) -> impl Iterator<Item = &Validator> {
        self.validators.values().filter(|v| v.active)
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    pub fn total_count(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Ratio of active validators over all registered validators.
    pub fn active_ratio(&self) -> f64 {
        if self.validators.is_empty() {
            return 0.0;
        }
        self.active_count() as f64 / self.total_count() as f64
    }

    /// Mean performance score of the active validators.
    pub fn mean_performance(&self) -> f64 {
        let scores: Vec<f64> = self.active().map(|v| v.performance_score).collect();
        if scores.is_empty() {
            return 0.0;
        }
        scores.iter().sum::<f64>() / scores.len() as f64
    }

    /// Deterministic leader selection: highest stake wins, stake ties are
    /// broken by the lexicographically smallest id so every node picks the
    /// same leader.
    pub fn select_leader(&self) -> Option<NodeId> {
        self.active()
            .max_by_key(|v| (v.stake, Reverse(v.id.clone())))
            .map(|v| v.id.clone())
    }
}

/// Authoritative membership/weight data for the local node.
///
/// Read-mostly: readers clone an `Arc` snapshot; writers build a new set and
/// swap it in atomically.
#[derive(Debug, Default)]
pub struct ValidatorRegistry {
    inner: RwLock<Arc<ValidatorSet>>,
}

impl ValidatorRegistry {
    pub fn new(validators: Vec<Validator>) -> Self {
        Self {
            inner: RwLock::new(Arc::new(ValidatorSet::new(validators))),
        }
    }

    /// Current snapshot. Hold it for the whole evaluation, never re-read
    /// mid-quorum-check.
    pub fn snapshot(&self) -> Arc<ValidatorSet> {
        self.inner.read().expect("registry lock poisoned").clone()
    }

    pub fn replace(&self, validators: Vec<Validator>) {
        let set = Arc::new(ValidatorSet::new(validators));
        *self.inner.write().expect("registry lock poisoned") = set;
    }

    /// Copy-on-write performance update from the health/observation feed.
    pub fn update_performance(&self, id: &NodeId, score: f64) {
        self.mutate(|set| {
            if let Some(v) = set.validators.get_mut(id) {
                v.performance_score = score.clamp(0.0, 1.0);
            }
        });
    }

    pub fn set_active(&self, id: &NodeId, active: bool) {
        self.mutate(|set| {
            if let Some(v) = set.validators.get_mut(id) {
                v.active = active;
            }
        });
    }

    fn mutate(&self, f: impl FnOnce(&mut ValidatorSet)) {
        let mut guard = self.inner.write().expect("registry lock poisoned");
        let mut next = (**guard).clone();
        f(&mut next);
        *guard = Arc::new(next);
    }

    /// Populates the registry from the external membership feed, falling back
    /// to the statically configured list so the node can still participate
    /// instead of deadlocking on startup.
    pub async fn load_validators(
        &self,
        source: &dyn ValidatorSource,
        static_fallback: &[Validator],
    ) {
        match source.fetch().await {
            Ok(validators) if !validators.is_empty() => {
                info!("📋 Loaded {} validators from source", validators.len());
                self.replace(validators);
            }
            Ok(_) => {
                warn!(
                    "⚠️ Validator source returned an empty set, falling back to {} static validators",
                    static_fallback.len()
                );
                self.replace(static_fallback.to_vec());
            }
            Err(e) => {
                warn!(
                    "⚠️ Validator source unreachable ({}), falling back to {} static validators",
                    e,
                    static_fallback.len()
                );
                self.replace(static_fallback.to_vec());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(entries: &[(&str, u64, bool)]) -> ValidatorSet {
        ValidatorSet::new(
            entries
                .iter()
                .map(|(id, stake, active)| {
                    let mut v = Validator::new(NodeId::new(*id), *stake);
                    v.active = *active;
                    v
                })
                .collect(),
        )
    }

    #[test]
    fn test_leader_is_highest_stake() {
        let s = set(&[("a", 100, true), ("b", 300, true), ("c", 200, true)]);
        assert_eq!(s.select_leader(), Some(NodeId::new("b")));
    }

    #[test]
    fn test_stake_tie_breaks_on_smallest_id() {
        let s = set(&[("zeta", 300, true), ("alpha", 300, true), ("mid", 100, true)]);
        assert_eq!(s.select_leader(), Some(NodeId::new("alpha")));
    }

    #[test]
    fn test_inactive_validators_are_not_eligible() {
        let s = set(&[("a", 500, false), ("b", 100, true)]);
        assert_eq!(s.select_leader(), Some(NodeId::new("b")));
        assert_eq!(s.active_count(), 1);
        assert!(!s.is_active(&NodeId::new("a")));
    }

    #[test]
    fn test_snapshot_is_isolated_from_updates() {
        let registry = ValidatorRegistry::new(vec![Validator::new(NodeId::new("a"), 10)]);
        let before = registry.snapshot();

        registry.set_active(&NodeId::new("a"), false);

        // Old snapshot still sees the validator as active
        assert!(before.is_active(&NodeId::new("a")));
        assert!(!registry.snapshot().is_active(&NodeId::new("a")));
    }

    #[tokio::test]
    async fn test_load_validators_falls_back_to_static_list() {
        use crate::ports::ValidatorSource;
        use orbis_common::error::Result;

        struct BrokenSource;

        #[async_trait::async_trait]
        impl ValidatorSource for BrokenSource {
            async fn fetch(&self) -> Result<Vec<Validator>> {
                Err(orbis_common::OrbisError::Registry("unreachable".into()))
            }
        }

        let registry = ValidatorRegistry::default();
        let fallback = vec![Validator::new(NodeId::new("static-1"), 1)];
        registry.load_validators(&BrokenSource, &fallback).await;

        let snap = registry.snapshot();
        assert_eq!(snap.total_count(), 1);
        assert!(snap.is_active(&NodeId::new("static-1")));
    }

    #[test]
    fn test_active_ratio_and_mean_performance() {
        let registry = ValidatorRegistry::new(vec![
            Validator::new(NodeId::new("a"), 10).with_score(0.8),
            Validator::new(NodeId::new("b"), 10).with_score(0.6),
        ]);
        registry.set_active(&NodeId::new("b"), false);

        let snap = registry.snapshot();
        assert_eq!(snap.active_ratio(), 0.5);
        assert_eq!(snap.mean_performance(), 0.8);
    }
}
