use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier of a node/validator in the cluster.
///
/// Ordering is lexicographic on the inner string; this is relied on as the
/// deterministic tie-break during leader selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_is_lexicographic() {
        let a = NodeId::new("node-a");
        let b = NodeId::new("node-b");
        assert!(a < b);
    }
}
