use std::{fs, io};

use serde::{Deserialize, Serialize};

use orbis_common::utils::NodeId;
use orbis_common::validator::Validator;
use orbis_consensus::EngineConfig;
use orbis_mempool::PipelineConfig;

/// Node configuration, persisted as JSON next to the node's data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node_id: NodeId,
    /// Observers track consensus but never stand for election.
    pub observer: bool,
    pub election_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    /// How often the drain loop checks the pending queue.
    pub drain_interval_ms: u64,
    pub health_interval_ms: u64,
    /// Average finality latency above this triggers a warning. Timing only,
    /// never affects safety.
    pub finality_target_ms: u64,
    pub min_election_health: f64,
    pub batch_size: usize,
    pub max_concurrent_validators: usize,
    pub max_cache_size: usize,
    /// Static membership, used when no external validator source answers.
    pub validators: Vec<Validator>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let node_id = NodeId::new("node-1");
        Self {
            node_id: node_id.clone(),
            observer: false,
            election_timeout_ms: 1_000,
            heartbeat_interval_ms: 250,
            drain_interval_ms: 500,
            health_interval_ms: 1_000,
            finality_target_ms: 5_000,
            min_election_health: 0.5,
            batch_size: 500,
            max_concurrent_validators: 8,
            max_cache_size: 50_000,
            validators: vec![Validator::new(node_id, 100)],
        }
    }
}

impl NodeConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            election_timeout_ms: self.election_timeout_ms,
            min_election_health: self.min_election_health,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            batch_size: self.batch_size,
            max_concurrent_validators: self.max_concurrent_validators,
            max_cache_size: self.max_cache_size,
        }
    }

    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        fs::write(path, json)
    }

    pub fn load_from_file(path: &str) -> io::Result<Self> {
        let data = fs::read_to_string(path)?;
        let parsed = serde_json::from_str::<NodeConfig>(&data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(parsed)
    }

    /// Writes a default config if `path` does not exist yet.
    pub fn ensure_file(path: &str, node_id: &str) -> io::Result<Self> {
        if std::path::Path::new(path).exists() {
            return Self::load_from_file(path);
        }
        let config = NodeConfig {
            node_id: NodeId::new(node_id),
            validators: vec![Validator::new(NodeId::new(node_id), 100)],
            ..NodeConfig::default()
        };
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        config.save_to_file(path)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = NodeConfig::default();
        config.node_id = NodeId::new("node-7");
        config.election_timeout_ms = 2_500;
        config.save_to_file(&path).unwrap();

        let loaded = NodeConfig::load_from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.node_id, NodeId::new("node-7"));
        assert_eq!(loaded.election_timeout_ms, 2_500);
        assert_eq!(loaded.batch_size, 500);
    }

    #[test]
    fn test_ensure_file_creates_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes/a/config.json");
        let path_str = path.to_str().unwrap();

        let created = NodeConfig::ensure_file(path_str, "node-a").unwrap();
        assert_eq!(created.node_id, NodeId::new("node-a"));
        assert!(path.exists());

        // Second call loads instead of overwriting
        let loaded = NodeConfig::ensure_file(path_str, "ignored").unwrap();
        assert_eq!(loaded.node_id, NodeId::new("node-a"));
    }
}
