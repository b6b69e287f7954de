use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use orbis_common::auth::Authenticator;
use orbis_common::block::Block;
use orbis_common::error::{OrbisError, Result};
use orbis_common::transactions::{SignedTransaction, TxStatus, ValidationError};
use orbis_common::utils::time::Clock;
use orbis_common::vote::{vote_signing_bytes, VoteData};
use orbis_consensus::engine::ConsensusStatus;
use orbis_consensus::ports::{BlockStore, Broadcaster, ValidatorSource};
use orbis_consensus::{ConsensusEngine, HealthMonitor, ValidatorRegistry};
use orbis_mempool::{AccountView, AdmissionPipeline, BatchReceipt, PipelineStats, TxReceipt, TxStore};

use crate::config::NodeConfig;

/// Combined status surface: consensus snapshot plus pipeline/network health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatus {
    pub node_id: String,
    pub consensus: ConsensusStatus,
    pub network_health: f64,
    pub active_validators: usize,
    pub pending_transactions: usize,
}

/// One running node: the consensus engine, the admission pipeline and the
/// validator registry wired to their outbound ports.
///
/// The engine sits behind a single mutex; every runtime path that mutates
/// consensus state goes through it, so rounds are never raced.
pub struct OrbisNode {
    pub config: NodeConfig,
    pub engine: Arc<Mutex<ConsensusEngine>>,
    pub pipeline: Arc<AdmissionPipeline>,
    pub registry: Arc<ValidatorRegistry>,
    pub health: Arc<std::sync::Mutex<HealthMonitor>>,
    pub auth: Arc<dyn Authenticator>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub block_store: Arc<dyn BlockStore>,
    pub clock: Arc<dyn Clock>,
}

impl OrbisNode {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: NodeConfig,
        auth: Arc<dyn Authenticator>,
        accounts: Arc<dyn AccountView>,
        tx_store: Arc<dyn TxStore>,
        broadcaster: Arc<dyn Broadcaster>,
        block_store: Arc<dyn BlockStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let registry = Arc::new(ValidatorRegistry::new(config.validators.clone()));
        let engine = ConsensusEngine::new(
            config.node_id.clone(),
            Arc::clone(&registry),
            config.engine_config(),
            config.observer,
            clock.now_ms(),
        );
        let pipeline = Arc::new(AdmissionPipeline::new(
            config.pipeline_config(),
            Arc::clone(&auth),
            accounts,
            tx_store,
            Arc::clone(&clock),
        ));

        info!(
            "🚀 Node [{}] initialized with {} static validators",
            config.node_id,
            config.validators.len()
        );

        Self {
            config,
            engine: Arc::new(Mutex::new(engine)),
            pipeline,
            registry,
            health: Arc::new(std::sync::Mutex::new(HealthMonitor::new())),
            auth,
            broadcaster,
            block_store,
            clock,
        }
    }

    /// Refreshes membership from the external feed, keeping the static list
    /// as fallback.
    pub async fn sync_validators(&self, source: &dyn ValidatorSource) {
        self.registry
            .load_validators(source, &self.config.validators)
            .await;
    }

    /// Recomputes network health from the current registry snapshot.
    pub fn recompute_health(&self) -> f64 {
        let snapshot = self.registry.snapshot();
        self.health
            .lock()
            .expect("health lock poisoned")
            .recompute(&snapshot)
    }

    pub fn network_health(&self) -> f64 {
        self.health.lock().expect("health lock poisoned").current()
    }

    pub async fn submit_transaction(
        &self,
        tx: SignedTransaction,
    ) -> std::result::Result<TxReceipt, ValidationError> {
        self.pipeline.submit(tx).await
    }

    pub async fn submit_batch(&self, txs: Vec<SignedTransaction>) -> BatchReceipt {
        self.pipeline.submit_batch(txs).await
    }

    pub fn get_transaction(&self, tx_id: &str) -> Option<(SignedTransaction, TxStatus)> {
        self.pipeline.get_transaction(tx_id)
    }

    pub fn get_stats(&self) -> PipelineStats {
        self.pipeline.get_stats()
    }

    pub async fn get_block(&self, height: u64) -> Result<Option<Block>> {
        self.block_store.get_block(height).await
    }

    pub async fn get_transactions_for_block(
        &self,
        height: u64,
    ) -> Result<Option<Vec<SignedTransaction>>> {
        Ok(self
            .block_store
            .get_block(height)
            .await?
            .map(|block| block.transactions))
    }

    pub async fn get_status(&self) -> NodeStatus {
        let consensus = self.engine.lock().await.status();
        NodeStatus {
            node_id: self.config.node_id.to_string(),
            consensus,
            network_health: self.network_health(),
            active_validators: self.registry.snapshot().active_count(),
            pending_transactions: self.pipeline.pending_len(),
        }
    }

    /// Builds and signs this node's vote on `block_hash`.
    pub fn sign_vote(&self, block_hash: &str, approve: bool, term: u64) -> Result<VoteData> {
        let mut vote = VoteData {
            block_hash: block_hash.to_string(),
            approve,
            voter: self.config.node_id.clone(),
            term,
            signature: [0u8; 64],
            public_key: self.auth.public_key(),
        };
        let msg = vote_signing_bytes(&vote);
        let signature = self.auth.sign(msg).map_err(OrbisError::Auth)?;
        let signature: [u8; 64] = signature
            .try_into()
            .map_err(|_| OrbisError::Auth("Invalid vote signature length".to_string()))?;
        vote.signature = signature;
        Ok(vote)
    }

    /// Checks a peer vote's signature against the key it carries.
    pub fn verify_vote(&self, vote: &VoteData) -> Result<()> {
        let msg = vote_signing_bytes(vote);
        let valid = self
            .auth
            .verify_with_key(msg, &vote.signature, &vote.public_key)
            .map_err(OrbisError::Auth)?;
        if !valid {
            return Err(OrbisError::Auth(format!(
                "Vote signature from [{}] does not verify",
                vote.voter
            )));
        }
        Ok(())
    }
}
