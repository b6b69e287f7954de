//! In-memory adapters for the consensus and pipeline ports.
//!
//! Used by the standalone binary and the cluster simulation tests; a real
//! deployment swaps these for gossip transport and durable storage.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use orbis_common::block::Block;
use orbis_common::error::{OrbisError, Result};
use orbis_common::transactions::SignedTransaction;
use orbis_common::utils::NodeId;
use orbis_common::validator::Validator;
use orbis_common::vote::VoteData;
use orbis_consensus::ports::{BlockStore, Broadcaster, ValidatorSource};
use orbis_mempool::{AccountView, TxStore};

use crate::events::NodeEvent;

/// Loopback transport: broadcasts become [`NodeEvent`]s on peer channels.
pub struct LoopbackNetwork {
    local: NodeId,
    peers: Mutex<HashMap<NodeId, mpsc::Sender<NodeEvent>>>,
}

impl LoopbackNetwork {
    pub fn new(local: NodeId) -> Self {
        Self {
            local,
            peers: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_peer(&self, peer: NodeId, sender: mpsc::Sender<NodeEvent>) {
        self.peers
            .lock()
            .expect("peers lock poisoned")
            .insert(peer, sender);
    }

    async fn fan_out(&self, event: NodeEvent) {
        let peers: Vec<(NodeId, mpsc::Sender<NodeEvent>)> = {
            let guard = self.peers.lock().expect("peers lock poisoned");
            guard.iter().map(|(id, tx)| (id.clone(), tx.clone())).collect()
        };
        for (peer, sender) in peers {
            if sender.send(event.clone()).await.is_err() {
                warn!("Peer [{}] channel closed, dropping message", peer);
            }
        }
    }
}

#[async_trait]
impl Broadcaster for LoopbackNetwork {
    async fn broadcast_proposal(&self, block: &Block, term: u64) -> Result<()> {
        self.fan_out(NodeEvent::Proposal {
            block: block.clone(),
            proposer: self.local.clone(),
            term,
        })
        .await;
        Ok(())
    }

    async fn broadcast_vote(&self, vote: &VoteData) -> Result<()> {
        self.fan_out(NodeEvent::Vote(vote.clone())).await;
        Ok(())
    }

    async fn broadcast_heartbeat(&self, term: u64) -> Result<()> {
        self.fan_out(NodeEvent::Heartbeat {
            from: self.local.clone(),
            term,
        })
        .await;
        Ok(())
    }
}

/// Records every broadcast instead of delivering it. Test double.
#[derive(Default)]
pub struct RecordingBroadcaster {
    proposals: Mutex<Vec<(Block, u64)>>,
    votes: Mutex<Vec<VoteData>>,
    heartbeats: Mutex<Vec<u64>>,
}

impl RecordingBroadcaster {
    pub fn proposals(&self) -> Vec<(Block, u64)> {
        self.proposals.lock().expect("proposals lock poisoned").clone()
    }

    pub fn votes(&self) -> Vec<VoteData> {
        self.votes.lock().expect("votes lock poisoned").clone()
    }

    pub fn heartbeats(&self) -> Vec<u64> {
        self.heartbeats.lock().expect("heartbeats lock poisoned").clone()
    }
}

#[async_trait]
impl Broadcaster for RecordingBroadcaster {
    async fn broadcast_proposal(&self, block: &Block, term: u64) -> Result<()> {
        self.proposals
            .lock()
            .expect("proposals lock poisoned")
            .push((block.clone(), term));
        Ok(())
    }

    async fn broadcast_vote(&self, vote: &VoteData) -> Result<()> {
        self.votes
            .lock()
            .expect("votes lock poisoned")
            .push(vote.clone());
        Ok(())
    }

    async fn broadcast_heartbeat(&self, term: u64) -> Result<()> {
        self.heartbeats
            .lock()
            .expect("heartbeats lock poisoned")
            .push(term);
        Ok(())
    }
}

/// Confirmed chain kept in a height-ordered map.
#[derive(Default)]
pub struct InMemoryBlockStore {
    blocks: Mutex<BTreeMap<u64, Block>>,
}

impl InMemoryBlockStore {
    pub fn height(&self) -> u64 {
        self.blocks
            .lock()
            .expect("blocks lock poisoned")
            .keys()
            .next_back()
            .copied()
            .unwrap_or(0)
    }

    pub fn latest(&self) -> Option<Block> {
        self.blocks
            .lock()
            .expect("blocks lock poisoned")
            .values()
            .next_back()
            .cloned()
    }
}

#[async_trait]
impl BlockStore for InMemoryBlockStore {
    async fn store_confirmed_block(&self, block: &Block) -> Result<()> {
        self.blocks
            .lock()
            .expect("blocks lock poisoned")
            .insert(block.height, block.clone());
        Ok(())
    }

    async fn get_block(&self, height: u64) -> Result<Option<Block>> {
        Ok(self
            .blocks
            .lock()
            .expect("blocks lock poisoned")
            .get(&height)
            .cloned())
    }
}

/// Flat account view: every address has the same balance and a zero nonce,
/// so freshly built transactions with nonce 1 are admissible.
pub struct StaticAccounts {
    pub balance: u128,
}

impl Default for StaticAccounts {
    fn default() -> Self {
        Self {
            balance: 1_000_000_000_000_000,
        }
    }
}

#[async_trait]
impl AccountView for StaticAccounts {
    async fn balance(&self, _address: &str) -> u128 {
        self.balance
    }

    async fn nonce(&self, _address: &str) -> u64 {
        0
    }
}

/// Transaction store with optional injected failures.
#[derive(Default)]
pub struct InMemoryTxStore {
    stored: Mutex<Vec<SignedTransaction>>,
    fail_remaining: AtomicUsize,
}

impl InMemoryTxStore {
    /// Store whose next `n` writes fail.
    pub fn failing(n: usize) -> Self {
        Self {
            stored: Mutex::new(Vec::new()),
            fail_remaining: AtomicUsize::new(n),
        }
    }

    pub fn stored_count(&self) -> usize {
        self.stored.lock().expect("stored lock poisoned").len()
    }
}

#[async_trait]
impl TxStore for InMemoryTxStore {
    async fn store_transactions(&self, batch: &[SignedTransaction]) -> Result<()> {
        if self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(OrbisError::Storage("injected write failure".to_string()));
        }
        self.stored
            .lock()
            .expect("stored lock poisoned")
            .extend_from_slice(batch);
        Ok(())
    }
}

/// Fixed membership feed.
pub struct StaticValidatorSource {
    pub validators: Vec<Validator>,
}

#[async_trait]
impl ValidatorSource for StaticValidatorSource {
    async fn fetch(&self) -> Result<Vec<Validator>> {
        Ok(self.validators.clone())
    }
}
