use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use orbis_common::auth::Authenticator;
use orbis_common::transactions::{
    SignedTransaction, TransactionValidator, TxStatus, ValidationError,
};
use orbis_common::utils::time::Clock;

use crate::core::stats::{PipelineStats, TpsMeter};
use crate::ports::{AccountView, TxStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Transactions per drained batch.
    pub batch_size: usize,
    /// Parallelism bound for batch validation.
    pub max_concurrent_validators: usize,
    /// Recent-id duplicate cache bound; the oldest half is evicted past this.
    pub max_cache_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            max_concurrent_validators: 8,
            max_cache_size: 50_000,
        }
    }
}

/// Receipt for an accepted transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_id: String,
    pub content_hash: String,
    pub status: TxStatus,
}

/// Per-transaction outcome inside a batch submission.
#[derive(Debug, Clone)]
pub enum TxOutcome {
    Accepted(TxReceipt),
    Rejected { tx_id: String, error: ValidationError },
}

/// Aggregate result of `submit_batch`, in input order.
#[derive(Debug, Clone)]
pub struct BatchReceipt {
    pub outcomes: Vec<TxOutcome>,
    pub accepted: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone)]
struct TxRecord {
    tx: SignedTransaction,
    status: TxStatus,
    content_hash: String,
}

/// Validates, deduplicates, batches and meters incoming transactions.
///
/// Validation of individual transactions is the only truly parallel part;
/// queue/cache mutation happens under short lock sections with no `await`
/// inside.
pub struct AdmissionPipeline {
    config: PipelineConfig,
    auth: Arc<dyn Authenticator>,
    accounts: Arc<dyn AccountView>,
    store: Arc<dyn TxStore>,
    clock: Arc<dyn Clock>,
    /// Transaction ids in arrival order, waiting to be drained.
    pending: RwLock<VecDeque<String>>,
    records: RwLock<HashMap<String, TxRecord>>,
    recent_ids: RwLock<HashSet<String>>,
    recent_order: Mutex<VecDeque<String>>,
    meter: Mutex<TpsMeter>,
}

impl AdmissionPipeline {
    pub fn new(
        config: PipelineConfig,
        auth: Arc<dyn Authenticator>,
        accounts: Arc<dyn AccountView>,
        store: Arc<dyn TxStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now_ms();
        Self {
            config,
            auth,
            accounts,
            store,
            clock,
            pending: RwLock::new(VecDeque::new()),
            records: RwLock::new(HashMap::new()),
            recent_ids: RwLock::new(HashSet::new()),
            recent_order: Mutex::new(VecDeque::new()),
            meter: Mutex::new(TpsMeter::new(now)),
        }
    }

    /// Admits a single transaction.
    ///
    /// Check order: structure → duplicate → balance → nonce → gas →
    /// signature. The first failure short-circuits; acceptance persists the
    /// transaction and enqueues it for draining.
    pub async fn submit(&self, tx: SignedTransaction) -> Result<TxReceipt, ValidationError> {
        self.validate(&tx).await?;
        self.admit(tx).await
    }

    /// Admits a batch, validating transactions concurrently (bounded by
    /// `max_concurrent_validators`) and persisting the accepted ones as a
    /// single unit. Outcomes preserve input order.
    pub async fn submit_batch(&self, txs: Vec<SignedTransaction>) -> BatchReceipt {
        // 1. Validate in parallel; validation is read-only
        let validations: Vec<Result<(), ValidationError>> = stream::iter(&txs)
            .map(|tx| self.validate(tx))
            .buffered(self.config.max_concurrent_validators.max(1))
            .collect()
            .await;

        // 2. Merge sequentially: re-check duplicates (two copies of the same
        //    id can both pass the parallel check), then persist as one unit
        let mut outcomes: Vec<TxOutcome> = Vec::with_capacity(txs.len());
        let mut accepted_txs: Vec<SignedTransaction> = Vec::new();
        let mut accepted_idx: Vec<usize> = Vec::new();

        for (i, (tx, validation)) in txs.into_iter().zip(validations).enumerate() {
            let tx_id = tx.transaction.id.clone();
            match validation {
                Err(e) => outcomes.push(TxOutcome::Rejected { tx_id, error: e }),
                Ok(()) => {
                    if !self.remember_id(&tx_id) {
                        outcomes.push(TxOutcome::Rejected {
                            tx_id: tx_id.clone(),
                            error: ValidationError::DuplicateTransaction(tx_id),
                        });
                        continue;
                    }
                    accepted_idx.push(i);
                    outcomes.push(TxOutcome::Accepted(TxReceipt {
                        tx_id,
                        content_hash: tx.content_hash(),
                        status: TxStatus::Processing,
                    }));
                    accepted_txs.push(tx);
                }
            }
        }

        // 3. Batched persistence, one retry. On definitive failure the
        //    transactions are recorded as Failed, same as the single-submit
        //    path, so status queries explain the later duplicate rejection
        if !accepted_txs.is_empty() {
            if let Err(e) = self.persist_with_retry(&accepted_txs).await {
                warn!("❌ Batch persistence failed after retry: {}", e);
                let mut meter = self.meter.lock().expect("meter lock poisoned");
                let mut records = self.records.write().expect("records lock poisoned");
                for (idx, tx) in accepted_idx.drain(..).zip(accepted_txs.drain(..)) {
                    let tx_id = tx.transaction.id.clone();
                    meter.record_failed();
                    records.insert(
                        tx_id.clone(),
                        TxRecord {
                            content_hash: tx.content_hash(),
                            tx,
                            status: TxStatus::Failed,
                        },
                    );
                    outcomes[idx] = TxOutcome::Rejected {
                        tx_id,
                        error: ValidationError::PersistenceFailed(e.clone()),
                    };
                }
            }
        }

        // 4. Enqueue survivors
        let now = self.clock.now_ms();
        for tx in accepted_txs {
            self.enqueue(tx, now);
        }

        let accepted = accepted_idx.len();
        let rejected = outcomes.len() - accepted;
        info!(
            "📊 Batch processed: {} accepted, {} rejected",
            accepted, rejected
        );
        BatchReceipt {
            outcomes,
            accepted,
            rejected,
        }
    }

    async fn validate(&self, tx: &SignedTransaction) -> Result<(), ValidationError> {
        let inner = &tx.transaction;

        // 1. Structure
        TransactionValidator::validate_structure(tx)?;

        // 2. Duplicate (recent-id cache)
        if self.is_known_id(&inner.id) {
            return Err(ValidationError::DuplicateTransaction(inner.id.clone()));
        }

        // 3. Balance covers amount plus worst-case gas. Saturating math: a
        //    total past u128::MAX can never be covered, so it must reject
        //    rather than wrap around
        let gas_cost = (inner.gas_price as u128).saturating_mul(inner.gas_limit as u128);
        let required = inner.amount.saturating_add(gas_cost);
        let available = self.accounts.balance(&inner.from).await;
        if available < required {
            return Err(ValidationError::InsufficientBalance {
                required,
                available,
            });
        }

        // 4. Nonce continuity
        let expected = self.accounts.nonce(&inner.from).await + 1;
        if inner.nonce != expected {
            return Err(ValidationError::InvalidNonce {
                expected,
                got: inner.nonce,
            });
        }

        // 5. Gas parameters
        TransactionValidator::validate_gas(tx)?;

        // 6. Signature, via the signing capability
        TransactionValidator::verify_signature(tx, self.auth.as_ref())?;

        Ok(())
    }

    async fn admit(&self, tx: SignedTransaction) -> Result<TxReceipt, ValidationError> {
        let tx_id = tx.transaction.id.clone();

        // Authoritative duplicate decision happens at insertion time, so two
        // concurrent submits of the same id cannot both win
        if !self.remember_id(&tx_id) {
            return Err(ValidationError::DuplicateTransaction(tx_id));
        }

        if let Err(e) = self.persist_with_retry(std::slice::from_ref(&tx)).await {
            self.meter
                .lock()
                .expect("meter lock poisoned")
                .record_failed();
            self.records.write().expect("records lock poisoned").insert(
                tx_id.clone(),
                TxRecord {
                    content_hash: tx.content_hash(),
                    tx,
                    status: TxStatus::Failed,
                },
            );
            return Err(ValidationError::PersistenceFailed(e));
        }

        let receipt = TxReceipt {
            tx_id,
            content_hash: tx.content_hash(),
            status: TxStatus::Processing,
        };
        self.enqueue(tx, self.clock.now_ms());
        Ok(receipt)
    }

    async fn persist_with_retry(&self, batch: &[SignedTransaction]) -> Result<(), String> {
        match self.store.store_transactions(batch).await {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!("⚠️ Persistence failed ({}), retrying once", first);
                self.store
                    .store_transactions(batch)
                    .await
                    .map_err(|e| e.to_string())
            }
        }
    }

    fn enqueue(&self, tx: SignedTransaction, now_ms: u64) {
        let tx_id = tx.transaction.id.clone();
        let record = TxRecord {
            content_hash: tx.content_hash(),
            tx,
            status: TxStatus::Processing,
        };
        self.records
            .write()
            .expect("records lock poisoned")
            .insert(tx_id.clone(), record);
        self.pending
            .write()
            .expect("pending lock poisoned")
            .push_back(tx_id);
        self.meter
            .lock()
            .expect("meter lock poisoned")
            .record_processed(now_ms);
    }

    fn is_known_id(&self, tx_id: &str) -> bool {
        self.recent_ids
            .read()
            .expect("recent lock poisoned")
            .contains(tx_id)
    }

    /// Inserts the id into the bounded recent cache. Returns false if it was
    /// already there. Past the size bound, the oldest half is evicted,
    /// trading perfect duplicate detection for bounded memory.
    fn remember_id(&self, tx_id: &str) -> bool {
        let mut ids = self.recent_ids.write().expect("recent lock poisoned");
        if !ids.insert(tx_id.to_string()) {
            return false;
        }
        let mut order = self.recent_order.lock().expect("order lock poisoned");
        order.push_back(tx_id.to_string());

        if order.len() > self.config.max_cache_size {
            let evict = order.len() / 2;
            info!("🧹 Recent-id cache full, evicting oldest {} entries", evict);
            for _ in 0..evict {
                if let Some(old) = order.pop_front() {
                    ids.remove(&old);
                }
            }
        }
        true
    }

    /// Removes up to `batch_size` oldest pending transactions and marks them
    /// `Confirmed`. Called by the drain loop when the queue is full enough or
    /// the idle interval elapsed.
    pub fn drain_batch(&self) -> Vec<SignedTransaction> {
        let mut pending = self.pending.write().expect("pending lock poisoned");
        let mut records = self.records.write().expect("records lock poisoned");

        let n = self.config.batch_size.min(pending.len());
        let mut batch = Vec::with_capacity(n);
        for _ in 0..n {
            let id = match pending.pop_front() {
                Some(id) => id,
                None => break,
            };
            if let Some(record) = records.get_mut(&id) {
                record.status = TxStatus::Confirmed;
                batch.push(record.tx.clone());
            }
        }

        if !batch.is_empty() {
            info!("🚚 Drained batch of {} transactions", batch.len());
        }
        batch
    }

    /// Drops transactions included in a finalized block.
    pub fn remove_finalized(&self, tx_ids: &[String]) {
        let mut records = self.records.write().expect("records lock poisoned");
        for id in tx_ids {
            records.remove(id);
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.read().expect("pending lock poisoned").len()
    }

    pub fn get_transaction(&self, tx_id: &str) -> Option<(SignedTransaction, TxStatus)> {
        self.records
            .read()
            .expect("records lock poisoned")
            .get(tx_id)
            .map(|r| (r.tx.clone(), r.status))
    }

    /// Throughput snapshot; side-effect-free for callers.
    pub fn get_stats(&self) -> PipelineStats {
        let pending = self.pending_len();
        self.meter
            .lock()
            .expect("meter lock poisoned")
            .snapshot(self.clock.now_ms(), pending)
    }
}
