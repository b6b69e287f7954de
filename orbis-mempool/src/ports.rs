//! Boundary contracts consumed by the admission pipeline.

use async_trait::async_trait;

use orbis_common::error::Result;
use orbis_common::transactions::SignedTransaction;

/// Read access to account balances/nonces (the authoritative ledger lives
/// behind this port).
#[async_trait]
pub trait AccountView: Send + Sync {
    async fn balance(&self, address: &str) -> u128;

    /// Last accepted nonce for the address; the next transaction must carry
    /// `nonce + 1`.
    async fn nonce(&self, address: &str) -> u64;
}

/// Persistence for admitted transactions.
#[async_trait]
pub trait TxStore: Send + Sync {
    async fn store_transactions(&self, batch: &[SignedTransaction]) -> Result<()>;
}
