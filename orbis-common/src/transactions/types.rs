use serde::{Deserialize, Serialize};

/// Lifecycle of a transaction inside the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    /// Accepted by the admission pipeline, waiting in the pending queue.
    Pending,
    /// Validated and persisted, eligible for inclusion in a block.
    Processing,
    /// Drained into a batch / included in a finalized block.
    Confirmed,
    /// Failed a validation check.
    Rejected,
    /// Passed validation but persistence failed after retry.
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub from: String,
    pub to: String,
    pub amount: u128,
    pub nonce: u64,
    pub gas_price: u64,
    pub gas_limit: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub public_key: Vec<u8>,
}

/// Canonical bytes covered by the transaction signature.
pub fn signing_bytes(tx: &Transaction) -> Vec<u8> {
    bincode::serialize(tx).expect("serialize transaction")
}

impl SignedTransaction {
    /// Content hash of the signed transaction.
    ///
    /// The signature is included so the same payload signed twice hashes
    /// differently.
    pub fn content_hash(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(signing_bytes(&self.transaction));
        hasher.update(&self.signature);
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction {
            id: "tx-1".into(),
            from: "alice".into(),
            to: "bob".into(),
            amount: 100,
            nonce: 1,
            gas_price: 1,
            gas_limit: 21_000,
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn test_signing_bytes_deterministic() {
        let tx = sample_tx();
        assert_eq!(signing_bytes(&tx), signing_bytes(&tx));
    }

    #[test]
    fn test_content_hash_depends_on_signature() {
        let tx = sample_tx();
        let a = SignedTransaction {
            transaction: tx.clone(),
            signature: vec![1; 64],
            public_key: vec![0; 32],
        };
        let b = SignedTransaction {
            transaction: tx,
            signature: vec![2; 64],
            public_key: vec![0; 32],
        };
        assert_ne!(a.content_hash(), b.content_hash());
    }
}
