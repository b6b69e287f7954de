use thiserror::Error;

/// Per-transaction admission failures.
///
/// These are recoverable and reported to the caller; a failing transaction
/// never aborts the batch it arrived in.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The transaction is structurally malformed.
    ///
    /// This can happen if:
    /// - `id`, `from` or `to` are empty.
    /// - The amount is zero.
    /// - The timestamp is unset.
    #[error("Invalid transaction structure: {0}")]
    InvalidStructure(String),

    /// A transaction with the same id was already accepted.
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),

    /// The sender cannot cover `amount + gas_price * gas_limit`.
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u128, available: u128 },

    /// The nonce does not follow the sender's current account nonce.
    #[error("Invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },

    /// Gas price or limit outside the accepted range.
    #[error("Invalid gas parameters: {0}")]
    InvalidGasParameters(String),

    /// The signature does not verify against the payload and public key.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Persistence failed after the single allowed retry.
    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),
}
