pub mod errors;
pub mod types;
pub mod validation;

pub use errors::ValidationError;
pub use types::{signing_bytes, SignedTransaction, Transaction, TxStatus};
pub use validation::TransactionValidator;
