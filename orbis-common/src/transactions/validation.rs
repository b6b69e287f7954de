use crate::auth::Authenticator;
use crate::transactions::errors::ValidationError;
use crate::transactions::types::{signing_bytes, SignedTransaction};

/// Minimum gas limit accepted for any transaction.
pub const MIN_GAS_LIMIT: u64 = 21_000;
/// Maximum gas limit accepted for any transaction.
pub const MAX_GAS_LIMIT: u64 = 10_000_000;

pub struct TransactionValidator;

impl TransactionValidator {
    /// Structural checks, no account state required:
    /// 1. Non-empty id / from / to.
    /// 2. Amount > 0.
    /// 3. Timestamp set.
    /// 4. Key and signature lengths.
    pub fn validate_structure(tx: &SignedTransaction) -> Result<(), ValidationError> {
        let inner = &tx.transaction;

        if inner.id.is_empty() {
            return Err(ValidationError::InvalidStructure(
                "Transaction id must be set".to_string(),
            ));
        }
        if inner.from.is_empty() || inner.to.is_empty() {
            return Err(ValidationError::InvalidStructure(
                "Transaction must have 'from' and 'to' addresses".to_string(),
            ));
        }
        if inner.from == inner.to {
            return Err(ValidationError::InvalidStructure(
                "Self-transfers are not allowed".to_string(),
            ));
        }
        if inner.amount == 0 {
            return Err(ValidationError::InvalidStructure(
                "Transaction amount must be greater than 0".to_string(),
            ));
        }
        if inner.timestamp == 0 {
            return Err(ValidationError::InvalidStructure(
                "Transaction timestamp must be set".to_string(),
            ));
        }
        if tx.public_key.len() != 32 {
            return Err(ValidationError::InvalidStructure(
                "Invalid public key length (must be 32 bytes)".to_string(),
            ));
        }
        if tx.signature.len() != 64 {
            return Err(ValidationError::InvalidStructure(
                "Invalid signature length (must be 64 bytes)".to_string(),
            ));
        }

        Ok(())
    }

    /// Gas parameter checks: positive price, limit within bounds.
    pub fn validate_gas(tx: &SignedTransaction) -> Result<(), ValidationError> {
        let inner = &tx.transaction;

        if inner.gas_price == 0 {
            return Err(ValidationError::InvalidGasParameters(
                "gas_price must be greater than 0".to_string(),
            ));
        }
        if inner.gas_limit < MIN_GAS_LIMIT {
            return Err(ValidationError::InvalidGasParameters(format!(
                "gas_limit {} below minimum {}",
                inner.gas_limit, MIN_GAS_LIMIT
            )));
        }
        if inner.gas_limit > MAX_GAS_LIMIT {
            return Err(ValidationError::InvalidGasParameters(format!(
                "gas_limit {} above maximum {}",
                inner.gas_limit, MAX_GAS_LIMIT
            )));
        }

        Ok(())
    }

    /// Signature check, delegated to the signing capability.
    pub fn verify_signature(
        tx: &SignedTransaction,
        auth: &dyn Authenticator,
    ) -> Result<(), ValidationError> {
        let signature: [u8; 64] = tx
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| ValidationError::InvalidSignature("Invalid signature length".into()))?;

        let msg = signing_bytes(&tx.transaction);
        let valid = auth
            .verify_with_key(msg, &signature, &tx.public_key)
            .map_err(|e| ValidationError::InvalidSignature(e))?;

        if !valid {
            return Err(ValidationError::InvalidSignature(
                "Signature does not match payload".to_string(),
            ));
        }

        Ok(())
    }
}
