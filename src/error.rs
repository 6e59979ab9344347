//! Error types for the transaction submitter

use thiserror::Error;

/// Main error type for the submitter
#[derive(Error, Debug)]
pub enum SubmitterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("RPC call {method} failed: {message}")]
    Rpc { method: &'static str, message: String },

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Insufficient balance for {address}: {message}")]
    InsufficientBalance { address: String, message: String },

    #[error("Nonce {nonce} rejected as too low")]
    NonceTooLow { nonce: u64 },

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },
}

impl SubmitterError {
    /// Check if error is transient.
    ///
    /// Only read-only lookups act on this; submissions are never repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SubmitterError::Rpc { .. } | SubmitterError::Timeout { .. }
        )
    }

    /// Classify a node rejection of `eth_sendRawTransaction`
    pub fn from_rejection(address: &str, nonce: u64, message: String) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("insufficient funds") {
            SubmitterError::InsufficientBalance {
                address: address.to_string(),
                message,
            }
        } else if lower.contains("nonce too low") {
            SubmitterError::NonceTooLow { nonce }
        } else {
            SubmitterError::Transaction(message)
        }
    }
}

/// Result type for submitter operations
pub type SubmitterResult<T> = Result<T, SubmitterError>;
