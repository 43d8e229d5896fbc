//! Wallet error types.

use thiserror::Error;

use super::models::{Money, TransactionId, TransactionType, UserId};

/// Wallet errors
#[derive(Debug, Error)]
pub enum WalletError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Insufficient balance
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: Money, required: Money },

    /// Wallet not found
    #[error("Wallet not found for user {0}")]
    WalletNotFound(UserId),

    /// Invalid amount (must be positive)
    #[error("Invalid amount: {0}")]
    InvalidAmount(Money),

    /// Transaction type does not match the requested direction
    #[error("Transaction type {0} cannot be used here")]
    DirectionMismatch(TransactionType),

    /// Balance would overflow
    #[error("Balance overflow")]
    BalanceOverflow,

    /// Ledger replay does not reproduce the stored balance. This is an
    /// invariant breach, never a recoverable condition.
    #[error(
        "Ledger mismatch for user {user_id} at transaction {transaction_id}: expected {expected}, got {actual}"
    )]
    LedgerMismatch {
        user_id: UserId,
        transaction_id: TransactionId,
        expected: Money,
        actual: Money,
    },

    /// Query timed out
    #[error("Query timed out after {0:?}")]
    QueryTimeout(std::time::Duration),
}

impl WalletError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Database errors are sanitized to prevent information disclosure about
    /// the internal system structure, and user IDs are redacted.
    pub fn client_message(&self) -> String {
        match self {
            WalletError::Database(_) | WalletError::QueryTimeout(_) => {
                "Internal server error".to_string()
            }
            WalletError::WalletNotFound(_) => "Wallet not found".to_string(),
            WalletError::LedgerMismatch { .. } => "Wallet ledger inconsistency".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;
