//! Wallet data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::booking::BookingId;

/// User ID type
pub type UserId = i64;

/// Wallet transaction ID type
pub type TransactionId = i64;

/// Amount in minor currency units. All prices, balances, and refunds use
/// this unit; fractional math (per-minute pricing, refund percentages)
/// rounds down.
pub type Money = i64;

/// Wallet model. One wallet per registered user; `balance` is the only
/// mutable field and is written solely by the wallet manager, always in the
/// same database transaction as the ledger row that justifies the change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Transaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    TopUp,
    Payment,
    Refund,
    Withdrawal,
}

impl TransactionType {
    /// Stable string form used for the `tx_type` database column.
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::TopUp => "top_up",
            TransactionType::Payment => "payment",
            TransactionType::Refund => "refund",
            TransactionType::Withdrawal => "withdrawal",
        }
    }

    /// Parse the database string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "top_up" => Some(TransactionType::TopUp),
            "payment" => Some(TransactionType::Payment),
            "refund" => Some(TransactionType::Refund),
            "withdrawal" => Some(TransactionType::Withdrawal),
            _ => None,
        }
    }

    /// Whether this type increases the balance.
    pub fn is_credit(self) -> bool {
        matches!(self, TransactionType::TopUp | TransactionType::Refund)
    }

    /// The signed balance delta for a positive `amount` of this type.
    pub fn signed(self, amount: Money) -> Money {
        if self.is_credit() { amount } else { -amount }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wallet transaction model (append-only ledger row).
///
/// `amount` is always a positive magnitude; the direction comes from
/// `tx_type`. `balance_before`/`balance_after` snapshot the wallet balance
/// around this row, so replaying all rows for a wallet in creation order
/// from zero must reproduce the current balance exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub tx_type: TransactionType,
    pub amount: Money,
    pub balance_before: Money,
    pub balance_after: Money,
    pub booking_id: Option<BookingId>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}
