//! Wallet manager implementation with an append-only balance ledger.

use super::{
    errors::{WalletError, WalletResult},
    models::{Money, TransactionType, UserId, Wallet, WalletTransaction},
};
use crate::booking::BookingId;
use crate::db::timeouts::{TimeoutError, with_default_timeout};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;

/// Wallet manager
///
/// Every balance change reads the current balance under a row lock, writes
/// the wallet row and the ledger row in the same database transaction, and
/// records `balance_before`/`balance_after` so the ledger stays a gap-free
/// audit trail. A debit below zero is a hard error, never a negative balance.
#[derive(Clone)]
pub struct WalletManager {
    pool: Arc<PgPool>,
}

impl WalletManager {
    /// Create a new wallet manager
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Get wallet balance for a user
    ///
    /// # Errors
    ///
    /// * `WalletError::WalletNotFound` - No wallet exists for the user
    pub async fn get_wallet(&self, user_id: UserId) -> WalletResult<Wallet> {
        let row = sqlx::query(
            r#"
            SELECT user_id, balance, created_at, updated_at
            FROM wallets
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(WalletError::WalletNotFound(user_id))?;

        Ok(Self::wallet_from_row(&row))
    }

    /// Get the wallet for a user, creating an empty one if none exists.
    pub async fn get_or_create_wallet(&self, user_id: UserId) -> WalletResult<Wallet> {
        sqlx::query(
            "INSERT INTO wallets (user_id, balance) VALUES ($1, 0)
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(self.pool.as_ref())
        .await?;

        self.get_wallet(user_id).await
    }

    /// Credit a wallet and append the matching ledger row.
    ///
    /// # Errors
    ///
    /// * `WalletError::InvalidAmount` - Amount is not positive
    /// * `WalletError::DirectionMismatch` - `tx_type` is not a credit type
    /// * `WalletError::WalletNotFound` - No wallet exists for the user
    pub async fn credit(
        &self,
        user_id: UserId,
        amount: Money,
        tx_type: TransactionType,
        booking_id: Option<BookingId>,
        description: &str,
    ) -> WalletResult<WalletTransaction> {
        let mut tx = self.pool.begin().await?;
        let entry =
            Self::credit_in_tx(&mut tx, user_id, amount, tx_type, booking_id, description).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Debit a wallet and append the matching ledger row.
    ///
    /// # Errors
    ///
    /// * `WalletError::InsufficientBalance` - Amount exceeds the balance
    /// * `WalletError::InvalidAmount` - Amount is not positive
    /// * `WalletError::DirectionMismatch` - `tx_type` is not a debit type
    pub async fn debit(
        &self,
        user_id: UserId,
        amount: Money,
        tx_type: TransactionType,
        booking_id: Option<BookingId>,
        description: &str,
    ) -> WalletResult<WalletTransaction> {
        let mut tx = self.pool.begin().await?;
        let entry =
            Self::debit_in_tx(&mut tx, user_id, amount, tx_type, booking_id, description).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Add funds to a wallet (external top-up already settled upstream).
    pub async fn top_up(
        &self,
        user_id: UserId,
        amount: Money,
        description: &str,
    ) -> WalletResult<WalletTransaction> {
        self.credit(user_id, amount, TransactionType::TopUp, None, description)
            .await
    }

    /// Withdraw funds from a wallet.
    pub async fn withdraw(
        &self,
        user_id: UserId,
        amount: Money,
        description: &str,
    ) -> WalletResult<WalletTransaction> {
        self.debit(
            user_id,
            amount,
            TransactionType::Withdrawal,
            None,
            description,
        )
        .await
    }

    /// Credit a wallet inside a caller-owned transaction.
    ///
    /// Used by the booking lifecycle so a refund and the booking state change
    /// commit as one unit.
    pub(crate) async fn credit_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        amount: Money,
        tx_type: TransactionType,
        booking_id: Option<BookingId>,
        description: &str,
    ) -> WalletResult<WalletTransaction> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }
        if !tx_type.is_credit() {
            return Err(WalletError::DirectionMismatch(tx_type));
        }

        let balance_before = Self::lock_balance(tx, user_id).await?;
        let balance_after = balance_before
            .checked_add(amount)
            .ok_or(WalletError::BalanceOverflow)?;

        Self::write_balance(tx, user_id, balance_after).await?;
        Self::append_entry(
            tx,
            user_id,
            tx_type,
            amount,
            balance_before,
            balance_after,
            booking_id,
            description,
        )
        .await
    }

    /// Debit a wallet inside a caller-owned transaction.
    ///
    /// Used by the booking lifecycle so a payment and the booking state
    /// change commit as one unit. Fails without touching anything when the
    /// balance does not cover the amount.
    pub(crate) async fn debit_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        amount: Money,
        tx_type: TransactionType,
        booking_id: Option<BookingId>,
        description: &str,
    ) -> WalletResult<WalletTransaction> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }
        if tx_type.is_credit() {
            return Err(WalletError::DirectionMismatch(tx_type));
        }

        let balance_before = Self::lock_balance(tx, user_id).await?;
        if balance_before < amount {
            return Err(WalletError::InsufficientBalance {
                available: balance_before,
                required: amount,
            });
        }
        let balance_after = balance_before - amount;

        Self::write_balance(tx, user_id, balance_after).await?;
        Self::append_entry(
            tx,
            user_id,
            tx_type,
            amount,
            balance_before,
            balance_after,
            booking_id,
            description,
        )
        .await
    }

    /// Read the current balance under a row lock.
    async fn lock_balance(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
    ) -> WalletResult<Money> {
        let row = sqlx::query("SELECT balance FROM wallets WHERE user_id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(WalletError::WalletNotFound(user_id))?;

        Ok(row.get("balance"))
    }

    async fn write_balance(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        new_balance: Money,
    ) -> WalletResult<()> {
        sqlx::query("UPDATE wallets SET balance = $1, updated_at = NOW() WHERE user_id = $2")
            .bind(new_balance)
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn append_entry(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        tx_type: TransactionType,
        amount: Money,
        balance_before: Money,
        balance_after: Money,
        booking_id: Option<BookingId>,
        description: &str,
    ) -> WalletResult<WalletTransaction> {
        let row = sqlx::query(
            r#"
            INSERT INTO wallet_transactions
                (user_id, tx_type, amount, balance_before, balance_after, booking_id, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, created_at
            "#,
        )
        .bind(user_id)
        .bind(tx_type.as_str())
        .bind(amount)
        .bind(balance_before)
        .bind(balance_after)
        .bind(booking_id)
        .bind(description)
        .fetch_one(&mut **tx)
        .await?;

        Ok(WalletTransaction {
            id: row.get("id"),
            user_id,
            tx_type,
            amount,
            balance_before,
            balance_after,
            booking_id,
            description: Some(description.to_string()),
            created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        })
    }

    /// Get ledger rows for a user, most recent first.
    pub async fn list_transactions(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> WalletResult<Vec<WalletTransaction>> {
        let rows = with_default_timeout(
            sqlx::query(
                r#"
                SELECT id, user_id, tx_type, amount, balance_before, balance_after,
                       booking_id, description, created_at
                FROM wallet_transactions
                WHERE user_id = $1
                ORDER BY id DESC
                LIMIT $2
                "#,
            )
            .bind(user_id)
            .bind(limit)
            .fetch_all(self.pool.as_ref()),
        )
        .await
        .map_err(|e| match e {
            TimeoutError::Database(e) => WalletError::Database(e),
            TimeoutError::Timeout(d) => WalletError::QueryTimeout(d),
        })?;

        Ok(rows.iter().map(Self::entry_from_row).collect())
    }

    /// Replay the full ledger for a user and check it against the stored
    /// balance.
    ///
    /// Returns the replayed balance on success. A mismatch means the
    /// atomicity contract was violated somewhere and is logged at `error`.
    pub async fn verify_ledger(&self, user_id: UserId) -> WalletResult<Money> {
        let wallet = self.get_wallet(user_id).await?;
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, tx_type, amount, balance_before, balance_after,
                   booking_id, description, created_at
            FROM wallet_transactions
            WHERE user_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        let entries: Vec<WalletTransaction> = rows.iter().map(Self::entry_from_row).collect();
        let replayed = replay_ledger(user_id, &entries)?;

        if replayed != wallet.balance {
            log::error!(
                "Wallet {user_id} balance {} does not match ledger replay {replayed}",
                wallet.balance
            );
            return Err(WalletError::LedgerMismatch {
                user_id,
                transaction_id: entries.last().map_or(0, |e| e.id),
                expected: wallet.balance,
                actual: replayed,
            });
        }

        Ok(replayed)
    }

    fn wallet_from_row(row: &sqlx::postgres::PgRow) -> Wallet {
        Wallet {
            user_id: row.get("user_id"),
            balance: row.get("balance"),
            created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
            updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
        }
    }

    fn entry_from_row(row: &sqlx::postgres::PgRow) -> WalletTransaction {
        WalletTransaction {
            id: row.get("id"),
            user_id: row.get("user_id"),
            tx_type: TransactionType::parse(&row.get::<String, _>("tx_type"))
                .unwrap_or(TransactionType::Payment),
            amount: row.get("amount"),
            balance_before: row.get("balance_before"),
            balance_after: row.get("balance_after"),
            booking_id: row.get("booking_id"),
            description: row.get("description"),
            created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        }
    }
}

/// Replay ledger rows in order, starting from zero, checking the
/// `balance_before`/`balance_after` pairing of every row.
///
/// Returns the final balance, which must equal the wallet's stored balance.
pub fn replay_ledger(user_id: UserId, entries: &[WalletTransaction]) -> WalletResult<Money> {
    let mut running: Money = 0;
    for entry in entries {
        if entry.balance_before != running {
            return Err(WalletError::LedgerMismatch {
                user_id,
                transaction_id: entry.id,
                expected: running,
                actual: entry.balance_before,
            });
        }
        let next = running + entry.tx_type.signed(entry.amount);
        if entry.balance_after != next || next < 0 {
            return Err(WalletError::LedgerMismatch {
                user_id,
                transaction_id: entry.id,
                expected: next,
                actual: entry.balance_after,
            });
        }
        running = next;
    }
    Ok(running)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn entry(
        id: i64,
        tx_type: TransactionType,
        amount: Money,
        before: Money,
        after: Money,
    ) -> WalletTransaction {
        WalletTransaction {
            id,
            user_id: 1,
            tx_type,
            amount,
            balance_before: before,
            balance_after: after,
            booking_id: None,
            description: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn replay_reproduces_balance() {
        let ledger = vec![
            entry(1, TransactionType::TopUp, 500_000, 0, 500_000),
            entry(2, TransactionType::Payment, 200_000, 500_000, 300_000),
            entry(3, TransactionType::Refund, 100_000, 300_000, 400_000),
            entry(4, TransactionType::Withdrawal, 150_000, 400_000, 250_000),
        ];
        assert_eq!(replay_ledger(1, &ledger).unwrap(), 250_000);
    }

    #[test]
    fn replay_rejects_gap_in_chain() {
        let ledger = vec![
            entry(1, TransactionType::TopUp, 500_000, 0, 500_000),
            // balance_before skips ahead; a row is missing or was mispaired
            entry(2, TransactionType::Payment, 100_000, 600_000, 500_000),
        ];
        let err = replay_ledger(1, &ledger).unwrap_err();
        assert!(matches!(
            err,
            WalletError::LedgerMismatch {
                transaction_id: 2,
                ..
            }
        ));
    }

    #[test]
    fn replay_rejects_bad_after_balance() {
        let ledger = vec![entry(1, TransactionType::TopUp, 500_000, 0, 400_000)];
        assert!(replay_ledger(1, &ledger).is_err());
    }

    #[test]
    fn replay_rejects_negative_running_balance() {
        // A withdrawal larger than the running balance can never be a valid row.
        let ledger = vec![
            entry(1, TransactionType::TopUp, 100, 0, 100),
            entry(2, TransactionType::Withdrawal, 200, 100, -100),
        ];
        assert!(replay_ledger(1, &ledger).is_err());
    }

    #[test]
    fn replay_of_empty_ledger_is_zero() {
        assert_eq!(replay_ledger(1, &[]).unwrap(), 0);
    }

    proptest! {
        /// Any ledger built by applying signed deltas in order replays to the
        /// final running balance.
        #[test]
        fn replay_matches_construction(ops in prop::collection::vec((0u8..4, 1i64..10_000), 0..40)) {
            let mut running: Money = 0;
            let mut ledger = Vec::new();
            let mut id = 0;
            for (kind, amount) in ops {
                let tx_type = match kind {
                    0 => TransactionType::TopUp,
                    1 => TransactionType::Refund,
                    2 => TransactionType::Payment,
                    _ => TransactionType::Withdrawal,
                };
                // Skip debits the balance cannot cover, as the manager would.
                if !tx_type.is_credit() && running < amount {
                    continue;
                }
                let before = running;
                running += tx_type.signed(amount);
                id += 1;
                ledger.push(entry(id, tx_type, amount, before, running));
            }
            prop_assert_eq!(replay_ledger(1, &ledger).unwrap(), running);
            prop_assert!(running >= 0);
        }
    }
}
