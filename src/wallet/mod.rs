//! Wallet module providing per-user balances with an append-only ledger.
//!
//! This module implements:
//! - One wallet per registered user, balance never negative
//! - Append-only transaction rows recording `balance_before`/`balance_after`
//! - ACID-compliant debits and credits (row lock + ledger row in one
//!   database transaction)
//! - Crate-internal `*_in_tx` variants so booking operations that move money
//!   commit booking and wallet writes as a single unit
//! - Ledger replay verification (replaying all rows from zero must reproduce
//!   the stored balance)
//!
//! ## Example
//!
//! ```no_run
//! use court_booking::wallet::WalletManager;
//! use court_booking::db::Database;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let wallet = WalletManager::new(Arc::new(db.pool().clone()));
//!
//!     let entry = wallet.top_up(1, 500_000, "Counter top-up").await?;
//!     println!("New balance: {}", entry.balance_after);
//!
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{WalletError, WalletResult};
pub use manager::{WalletManager, replay_ledger};
pub use models::{Money, TransactionId, TransactionType, UserId, Wallet, WalletTransaction};
