//! # Court Booking
//!
//! A reservation engine for sports venues: court scheduling, time-windowed
//! pricing, prepaid wallets with an append-only ledger, and staff overrides.
//!
//! The engine is the single writer of booking and wallet state. Every
//! transition that touches both a booking row and a wallet commits in one
//! database transaction, and the check-then-create race on a slot is closed
//! by a per-court row lock.
//!
//! ## Booking lifecycle
//!
//! A booking moves through these states:
//!
//! - **PendingPayment**: slot held while the customer pays (15 minutes by
//!   default; a lapsed hold stops holding at read time)
//! - **Confirmed**: paid, slot reserved
//! - **CheckedIn**: customer arrived inside the check-in window
//! - **Completed**: session finished
//! - **Cancelled / CancelledLate**: released by the customer or staff, with
//!   a tiered refund against the paid amount
//! - **Expired**: a payment hold that lapsed
//! - **Blocked**: venue-owned maintenance or private-event rows
//!
//! ## Core Modules
//!
//! - [`booking`]: the lifecycle state machine and its manager
//! - [`pricing`]: time-windowed rules and interval pricing
//! - [`availability`]: half-open overlap tests and conflict queries
//! - [`wallet`]: balances and the append-only transaction ledger
//! - [`recurring`]: weekly/biweekly/monthly schedule generation
//! - [`admin`]: staff force-updates and slot blocks
//!
//! ## Example
//!
//! ```no_run
//! use court_booking::booking::{ActorType, BookingManager, BookingOwner, NewBooking};
//! use court_booking::db::{Database, DatabaseConfig};
//! use chrono::{Duration, Utc};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&DatabaseConfig::from_env()).await?;
//!     let bookings = BookingManager::new(Arc::new(db.pool().clone()));
//!
//!     let start = (Utc::now() + Duration::days(1))
//!         .date_naive()
//!         .and_hms_opt(18, 0, 0)
//!         .expect("valid time")
//!         .and_utc();
//!     let booking = bookings
//!         .create(NewBooking {
//!             court_id: 1,
//!             owner: BookingOwner::User(42),
//!             start_time: start,
//!             end_time: start + Duration::hours(1),
//!             payment_method: None,
//!             created_by: ActorType::Customer,
//!             recurrence: None,
//!         })
//!         .await?;
//!     println!("Booked {}", booking.booking_code);
//!     Ok(())
//! }
//! ```

/// Staff overrides: force updates and slot blocks.
pub mod admin;
/// Slot availability checks.
pub mod availability;
/// Booking lifecycle state machine.
pub mod booking;
/// Court catalog.
pub mod courts;
/// Connection pooling and query utilities.
pub mod db;
/// Domain events emitted after committed transitions.
pub mod events;
/// Time-windowed pricing rules and quoting.
pub mod pricing;
/// Recurring schedule generation.
pub mod recurring;
/// Prepaid wallets and the transaction ledger.
pub mod wallet;

pub use admin::{AdminOverrideService, ForceUpdate, OverrideOptions};
pub use availability::AvailabilityChecker;
pub use booking::{
    Booking, BookingConfig, BookingError, BookingManager, BookingOwner, BookingStatus,
};
pub use courts::{Court, CourtManager};
pub use db::{Database, DatabaseConfig};
pub use events::{DomainEvent, EventSink, LogEventSink};
pub use pricing::{PriceQuote, PricingManager, PricingRule};
pub use recurring::{RecurrencePattern, RecurringManager};
pub use wallet::{Money, Wallet, WalletManager, WalletTransaction};
