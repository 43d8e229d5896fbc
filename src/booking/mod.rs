//! Booking module: the reservation lifecycle state machine.
//!
//! This module implements:
//! - Creation with atomic check-then-create (per-court row lock)
//! - Payment holds with read-time expiry (15 minutes by default)
//! - Wallet settlement committing booking and ledger writes as one unit
//! - Tiered cancellation refunds (24h/12h bands against the paid amount)
//! - Check-in windows and early completion
//!
//! ## Example
//!
//! ```no_run
//! use court_booking::booking::{ActorType, BookingManager, BookingOwner, NewBooking};
//! use court_booking::db::Database;
//! use chrono::{Duration, Utc};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
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
//!     println!("Hold {} expires at {:?}", booking.booking_code, booking.expires_at);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod errors;
pub mod manager;
pub mod models;
pub mod policy;

pub use config::BookingConfig;
pub use errors::{BookingError, BookingResult};
pub use manager::BookingManager;
pub use models::{
    ActorType, Booking, BookingId, BookingOwner, BookingStatus, NewBooking, PaymentMethod,
    PaymentStatus, Recurrence,
};
pub(crate) use models::BOOKING_COLUMNS;
