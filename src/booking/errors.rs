//! Booking lifecycle error types.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::models::{BookingId, BookingStatus};
use crate::courts::CourtId;
use crate::pricing::PricingError;
use crate::wallet::WalletError;

/// Booking errors
#[derive(Debug, Error)]
pub enum BookingError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Booking not found
    #[error("Booking not found: {0}")]
    NotFound(BookingId),

    /// Booking code not found
    #[error("Booking code not found: {0}")]
    CodeNotFound(String),

    /// Court not found
    #[error("Court not found: {0}")]
    CourtNotFound(CourtId),

    /// Court is not accepting reservations
    #[error("Court is inactive: {0}")]
    CourtInactive(CourtId),

    /// Interval fails validation before any side effect
    #[error("Invalid interval: {0}")]
    InvalidInterval(&'static str),

    /// The slot is held by other bookings
    #[error("Slot is not available: {conflicts} conflicting booking(s)")]
    SlotUnavailable { conflicts: usize },

    /// Pricing failed (missing rule coverage is a configuration error)
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// Wallet operation failed (insufficient balance is retryable after a
    /// top-up; the booking stays in its prior state)
    #[error(transparent)]
    Wallet(#[from] WalletError),

    /// The state machine forbids this transition
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    /// The payment hold lapsed before payment arrived
    #[error("Payment hold expired at {0}")]
    HoldExpired(DateTime<Utc>),

    /// Check-in attempted outside the allowed window
    #[error("Check-in window is {opens_at} to {closes_at}")]
    OutsideCheckInWindow {
        opens_at: DateTime<Utc>,
        closes_at: DateTime<Utc>,
    },

    /// Wallet payment needs a registered owner
    #[error("Wallet payment requires a registered user")]
    WalletRequiresUser,

    /// Customer bookings need a user or guest owner
    #[error("Booking requires a user or guest owner")]
    OwnerRequired,

    /// Booking is already settled
    #[error("Booking is already paid")]
    AlreadyPaid,

    /// Occurrence count outside the accepted range
    #[error("Occurrence count {requested} outside 1..={max}")]
    InvalidOccurrenceCount { requested: u32, max: u32 },

    /// A recurring batch hit a fatal error after earlier occurrences had
    /// already committed. Carries the group id and the bookings that exist
    /// so the caller can keep or cancel them by group.
    #[error("Recurring group {group_id} aborted after {} booking(s): {source}", created.len())]
    RecurringAborted {
        group_id: Uuid,
        created: Vec<BookingId>,
        source: Box<BookingError>,
    },

    /// Query timed out
    #[error("Query timed out after {0:?}")]
    QueryTimeout(std::time::Duration),
}

impl BookingError {
    /// Get a client-safe error message that doesn't leak internals.
    pub fn client_message(&self) -> String {
        match self {
            BookingError::Database(_) | BookingError::QueryTimeout(_) => {
                "Internal server error".to_string()
            }
            BookingError::Pricing(PricingError::Database(_)) => "Internal server error".to_string(),
            // Missing rule coverage is admin misconfiguration, not user error.
            BookingError::Pricing(PricingError::NoRuleCovers { .. }) => {
                "This time cannot be priced yet".to_string()
            }
            BookingError::Wallet(e) => e.client_message(),
            BookingError::RecurringAborted { source, .. } => source.client_message(),
            _ => self.to_string(),
        }
    }
}

/// Result type for booking operations
pub type BookingResult<T> = Result<T, BookingError>;
