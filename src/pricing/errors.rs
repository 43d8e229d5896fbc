//! Pricing error types.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::courts::CourtId;

/// Pricing errors
#[derive(Debug, Error)]
pub enum PricingError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No active rule covers part of the interval. Missing admin setup,
    /// fatal for the request being priced.
    #[error("No active pricing rule covers court {court_id} at {at}")]
    NoRuleCovers { court_id: CourtId, at: NaiveDateTime },

    /// Interval is empty or inverted
    #[error("Cannot price an empty interval")]
    EmptyInterval,
}

/// Result type for pricing operations
pub type PricingResult<T> = Result<T, PricingError>;
