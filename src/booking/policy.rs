//! Cancellation refund policy.
//!
//! A pure function of how far ahead of the booking's start the cancellation
//! happens. Refunds always compute against the amount actually paid, never
//! the booked total: an unpaid hold refunds zero in every tier.

use chrono::{DateTime, Duration, Utc};

use crate::wallet::Money;

/// Cancelling at least this far ahead refunds in full.
pub const FULL_REFUND_HOURS: i64 = 24;

/// Cancelling at least this far ahead (but inside the full-refund window)
/// refunds half.
pub const HALF_REFUND_HOURS: i64 = 12;

/// Refund percentage for cancelling at `now` a booking starting at `start`.
///
/// Bands are inclusive at their lower bound: exactly 24 hours ahead is 100%,
/// exactly 12 hours ahead is 50%.
pub fn refund_percent(start: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let lead = start - now;
    if lead >= Duration::hours(FULL_REFUND_HOURS) {
        100
    } else if lead >= Duration::hours(HALF_REFUND_HOURS) {
        50
    } else {
        0
    }
}

/// The refund for `paid` at `percent`, rounded down.
pub fn refund_amount(paid: Money, percent: u32) -> Money {
    paid * Money::from(percent) / 100
}
