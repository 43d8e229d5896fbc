//! Slot availability: half-open overlap tests and conflict queries.
//!
//! A booking holds its slot while PENDING_PAYMENT (and not past its payment
//! deadline), CONFIRMED, CHECKED_IN, or BLOCKED. Expiry is evaluated at read
//! time: a stale PENDING_PAYMENT row past `expires_at` never conflicts, even
//! before the sweep job flips its stored status.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use crate::booking::{BOOKING_COLUMNS, Booking, BookingId, BookingStatus};
use crate::courts::CourtId;

/// Half-open interval overlap: `[a_start, a_end)` intersects
/// `[b_start, b_end)`. Exact abutment is not an overlap.
pub fn intervals_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Whether a booking in `status` with payment deadline `expires_at` still
/// reserves its slot at `now`.
pub fn holds_slot(
    status: BookingStatus,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    match status {
        BookingStatus::Confirmed | BookingStatus::CheckedIn | BookingStatus::Blocked => true,
        // A hold without a recorded deadline keeps its slot; only an elapsed
        // deadline releases it.
        BookingStatus::PendingPayment => expires_at.is_none_or(|t| now < t),
        BookingStatus::Completed
        | BookingStatus::Cancelled
        | BookingStatus::CancelledLate
        | BookingStatus::Expired => false,
    }
}

/// Filter an in-memory booking set down to the ones conflicting with
/// `[start, end)` on `court_id` at `now`. Used by recurring preview, which
/// loads one horizon of rows and evaluates many candidate slots against it.
pub fn find_conflicts_in<'a>(
    bookings: &'a [Booking],
    court_id: CourtId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
    excluding: Option<BookingId>,
) -> Vec<&'a Booking> {
    bookings
        .iter()
        .filter(|b| {
            b.court_id == court_id
                && excluding != Some(b.id)
                && b.holds_slot(now)
                && intervals_overlap(b.start_time, b.end_time, start, end)
        })
        .collect()
}

/// Availability checker
///
/// The pool-backed methods answer read-only queries. Writers must not rely
/// on them: the check-then-create race is closed by re-running
/// [`AvailabilityChecker::fetch_conflicts`] inside the creating transaction,
/// under the per-court row lock the booking manager takes.
#[derive(Clone)]
pub struct AvailabilityChecker {
    pool: Arc<PgPool>,
}

impl AvailabilityChecker {
    /// Create a new availability checker
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Whether `[start, end)` on a court is free of holding bookings.
    pub async fn is_free(
        &self,
        court_id: CourtId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        excluding: Option<BookingId>,
    ) -> sqlx::Result<bool> {
        let conflicts = self.find_conflicts(court_id, start, end, excluding).await?;
        Ok(conflicts.is_empty())
    }

    /// The holding bookings that overlap `[start, end)` on a court.
    pub async fn find_conflicts(
        &self,
        court_id: CourtId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        excluding: Option<BookingId>,
    ) -> sqlx::Result<Vec<Booking>> {
        Self::fetch_conflicts(self.pool.as_ref(), court_id, start, end, excluding, Utc::now())
            .await
    }

    /// Conflict query against any executor, so callers holding a transaction
    /// can check and insert atomically.
    pub(crate) async fn fetch_conflicts<'e, E>(
        executor: E,
        court_id: CourtId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        excluding: Option<BookingId>,
        now: DateTime<Utc>,
    ) -> sqlx::Result<Vec<Booking>>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE court_id = $1
              AND start_time < $3
              AND end_time > $2
              AND ($4::BIGINT IS NULL OR id <> $4)
              AND (status IN ('confirmed', 'checked_in', 'blocked')
                   OR (status = 'pending_payment'
                       AND (expires_at IS NULL OR expires_at > $5)))
            ORDER BY start_time
            "#
        ))
        .bind(court_id)
        .bind(start.naive_utc())
        .bind(end.naive_utc())
        .bind(excluding)
        .bind(now.naive_utc())
        .fetch_all(executor)
        .await?;

        Ok(rows.iter().map(Booking::from_pg_row).collect())
    }

    /// All bookings that hold any slot on a court inside `[from, to)` at
    /// `now`. One query per recurring preview horizon.
    pub(crate) async fn holding_in_range(
        &self,
        court_id: CourtId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> sqlx::Result<Vec<Booking>> {
        Self::fetch_conflicts(self.pool.as_ref(), court_id, from, to, None, now).await
    }
}
