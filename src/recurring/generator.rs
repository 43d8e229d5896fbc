//! Recurring booking generation.
//!
//! A batch driver over the single-booking lifecycle: each occurrence goes
//! through the same atomic create (and the same wallet settlement when the
//! method is wallet-immediate). A conflicting occurrence is recorded and
//! skipped, never aborting the batch; only validation, configuration, and
//! infrastructure failures abort.

use chrono::{DateTime, Datelike, Utc};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use uuid::Uuid;

use super::models::{
    GroupCancelOutcome, OccurrenceSlot, RecurrencePattern, RecurringPreview, RecurringRequest,
    RecurringResult, SkippedOccurrence,
};
use crate::availability::{AvailabilityChecker, find_conflicts_in};
use crate::booking::{BookingError, BookingId, BookingManager, BookingResult, NewBooking, Recurrence};
use crate::wallet::WalletError;

/// Most occurrences one request may generate (one year of weekly slots).
pub const MAX_OCCURRENCES: u32 = 52;

/// Per-occurrence outcomes the batch records and moves past: the slot is
/// taken, or a wallet-immediate occurrence cannot be covered. Anything else
/// aborts the batch.
fn is_skippable(e: &BookingError) -> bool {
    matches!(
        e,
        BookingError::SlotUnavailable { .. }
            | BookingError::Wallet(WalletError::InsufficientBalance { .. })
    )
}

/// Expand the concrete occurrence intervals of a schedule, preserving the
/// first occurrence's time of day and duration.
pub fn occurrence_dates(
    first_start: DateTime<Utc>,
    first_end: DateTime<Utc>,
    pattern: RecurrencePattern,
    occurrences: u32,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let duration = first_end - first_start;
    let mut dates = Vec::with_capacity(occurrences as usize);
    for n in 0..occurrences {
        let Some(start) = pattern.nth_occurrence(first_start, n) else {
            break;
        };
        dates.push((start, start + duration));
    }
    dates
}

/// Recurring booking manager
#[derive(Clone)]
pub struct RecurringManager {
    pool: Arc<PgPool>,
    bookings: BookingManager,
    checker: AvailabilityChecker,
}

impl RecurringManager {
    /// Create a new recurring booking manager
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            bookings: BookingManager::new(pool.clone()),
            checker: AvailabilityChecker::new(pool.clone()),
            pool,
        }
    }

    /// Share a configured booking manager instead of a default one.
    pub fn with_booking_manager(mut self, bookings: BookingManager) -> Self {
        self.bookings = bookings;
        self
    }

    /// Generate a recurring schedule.
    ///
    /// Creates up to `occurrences` bookings sharing one group id, pattern,
    /// and day of week. Occurrences that conflict (or that the wallet cannot
    /// cover, for wallet-immediate requests) are skipped with a reason and
    /// generation continues.
    pub async fn generate(&self, req: RecurringRequest) -> BookingResult<RecurringResult> {
        if req.occurrences == 0 || req.occurrences > MAX_OCCURRENCES {
            return Err(BookingError::InvalidOccurrenceCount {
                requested: req.occurrences,
                max: MAX_OCCURRENCES,
            });
        }

        let group_id = Uuid::new_v4();
        let recurrence = Recurrence {
            group_id,
            pattern: req.pattern,
            day_of_week: req.first_start.weekday().num_days_from_sunday() as i16,
        };

        let mut created = Vec::new();
        let mut skipped = Vec::new();
        for (start, end) in
            occurrence_dates(req.first_start, req.first_end, req.pattern, req.occurrences)
        {
            let attempt = self
                .bookings
                .create(NewBooking {
                    court_id: req.court_id,
                    owner: req.owner.clone(),
                    start_time: start,
                    end_time: end,
                    payment_method: req.payment_method,
                    created_by: req.created_by,
                    recurrence: Some(recurrence),
                })
                .await;

            match attempt {
                Ok(booking) => created.push(booking),
                // Expected per-occurrence outcomes: collect and continue.
                Err(e) if is_skippable(&e) => {
                    skipped.push(SkippedOccurrence {
                        start_time: start,
                        reason: e.to_string(),
                    });
                }
                // Fatal: earlier occurrences are already committed in their
                // own transactions. Hand them back with the group id rather
                // than orphaning them.
                Err(e) => {
                    log::error!(
                        "Recurring group {group_id} aborted at {start} after {} created: {e}",
                        created.len()
                    );
                    return Err(BookingError::RecurringAborted {
                        group_id,
                        created: created.iter().map(|b| b.id).collect(),
                        source: Box::new(e),
                    });
                }
            }
        }

        log::info!(
            "Recurring group {group_id}: created {} of {} occurrences ({} skipped)",
            created.len(),
            req.occurrences,
            skipped.len()
        );

        Ok(RecurringResult {
            group_id,
            created,
            skipped,
        })
    }

    /// Preview a recurring schedule without persisting anything.
    ///
    /// Loads the court's holding bookings once for the whole horizon and
    /// evaluates each would-be occurrence against them in memory.
    pub async fn preview(&self, req: &RecurringRequest) -> BookingResult<RecurringPreview> {
        if req.occurrences == 0 || req.occurrences > MAX_OCCURRENCES {
            return Err(BookingError::InvalidOccurrenceCount {
                requested: req.occurrences,
                max: MAX_OCCURRENCES,
            });
        }

        let dates = occurrence_dates(req.first_start, req.first_end, req.pattern, req.occurrences);
        let Some((horizon_start, _)) = dates.first().copied() else {
            return Ok(RecurringPreview {
                slots: Vec::new(),
                available: 0,
                conflicting: 0,
            });
        };
        let horizon_end = dates.last().map_or(req.first_end, |(_, end)| *end);

        let now = Utc::now();
        let holding = self
            .checker
            .holding_in_range(req.court_id, horizon_start, horizon_end, now)
            .await?;

        let slots: Vec<OccurrenceSlot> = dates
            .into_iter()
            .map(|(start, end)| {
                let conflicts =
                    find_conflicts_in(&holding, req.court_id, start, end, now, None).len();
                OccurrenceSlot {
                    start_time: start,
                    end_time: end,
                    available: conflicts == 0,
                    conflicts,
                }
            })
            .collect();

        let available = slots.iter().filter(|s| s.available).count();
        let conflicting = slots.len() - available;
        Ok(RecurringPreview {
            slots,
            available,
            conflicting,
        })
    }

    /// Cancel every member of a recurrence group.
    ///
    /// Applies the normal cancel (with its refund policy) per member and
    /// aggregates failures instead of stopping at the first one.
    pub async fn cancel_group(
        &self,
        group_id: Uuid,
        now: DateTime<Utc>,
    ) -> BookingResult<GroupCancelOutcome> {
        let rows = sqlx::query(
            "SELECT id FROM bookings WHERE recurrence_group_id = $1 ORDER BY start_time",
        )
        .bind(group_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        let mut outcome = GroupCancelOutcome::default();
        for row in rows {
            let id: BookingId = row.get("id");
            match self.bookings.cancel(id, now).await {
                Ok((_, refund)) => outcome.cancelled.push((id, refund)),
                Err(e) => outcome.failed.push((id, e.to_string())),
            }
        }

        Ok(outcome)
    }
}
