//! Recurring booking data models.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::{ActorType, Booking, BookingId, BookingOwner, PaymentMethod};
use crate::courts::CourtId;
use crate::wallet::Money;

/// Recurrence pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePattern {
    Weekly,
    Biweekly,
    Monthly,
}

impl RecurrencePattern {
    /// Stable string form used for the `recurrence_pattern` database column.
    pub fn as_str(self) -> &'static str {
        match self {
            RecurrencePattern::Weekly => "weekly",
            RecurrencePattern::Biweekly => "biweekly",
            RecurrencePattern::Monthly => "monthly",
        }
    }

    /// Parse the database string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "weekly" => Some(RecurrencePattern::Weekly),
            "biweekly" => Some(RecurrencePattern::Biweekly),
            "monthly" => Some(RecurrencePattern::Monthly),
            _ => None,
        }
    }

    /// The `n`-th occurrence start counted from `first` (n = 0 is `first`),
    /// preserving time of day. Monthly steps follow the calendar; a day the
    /// target month lacks clamps to its last day (Jan 31 → Feb 28).
    pub fn nth_occurrence(self, first: DateTime<Utc>, n: u32) -> Option<DateTime<Utc>> {
        match self {
            RecurrencePattern::Weekly => first.checked_add_signed(Duration::weeks(i64::from(n))),
            RecurrencePattern::Biweekly => {
                first.checked_add_signed(Duration::weeks(2 * i64::from(n)))
            }
            RecurrencePattern::Monthly => first.checked_add_months(Months::new(n)),
        }
    }
}

impl std::fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recurring schedule request.
#[derive(Debug, Clone)]
pub struct RecurringRequest {
    pub court_id: CourtId,
    pub owner: BookingOwner,
    /// First occurrence interval; later occurrences keep its time of day
    /// and duration.
    pub first_start: DateTime<Utc>,
    pub first_end: DateTime<Utc>,
    pub pattern: RecurrencePattern,
    pub occurrences: u32,
    pub payment_method: Option<PaymentMethod>,
    pub created_by: ActorType,
}

/// An occurrence the generator could not book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedOccurrence {
    pub start_time: DateTime<Utc>,
    pub reason: String,
}

/// Outcome of a recurring generation: partial fulfillment, never
/// all-or-nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringResult {
    pub group_id: Uuid,
    pub created: Vec<Booking>,
    pub skipped: Vec<SkippedOccurrence>,
}

/// One would-be occurrence in a preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccurrenceSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub available: bool,
    pub conflicts: usize,
}

/// Preview of a recurring schedule; nothing is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringPreview {
    pub slots: Vec<OccurrenceSlot>,
    pub available: usize,
    pub conflicting: usize,
}

/// Aggregated outcome of a group-level cancel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupCancelOutcome {
    /// Cancelled members with their refund amounts.
    pub cancelled: Vec<(BookingId, Money)>,
    /// Members that could not be cancelled, with the reason.
    pub failed: Vec<(BookingId, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn pattern_roundtrips_through_db_strings() {
        for p in [
            RecurrencePattern::Weekly,
            RecurrencePattern::Biweekly,
            RecurrencePattern::Monthly,
        ] {
            assert_eq!(RecurrencePattern::parse(p.as_str()), Some(p));
        }
        assert_eq!(RecurrencePattern::parse("fortnightly"), None);
    }

    #[test]
    fn monthly_clamps_to_short_months() {
        let first = Utc.with_ymd_and_hms(2026, 1, 31, 19, 0, 0).unwrap();
        let second = RecurrencePattern::Monthly.nth_occurrence(first, 1).unwrap();
        assert_eq!(second, Utc.with_ymd_and_hms(2026, 2, 28, 19, 0, 0).unwrap());
        // Time of day survives the clamp.
        let third = RecurrencePattern::Monthly.nth_occurrence(first, 2).unwrap();
        assert_eq!(third, Utc.with_ymd_and_hms(2026, 3, 31, 19, 0, 0).unwrap());
    }
}
