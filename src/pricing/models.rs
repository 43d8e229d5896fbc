//! Pricing rule data models.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::courts::CourtId;
use crate::wallet::Money;

/// Pricing rule ID type
pub type RuleId = i64;

/// Number of minutes in a day; rule windows end at or before this.
pub const MINUTES_PER_DAY: i32 = 24 * 60;

/// A pricing rule.
///
/// Rules may overlap freely; the resolver picks a winner per time slice by
/// priority (see [`super::resolver`]). Scopes are optional: a `None` court
/// applies to all courts, a `None` day of week applies to every day.
/// The time window is half-open `[start_minute, end_minute)` in venue-local
/// minutes since midnight, `end_minute` up to 1440.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingRule {
    pub id: RuleId,
    pub court_id: Option<CourtId>,
    /// 0 = Sunday .. 6 = Saturday
    pub day_of_week: Option<i16>,
    pub start_minute: i32,
    pub end_minute: i32,
    pub price_per_hour: Money,
    pub priority: i32,
    pub is_active: bool,
}

impl PricingRule {
    /// Whether this rule applies to the given court and day of week.
    pub fn matches_scope(&self, court_id: CourtId, day_of_week: i16) -> bool {
        self.court_id.is_none_or(|c| c == court_id)
            && self.day_of_week.is_none_or(|d| d == day_of_week)
    }

    /// Whether the rule's time window covers a venue-local minute of day.
    pub fn covers_minute(&self, minute: i32) -> bool {
        self.start_minute <= minute && minute < self.end_minute
    }

    /// Scope specificity used to break priority ties: a court-scoped rule
    /// beats a global one, then a day-scoped rule beats an every-day one.
    pub fn specificity(&self) -> u8 {
        (self.court_id.is_some() as u8) * 2 + self.day_of_week.is_some() as u8
    }
}

/// One constant-price slice of a quoted interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSegment {
    /// Venue-local slice start.
    pub start: NaiveDateTime,
    /// Venue-local slice end (exclusive).
    pub end: NaiveDateTime,
    /// The winning rule for this slice.
    pub rule_id: RuleId,
    pub price_per_hour: Money,
    /// `price_per_hour × slice minutes / 60`, rounded down.
    pub price: Money,
}

/// A resolved price for a full interval: a schedule of constant-price
/// segments whose durations sum to the interval, plus their total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub segments: Vec<PriceSegment>,
    pub total: Money,
}
