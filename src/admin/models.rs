//! Admin override data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::booking::{Booking, BookingId, BookingStatus};
use crate::courts::CourtId;
use crate::wallet::{Money, WalletTransaction};

/// A partial rewrite of a booking. Unset fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct ForceUpdate {
    pub court_id: Option<CourtId>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Direct status assignment, bypassing the lifecycle transition chart.
    pub status: Option<BookingStatus>,
}

impl ForceUpdate {
    /// Whether the update moves the booking to a different slot.
    pub fn reschedules(&self) -> bool {
        self.court_id.is_some() || self.start_time.is_some() || self.end_time.is_some()
    }
}

/// Knobs controlling how a force-update handles conflicts and money.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverrideOptions {
    /// Cancel conflicting bookings instead of failing on them.
    pub force_overwrite: bool,
    /// Re-price the booking for its new interval and court.
    pub recalculate_price: bool,
    /// Credit a price decrease back to the owner's wallet.
    pub refund_to_wallet: bool,
    /// Debit a price increase from the owner's wallet.
    pub charge_extra_to_wallet: bool,
}

/// What a force-update did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUpdateResult {
    pub booking: Booking,
    /// New total minus old total. Reported even when no wallet settlement
    /// was requested, so the desk can collect or return the difference.
    pub price_change: Money,
    /// The wallet ledger row written for the settlement, when one was.
    pub settled: Option<WalletTransaction>,
    /// Bookings cancelled to make room.
    pub overwritten: Vec<BookingId>,
}
