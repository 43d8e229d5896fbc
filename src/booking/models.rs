//! Booking data models and the status state chart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::courts::CourtId;
use crate::recurring::RecurrencePattern;
use crate::wallet::{Money, UserId};

/// Booking ID type
pub type BookingId = i64;

/// Booking status state machine:
///
/// ```text
/// PENDING_PAYMENT ─→ CONFIRMED ─→ CHECKED_IN ─→ COMPLETED
///        │  │            │  │
///        │  └→ EXPIRED   │  └→ CANCELLED_LATE
///        └→ CANCELLED ←──┘
/// ```
///
/// COMPLETED, CANCELLED, CANCELLED_LATE, and EXPIRED are terminal. BLOCKED
/// rows sit outside the chart entirely: maintenance holds are created
/// directly in that state and released only by the admin override paths,
/// never by the customer-facing lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    PendingPayment,
    Confirmed,
    CheckedIn,
    Completed,
    Cancelled,
    CancelledLate,
    Expired,
    Blocked,
}

impl BookingStatus {
    /// Stable string form used for the `status` database column.
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::PendingPayment => "pending_payment",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::CheckedIn => "checked_in",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::CancelledLate => "cancelled_late",
            BookingStatus::Expired => "expired",
            BookingStatus::Blocked => "blocked",
        }
    }

    /// Parse the database string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_payment" => Some(BookingStatus::PendingPayment),
            "confirmed" => Some(BookingStatus::Confirmed),
            "checked_in" => Some(BookingStatus::CheckedIn),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "cancelled_late" => Some(BookingStatus::CancelledLate),
            "expired" => Some(BookingStatus::Expired),
            "blocked" => Some(BookingStatus::Blocked),
            _ => None,
        }
    }

    /// Terminal statuses never change again and never hold a slot.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Completed
                | BookingStatus::Cancelled
                | BookingStatus::CancelledLate
                | BookingStatus::Expired
        )
    }

    /// Whether the normal (non-privileged) lifecycle allows `self → to`.
    pub fn can_transition(self, to: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, to),
            (PendingPayment, Confirmed)
                | (PendingPayment, Expired)
                | (PendingPayment, Cancelled)
                | (PendingPayment, CancelledLate)
                | (Confirmed, CheckedIn)
                | (Confirmed, Cancelled)
                | (Confirmed, CancelledLate)
                | (CheckedIn, Completed)
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Internal wallet; settles inside the engine's own transaction.
    Wallet,
    /// External gateway; the engine only consumes the reduced outcome.
    Gateway,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::Gateway => "gateway",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "wallet" => Some(PaymentMethod::Wallet),
            "gateway" => Some(PaymentMethod::Gateway),
            _ => None,
        }
    }
}

/// Payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unpaid" => Some(PaymentStatus::Unpaid),
            "paid" => Some(PaymentStatus::Paid),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

/// The kind of actor that created a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    Customer,
    Staff,
    Admin,
    System,
}

impl ActorType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActorType::Customer => "customer",
            ActorType::Staff => "staff",
            ActorType::Admin => "admin",
            ActorType::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(ActorType::Customer),
            "staff" => Some(ActorType::Staff),
            "admin" => Some(ActorType::Admin),
            "system" => Some(ActorType::System),
            _ => None,
        }
    }
}

/// Who a booking belongs to. A registered user and a walk-in guest are
/// mutually exclusive; maintenance blocks belong to the venue itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingOwner {
    User(UserId),
    Guest { name: String, phone: String },
    Venue,
}

impl BookingOwner {
    /// The registered user behind this booking, if any. Wallet money only
    /// moves for registered users.
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            BookingOwner::User(id) => Some(*id),
            _ => None,
        }
    }
}

/// Recurrence fields, set together or not at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub group_id: Uuid,
    pub pattern: RecurrencePattern,
    /// 0 = Sunday .. 6 = Saturday, the weekday of the first occurrence.
    pub day_of_week: i16,
}

/// Booking model.
///
/// `total_price` is computed once at creation and frozen; only the admin
/// override path may rewrite it. All intervals are half-open `[start, end)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    /// External-facing unique code (printed on receipts, scanned at the desk).
    pub booking_code: String,
    pub court_id: CourtId,
    pub owner: BookingOwner,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_price: Money,
    pub paid_amount: Money,
    pub status: BookingStatus,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: PaymentStatus,
    /// Payment deadline; only meaningful while PENDING_PAYMENT.
    pub expires_at: Option<DateTime<Utc>>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub recurrence: Option<Recurrence>,
    pub created_by: ActorType,
    /// Set when an admin force-overwrite cancelled this booking.
    pub overwritten: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// The status this booking logically has at `now`. A PENDING_PAYMENT row
    /// past its deadline reads as EXPIRED even before any sweep flips the
    /// stored column (read-time expiry).
    pub fn effective_status(&self, now: DateTime<Utc>) -> BookingStatus {
        if self.status == BookingStatus::PendingPayment
            && self.expires_at.is_some_and(|t| t <= now)
        {
            BookingStatus::Expired
        } else {
            self.status
        }
    }

    /// Whether this booking reserves its slot at `now`.
    pub fn holds_slot(&self, now: DateTime<Utc>) -> bool {
        crate::availability::holds_slot(self.status, self.expires_at, now)
    }

    /// Map a database row (selected with [`BOOKING_COLUMNS`]) to a model.
    pub(crate) fn from_pg_row(row: &PgRow) -> Booking {
        let owner = match (
            row.get::<Option<UserId>, _>("user_id"),
            row.get::<Option<String>, _>("guest_name"),
        ) {
            (Some(user_id), _) => BookingOwner::User(user_id),
            (None, Some(name)) => BookingOwner::Guest {
                name,
                phone: row
                    .get::<Option<String>, _>("guest_phone")
                    .unwrap_or_default(),
            },
            (None, None) => BookingOwner::Venue,
        };

        let recurrence = match (
            row.get::<Option<Uuid>, _>("recurrence_group_id"),
            row.get::<Option<String>, _>("recurrence_pattern"),
            row.get::<Option<i16>, _>("recurrence_day_of_week"),
        ) {
            (Some(group_id), Some(pattern), Some(day_of_week)) => RecurrencePattern::parse(
                &pattern,
            )
            .map(|pattern| Recurrence {
                group_id,
                pattern,
                day_of_week,
            }),
            _ => None,
        };

        Booking {
            id: row.get("id"),
            booking_code: row.get("booking_code"),
            court_id: row.get("court_id"),
            owner,
            start_time: row.get::<chrono::NaiveDateTime, _>("start_time").and_utc(),
            end_time: row.get::<chrono::NaiveDateTime, _>("end_time").and_utc(),
            total_price: row.get("total_price"),
            paid_amount: row.get("paid_amount"),
            // An unknown status string can only come from a newer schema;
            // treat it as terminal so it never phantom-holds a slot.
            status: BookingStatus::parse(&row.get::<String, _>("status"))
                .unwrap_or(BookingStatus::Cancelled),
            payment_method: row
                .get::<Option<String>, _>("payment_method")
                .as_deref()
                .and_then(PaymentMethod::parse),
            payment_status: PaymentStatus::parse(&row.get::<String, _>("payment_status"))
                .unwrap_or(PaymentStatus::Unpaid),
            expires_at: row
                .get::<Option<chrono::NaiveDateTime>, _>("expires_at")
                .map(|t| t.and_utc()),
            checked_in_at: row
                .get::<Option<chrono::NaiveDateTime>, _>("checked_in_at")
                .map(|t| t.and_utc()),
            recurrence,
            created_by: ActorType::parse(&row.get::<String, _>("created_by"))
                .unwrap_or(ActorType::System),
            overwritten: row.get("overwritten"),
            notes: row.get("notes"),
            created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
            updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
        }
    }
}

/// Column list matching [`Booking::from_pg_row`].
pub(crate) const BOOKING_COLUMNS: &str = "id, booking_code, court_id, user_id, guest_name, \
     guest_phone, start_time, end_time, total_price, paid_amount, status, payment_method, \
     payment_status, expires_at, checked_in_at, recurrence_group_id, recurrence_pattern, \
     recurrence_day_of_week, created_by, overwritten, notes, created_at, updated_at";

/// A booking creation request.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub court_id: CourtId,
    pub owner: BookingOwner,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// `Some(Wallet)` settles immediately inside the create transaction and
    /// skips the payment hold entirely.
    pub payment_method: Option<PaymentMethod>,
    pub created_by: ActorType,
    pub recurrence: Option<Recurrence>,
}
