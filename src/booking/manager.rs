//! Booking lifecycle manager.
//!
//! All transitions that touch both the booking row and a wallet run inside a
//! single database transaction; there is no partial "cancelled but refund
//! lost" state. The check-then-create race is closed by a per-court row lock
//! taken for the duration of the create transaction only. Waiting on an
//! external payment gateway never holds a lock; the PENDING_PAYMENT hold
//! with its deadline reserves the slot during that wait.

use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;

use super::{
    config::BookingConfig,
    errors::{BookingError, BookingResult},
    models::{
        BOOKING_COLUMNS, Booking, BookingId, BookingOwner, BookingStatus, NewBooking,
        PaymentMethod, PaymentStatus,
    },
    policy,
};
use crate::availability::AvailabilityChecker;
use crate::courts::CourtId;
use crate::db::timeouts::{TimeoutError, with_default_timeout};
use crate::events::{DomainEvent, EventSink, LogEventSink};
use crate::pricing::PricingManager;
use crate::wallet::{Money, TransactionType, WalletManager};

/// Characters used in booking codes. Ambiguous glyphs (0/O, 1/I) are left
/// out because codes get read over the phone and typed at the desk.
const CODE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate an external-facing booking code.
pub(crate) fn generate_booking_code() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..8)
        .map(|_| CODE_CHARSET[rng.random_range(0..CODE_CHARSET.len())] as char)
        .collect();
    format!("BK-{suffix}")
}

/// Unique constraint backing `bookings.booking_code`.
const BOOKING_CODE_CONSTRAINT: &str = "bookings_booking_code_key";

/// How many create transactions to attempt before giving up on code
/// collisions. At 32^8 codes a second collision in a row means something
/// other than luck is wrong.
const CODE_ATTEMPTS: usize = 3;

/// The insert lost a booking-code uniqueness race; a fresh code in a fresh
/// transaction resolves it.
fn is_code_collision(e: &BookingError) -> bool {
    matches!(
        e,
        BookingError::Database(sqlx::Error::Database(db))
            if db.constraint() == Some(BOOKING_CODE_CONSTRAINT)
    )
}

/// Reject inverted or sub-minute intervals before any side effect.
pub(crate) fn validate_interval(start: DateTime<Utc>, end: DateTime<Utc>) -> BookingResult<()> {
    if end <= start {
        return Err(BookingError::InvalidInterval("end must be after start"));
    }
    let aligned = |t: DateTime<Utc>| t.timestamp() % 60 == 0 && t.timestamp_subsec_nanos() == 0;
    if !aligned(start) || !aligned(end) {
        return Err(BookingError::InvalidInterval(
            "times must fall on whole minutes",
        ));
    }
    Ok(())
}

/// Booking manager
#[derive(Clone)]
pub struct BookingManager {
    pool: Arc<PgPool>,
    pricing: PricingManager,
    config: BookingConfig,
    events: Arc<dyn EventSink>,
}

impl BookingManager {
    /// Create a new booking manager with configuration from the environment.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            pricing: PricingManager::new(pool.clone()),
            config: BookingConfig::from_env(),
            events: Arc::new(LogEventSink),
            pool,
        }
    }

    /// Override the lifecycle configuration.
    pub fn with_config(mut self, config: BookingConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the event sink.
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Create a booking.
    ///
    /// Validates the interval, prices it, then, inside one transaction,
    /// locks the court row, re-checks conflicts, and inserts the booking as
    /// PENDING_PAYMENT with a payment deadline. When the payment method is
    /// the wallet, the debit and confirmation happen in the same transaction
    /// and the hold state is skipped entirely.
    ///
    /// # Errors
    ///
    /// * `BookingError::SlotUnavailable` - Conflicting bookings hold the slot
    /// * `BookingError::Pricing` - No rule covers part of the interval
    /// * `BookingError::Wallet` - Wallet payment with insufficient balance
    pub async fn create(&self, req: NewBooking) -> BookingResult<Booking> {
        validate_interval(req.start_time, req.end_time)?;
        if matches!(req.owner, BookingOwner::Venue) {
            return Err(BookingError::OwnerRequired);
        }
        let wallet_immediate = req.payment_method == Some(PaymentMethod::Wallet);
        if wallet_immediate && req.owner.user_id().is_none() {
            return Err(BookingError::WalletRequiresUser);
        }

        let quote = self
            .pricing
            .quote(req.court_id, req.start_time, req.end_time)
            .await?;

        // A code collision aborts the whole Postgres transaction, so the
        // retry restarts from a fresh one with a fresh code.
        let mut attempt = 1;
        let booking = loop {
            match self.try_create(&req, quote.total, wallet_immediate).await {
                Ok(booking) => break booking,
                Err(e) if is_code_collision(&e) && attempt < CODE_ATTEMPTS => {
                    log::warn!(
                        "Booking code collision on court {} (attempt {attempt}); retrying",
                        req.court_id
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        log::info!(
            "Created booking {} ({}) on court {}",
            booking.id,
            booking.booking_code,
            booking.court_id
        );
        self.events.emit(DomainEvent::BookingCreated {
            booking_id: booking.id,
            booking_code: booking.booking_code.clone(),
        });
        if wallet_immediate {
            self.events.emit(DomainEvent::BookingConfirmed {
                booking_id: booking.id,
            });
        }

        Ok(booking)
    }

    /// One create transaction: lock, conflict check, insert, and (for
    /// wallet-immediate requests) debit plus confirmation, committed as one
    /// unit.
    async fn try_create(
        &self,
        req: &NewBooking,
        total: Money,
        wallet_immediate: bool,
    ) -> BookingResult<Booking> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // The court row lock serializes check-then-create per court: two
        // concurrent requests for the same court cannot both observe "free".
        Self::lock_court(&mut tx, req.court_id).await?;

        let conflicts = AvailabilityChecker::fetch_conflicts(
            &mut *tx,
            req.court_id,
            req.start_time,
            req.end_time,
            None,
            now,
        )
        .await?;
        if !conflicts.is_empty() {
            return Err(BookingError::SlotUnavailable {
                conflicts: conflicts.len(),
            });
        }

        let code = generate_booking_code();
        let expires_at = if wallet_immediate {
            None
        } else {
            Some(now + self.config.hold_duration)
        };

        let mut booking = Self::insert_booking(
            &mut tx,
            req,
            &code,
            BookingStatus::PendingPayment,
            total,
            expires_at,
            None,
        )
        .await?;

        if wallet_immediate {
            let user_id = req.owner.user_id().ok_or(BookingError::WalletRequiresUser)?;
            WalletManager::debit_in_tx(
                &mut tx,
                user_id,
                total,
                TransactionType::Payment,
                Some(booking.id),
                &format!("Payment for booking {code}"),
            )
            .await?;
            booking = Self::mark_paid(&mut tx, booking.id, total, PaymentMethod::Wallet).await?;
        }

        tx.commit().await?;
        Ok(booking)
    }

    /// Settle a pending booking from the owner's wallet.
    ///
    /// The wallet debit and the CONFIRMED transition commit as one unit. On
    /// insufficient balance nothing changes and the booking stays
    /// PENDING_PAYMENT, retryable until the hold lapses.
    pub async fn pay_with_wallet(
        &self,
        booking_id: BookingId,
        now: DateTime<Utc>,
    ) -> BookingResult<Booking> {
        let mut tx = self.pool.begin().await?;
        let booking = Self::fetch_booking_for_update(&mut tx, booking_id).await?;
        Self::ensure_payable(&booking, now)?;

        let user_id = booking
            .owner
            .user_id()
            .ok_or(BookingError::WalletRequiresUser)?;
        let due = booking.total_price - booking.paid_amount;
        WalletManager::debit_in_tx(
            &mut tx,
            user_id,
            due,
            TransactionType::Payment,
            Some(booking.id),
            &format!("Payment for booking {}", booking.booking_code),
        )
        .await?;

        let booking =
            Self::mark_paid(&mut tx, booking.id, booking.total_price, PaymentMethod::Wallet)
                .await?;
        tx.commit().await?;

        self.events.emit(DomainEvent::BookingConfirmed {
            booking_id: booking.id,
        });
        Ok(booking)
    }

    /// Consume a reduced payment-gateway outcome for a pending booking.
    ///
    /// Signature and replay verification happened upstream; the engine only
    /// sees `{success, amount_paid}`. A failed outcome keeps the hold alive
    /// (the customer can retry until the deadline); a successful one
    /// confirms the booking with the amount the gateway reports.
    pub async fn apply_gateway_outcome(
        &self,
        booking_id: BookingId,
        success: bool,
        amount_paid: Money,
        now: DateTime<Utc>,
    ) -> BookingResult<Booking> {
        let mut tx = self.pool.begin().await?;
        let booking = Self::fetch_booking_for_update(&mut tx, booking_id).await?;
        Self::ensure_payable(&booking, now)?;

        let booking = if success {
            Self::mark_paid(&mut tx, booking.id, amount_paid, PaymentMethod::Gateway).await?
        } else {
            let row = sqlx::query(&format!(
                "UPDATE bookings
                 SET payment_status = 'failed', payment_method = 'gateway', updated_at = NOW()
                 WHERE id = $1
                 RETURNING {BOOKING_COLUMNS}"
            ))
            .bind(booking.id)
            .fetch_one(&mut *tx)
            .await?;
            Booking::from_pg_row(&row)
        };
        tx.commit().await?;

        if success {
            self.events.emit(DomainEvent::BookingConfirmed {
                booking_id: booking.id,
            });
        } else {
            log::warn!(
                "Gateway payment failed for booking {}; hold kept until {:?}",
                booking.id,
                booking.expires_at
            );
        }
        Ok(booking)
    }

    /// Cancel a booking, refunding by the cancellation policy.
    ///
    /// The refund computes against the paid amount. The zero-refund tier
    /// lands in CANCELLED_LATE, the others in CANCELLED; both release the
    /// slot. Registered owners are credited in the same transaction; for
    /// guest bookings the refund amount is returned for the POS to settle
    /// in cash.
    pub async fn cancel(
        &self,
        booking_id: BookingId,
        now: DateTime<Utc>,
    ) -> BookingResult<(Booking, Money)> {
        let mut tx = self.pool.begin().await?;
        let booking = Self::fetch_booking_for_update(&mut tx, booking_id).await?;

        let from = booking.effective_status(now);
        let percent = policy::refund_percent(booking.start_time, now);
        let to = if percent == 0 {
            BookingStatus::CancelledLate
        } else {
            BookingStatus::Cancelled
        };
        if !from.can_transition(to) {
            return Err(BookingError::InvalidTransition { from, to });
        }

        let refund = policy::refund_amount(booking.paid_amount, percent);
        let mut credited_user = None;
        if refund > 0 {
            if let Some(user_id) = booking.owner.user_id() {
                WalletManager::credit_in_tx(
                    &mut tx,
                    user_id,
                    refund,
                    TransactionType::Refund,
                    Some(booking.id),
                    &format!("Refund for booking {}", booking.booking_code),
                )
                .await?;
                credited_user = Some(user_id);
            } else {
                log::info!(
                    "Booking {} cancelled with {refund} due in cash (guest booking)",
                    booking.id
                );
            }
        }

        let row = sqlx::query(&format!(
            "UPDATE bookings
             SET status = $2, expires_at = NULL,
                 payment_status = CASE WHEN $3 THEN 'refunded' ELSE payment_status END,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking.id)
        .bind(to.as_str())
        .bind(refund > 0)
        .fetch_one(&mut *tx)
        .await?;
        let booking = Booking::from_pg_row(&row);
        tx.commit().await?;

        self.events.emit(DomainEvent::BookingCancelled {
            booking_id: booking.id,
            refund_amount: refund,
        });
        if let Some(user_id) = credited_user {
            self.events.emit(DomainEvent::WalletRefunded {
                user_id,
                amount: refund,
            });
        }

        Ok((booking, refund))
    }

    /// Check a confirmed booking in.
    ///
    /// Allowed from the configured lead before start through the scheduled
    /// end.
    pub async fn check_in(
        &self,
        booking_id: BookingId,
        now: DateTime<Utc>,
    ) -> BookingResult<Booking> {
        let mut tx = self.pool.begin().await?;
        let booking = Self::fetch_booking_for_update(&mut tx, booking_id).await?;

        let from = booking.effective_status(now);
        if from != BookingStatus::Confirmed {
            return Err(BookingError::InvalidTransition {
                from,
                to: BookingStatus::CheckedIn,
            });
        }
        let opens_at = booking.start_time - self.config.check_in_lead;
        if now < opens_at || now > booking.end_time {
            return Err(BookingError::OutsideCheckInWindow {
                opens_at,
                closes_at: booking.end_time,
            });
        }

        let row = sqlx::query(&format!(
            "UPDATE bookings
             SET status = 'checked_in', checked_in_at = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking.id)
        .bind(now.naive_utc())
        .fetch_one(&mut *tx)
        .await?;
        let booking = Booking::from_pg_row(&row);
        tx.commit().await?;

        self.events.emit(DomainEvent::BookingCheckedIn {
            booking_id: booking.id,
        });
        Ok(booking)
    }

    /// Complete a checked-in session, at or before its scheduled end.
    pub async fn complete(
        &self,
        booking_id: BookingId,
        now: DateTime<Utc>,
    ) -> BookingResult<Booking> {
        let mut tx = self.pool.begin().await?;
        let booking = Self::fetch_booking_for_update(&mut tx, booking_id).await?;

        let from = booking.effective_status(now);
        if !from.can_transition(BookingStatus::Completed) {
            return Err(BookingError::InvalidTransition {
                from,
                to: BookingStatus::Completed,
            });
        }

        let row = sqlx::query(&format!(
            "UPDATE bookings SET status = 'completed', updated_at = NOW()
             WHERE id = $1
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking.id)
        .fetch_one(&mut *tx)
        .await?;
        let booking = Booking::from_pg_row(&row);
        tx.commit().await?;
        Ok(booking)
    }

    /// Physically flip stale PENDING_PAYMENT rows to EXPIRED.
    ///
    /// Housekeeping only: availability already treats lapsed holds as
    /// non-holding at read time, so correctness never depends on this job
    /// having run.
    pub async fn sweep_expired_holds(&self) -> BookingResult<u64> {
        let result = with_default_timeout(
            sqlx::query(
                "UPDATE bookings SET status = 'expired', updated_at = NOW()
                 WHERE status = 'pending_payment' AND expires_at <= NOW()",
            )
            .execute(self.pool.as_ref()),
        )
        .await
        .map_err(|e| match e {
            TimeoutError::Database(e) => BookingError::Database(e),
            TimeoutError::Timeout(d) => BookingError::QueryTimeout(d),
        })?;

        let swept = result.rows_affected();
        if swept > 0 {
            log::info!("Swept {swept} expired payment holds");
        }
        Ok(swept)
    }

    /// Get a booking by id.
    pub async fn get(&self, booking_id: BookingId) -> BookingResult<Booking> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(booking_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(BookingError::NotFound(booking_id))?;
        Ok(Booking::from_pg_row(&row))
    }

    /// Get a booking by its external code (desk and QR flows).
    pub async fn get_by_code(&self, code: &str) -> BookingResult<Booking> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE booking_code = $1"
        ))
        .bind(code)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or_else(|| BookingError::CodeNotFound(code.to_string()))?;
        Ok(Booking::from_pg_row(&row))
    }

    /// A pending booking can be paid only while its hold is alive.
    fn ensure_payable(booking: &Booking, now: DateTime<Utc>) -> BookingResult<()> {
        match booking.effective_status(now) {
            BookingStatus::PendingPayment => {
                if booking.payment_status == PaymentStatus::Paid {
                    Err(BookingError::AlreadyPaid)
                } else {
                    Ok(())
                }
            }
            BookingStatus::Expired => Err(BookingError::HoldExpired(
                booking.expires_at.unwrap_or(now),
            )),
            other => Err(BookingError::InvalidTransition {
                from: other,
                to: BookingStatus::Confirmed,
            }),
        }
    }

    /// Lock a court row for the duration of the surrounding transaction.
    pub(crate) async fn lock_court(
        tx: &mut Transaction<'_, Postgres>,
        court_id: CourtId,
    ) -> BookingResult<()> {
        let row = sqlx::query("SELECT is_active FROM courts WHERE id = $1 FOR UPDATE")
            .bind(court_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(BookingError::CourtNotFound(court_id))?;
        if !row.get::<bool, _>("is_active") {
            return Err(BookingError::CourtInactive(court_id));
        }
        Ok(())
    }

    /// Load a booking under a row lock.
    pub(crate) async fn fetch_booking_for_update(
        tx: &mut Transaction<'_, Postgres>,
        booking_id: BookingId,
    ) -> BookingResult<Booking> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 FOR UPDATE"
        ))
        .bind(booking_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(BookingError::NotFound(booking_id))?;
        Ok(Booking::from_pg_row(&row))
    }

    /// Insert a booking row inside a caller-owned transaction.
    pub(crate) async fn insert_booking(
        tx: &mut Transaction<'_, Postgres>,
        req: &NewBooking,
        code: &str,
        status: BookingStatus,
        total_price: Money,
        expires_at: Option<DateTime<Utc>>,
        notes: Option<&str>,
    ) -> BookingResult<Booking> {
        let (user_id, guest_name, guest_phone) = match &req.owner {
            BookingOwner::User(id) => (Some(*id), None, None),
            BookingOwner::Guest { name, phone } => {
                (None, Some(name.as_str()), Some(phone.as_str()))
            }
            BookingOwner::Venue => (None, None, None),
        };
        let (group_id, pattern, day_of_week) = match &req.recurrence {
            Some(r) => (Some(r.group_id), Some(r.pattern.as_str()), Some(r.day_of_week)),
            None => (None, None, None),
        };

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO bookings
                (booking_code, court_id, user_id, guest_name, guest_phone,
                 start_time, end_time, total_price, status, payment_method,
                 expires_at, recurrence_group_id, recurrence_pattern,
                 recurrence_day_of_week, created_by, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(code)
        .bind(req.court_id)
        .bind(user_id)
        .bind(guest_name)
        .bind(guest_phone)
        .bind(req.start_time.naive_utc())
        .bind(req.end_time.naive_utc())
        .bind(total_price)
        .bind(status.as_str())
        .bind(req.payment_method.map(PaymentMethod::as_str))
        .bind(expires_at.map(|t| t.naive_utc()))
        .bind(group_id)
        .bind(pattern)
        .bind(day_of_week)
        .bind(req.created_by.as_str())
        .bind(notes)
        .fetch_one(&mut **tx)
        .await?;

        Ok(Booking::from_pg_row(&row))
    }

    /// Record a settled payment and confirm the booking.
    async fn mark_paid(
        tx: &mut Transaction<'_, Postgres>,
        booking_id: BookingId,
        paid_amount: Money,
        method: PaymentMethod,
    ) -> BookingResult<Booking> {
        let row = sqlx::query(&format!(
            "UPDATE bookings
             SET paid_amount = $2, payment_status = 'paid', payment_method = $3,
                 status = 'confirmed', expires_at = NULL, updated_at = NOW()
             WHERE id = $1
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking_id)
        .bind(paid_amount)
        .bind(method.as_str())
        .fetch_one(&mut **tx)
        .await?;
        Ok(Booking::from_pg_row(&row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn booking_codes_are_prefixed_and_unambiguous() {
        for _ in 0..100 {
            let code = generate_booking_code();
            assert_eq!(code.len(), 11);
            assert!(code.starts_with("BK-"));
            for c in code[3..].bytes() {
                assert!(CODE_CHARSET.contains(&c), "unexpected char {}", c as char);
            }
        }
    }

    #[derive(Debug)]
    struct FakeUniqueViolation(&'static str);

    impl std::fmt::Display for FakeUniqueViolation {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "duplicate key value violates unique constraint \"{}\"", self.0)
        }
    }

    impl std::error::Error for FakeUniqueViolation {}

    impl sqlx::error::DatabaseError for FakeUniqueViolation {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::UniqueViolation
        }

        fn constraint(&self) -> Option<&str> {
            Some(self.0)
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }
    }

    fn unique_violation(constraint: &'static str) -> BookingError {
        BookingError::Database(sqlx::Error::Database(Box::new(FakeUniqueViolation(
            constraint,
        ))))
    }

    #[test]
    fn only_booking_code_unique_violations_are_retried() {
        assert!(is_code_collision(&unique_violation(BOOKING_CODE_CONSTRAINT)));
        // Other constraints mean real data errors, not an unlucky code.
        assert!(!is_code_collision(&unique_violation("bookings_pkey")));
        assert!(!is_code_collision(&BookingError::Database(
            sqlx::Error::RowNotFound
        )));
        assert!(!is_code_collision(&BookingError::AlreadyPaid));
    }

    #[test]
    fn interval_validation() {
        let start = Utc.with_ymd_and_hms(2026, 8, 21, 10, 0, 0).unwrap();

        assert!(validate_interval(start, start + Duration::hours(1)).is_ok());
        assert!(matches!(
            validate_interval(start, start),
            Err(BookingError::InvalidInterval(_))
        ));
        assert!(matches!(
            validate_interval(start, start - Duration::hours(1)),
            Err(BookingError::InvalidInterval(_))
        ));
        // Sub-minute precision is below the smallest addressable unit.
        assert!(matches!(
            validate_interval(start, start + Duration::seconds(90)),
            Err(BookingError::InvalidInterval(_))
        ));
    }
}
