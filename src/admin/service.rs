//! Staff overrides that step outside the normal lifecycle.
//!
//! Overrides run under the same per-court lock and conflict query as normal
//! creation, so an admin move can never slip a double booking past a
//! concurrent customer request. What they skip is the transition chart and
//! the cancellation policy, which is why every entry point here is expected
//! to sit behind staff authorization upstream.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use super::models::{AdminUpdateResult, ForceUpdate, OverrideOptions};
use crate::availability::{AvailabilityChecker, holds_slot};
use crate::booking::manager::validate_interval;
use crate::booking::{
    ActorType, BOOKING_COLUMNS, Booking, BookingError, BookingId, BookingManager, BookingOwner,
    BookingResult, BookingStatus, NewBooking,
};
use crate::courts::CourtId;
use crate::events::{DomainEvent, EventSink, LogEventSink};
use crate::pricing::PricingManager;
use crate::wallet::{TransactionType, WalletManager, WalletTransaction};

/// Admin override service
#[derive(Clone)]
pub struct AdminOverrideService {
    pool: Arc<PgPool>,
    pricing: PricingManager,
    events: Arc<dyn EventSink>,
}

impl AdminOverrideService {
    /// Create a new admin override service.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            pricing: PricingManager::new(pool.clone()),
            events: Arc::new(LogEventSink),
            pool,
        }
    }

    /// Override the event sink.
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Rewrite a booking's slot or status directly.
    ///
    /// Runs in one transaction: the target court is locked, conflicts on the
    /// new slot are either rejected or cancelled as overwritten, and any
    /// requested re-pricing settles against the owner's wallet before the
    /// booking row changes. Overwritten bookings are not auto-refunded; each
    /// is reported so staff can settle them case by case.
    pub async fn force_update(
        &self,
        booking_id: BookingId,
        update: ForceUpdate,
        options: OverrideOptions,
        now: DateTime<Utc>,
    ) -> BookingResult<AdminUpdateResult> {
        let mut tx = self.pool.begin().await?;
        let booking = BookingManager::fetch_booking_for_update(&mut tx, booking_id).await?;

        let court_id = update.court_id.unwrap_or(booking.court_id);
        let start_time = update.start_time.unwrap_or(booking.start_time);
        let end_time = update.end_time.unwrap_or(booking.end_time);
        let status = update.status.unwrap_or(booking.status);
        if update.reschedules() {
            validate_interval(start_time, end_time)?;
        }

        // A lapsed hold keeps holding after the rewrite: the override is an
        // explicit decision to keep the slot.
        let expires_at = if status == BookingStatus::PendingPayment {
            booking.expires_at
        } else {
            None
        };

        let mut overwritten = Vec::new();
        if holds_slot(status, expires_at, now) {
            BookingManager::lock_court(&mut tx, court_id).await?;
            let conflicts = AvailabilityChecker::fetch_conflicts(
                &mut *tx,
                court_id,
                start_time,
                end_time,
                Some(booking.id),
                now,
            )
            .await?;

            if !conflicts.is_empty() && !options.force_overwrite {
                return Err(BookingError::SlotUnavailable {
                    conflicts: conflicts.len(),
                });
            }
            for conflict in conflicts {
                sqlx::query(
                    "UPDATE bookings
                     SET status = 'cancelled', overwritten = TRUE, expires_at = NULL,
                         updated_at = NOW()
                     WHERE id = $1",
                )
                .bind(conflict.id)
                .execute(&mut *tx)
                .await?;
                overwritten.push(conflict.id);
            }
        }

        let (total_price, price_change, paid_amount, settled) = self
            .settle_price_change(&mut tx, &booking, court_id, start_time, end_time, options)
            .await?;

        let row = sqlx::query(&format!(
            "UPDATE bookings
             SET court_id = $2, start_time = $3, end_time = $4, status = $5,
                 total_price = $6, paid_amount = $7, expires_at = $8, updated_at = NOW()
             WHERE id = $1
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking.id)
        .bind(court_id)
        .bind(start_time.naive_utc())
        .bind(end_time.naive_utc())
        .bind(status.as_str())
        .bind(total_price)
        .bind(paid_amount)
        .bind(expires_at.map(|t| t.naive_utc()))
        .fetch_one(&mut *tx)
        .await?;
        let updated = Booking::from_pg_row(&row);
        tx.commit().await?;

        log::info!(
            "Force-updated booking {} ({} overwritten, price change {price_change})",
            updated.id,
            overwritten.len()
        );
        for id in &overwritten {
            self.events.emit(DomainEvent::BookingCancelled {
                booking_id: *id,
                refund_amount: 0,
            });
        }

        Ok(AdminUpdateResult {
            booking: updated,
            price_change,
            settled,
            overwritten,
        })
    }

    /// Block a slot for maintenance or a private event.
    ///
    /// Inserts a venue-owned BLOCKED booking at price zero. Fails on any
    /// conflict: staff free the slot first (or force-update over it) rather
    /// than silently blocking over customers.
    pub async fn block_slot(
        &self,
        court_id: CourtId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        reason: &str,
    ) -> BookingResult<Booking> {
        validate_interval(start, end)?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        BookingManager::lock_court(&mut tx, court_id).await?;
        let conflicts =
            AvailabilityChecker::fetch_conflicts(&mut *tx, court_id, start, end, None, now)
                .await?;
        if !conflicts.is_empty() {
            return Err(BookingError::SlotUnavailable {
                conflicts: conflicts.len(),
            });
        }

        let req = NewBooking {
            court_id,
            owner: BookingOwner::Venue,
            start_time: start,
            end_time: end,
            payment_method: None,
            created_by: ActorType::Admin,
            recurrence: None,
        };
        let code = crate::booking::manager::generate_booking_code();
        let booking = BookingManager::insert_booking(
            &mut tx,
            &req,
            &code,
            BookingStatus::Blocked,
            0,
            None,
            Some(reason),
        )
        .await?;
        tx.commit().await?;

        log::info!(
            "Blocked court {court_id} from {start} to {end}: {reason}"
        );
        self.events.emit(DomainEvent::BookingCreated {
            booking_id: booking.id,
            booking_code: booking.booking_code.clone(),
        });
        Ok(booking)
    }

    /// Release a blocked slot.
    pub async fn lift_block(&self, booking_id: BookingId) -> BookingResult<Booking> {
        let mut tx = self.pool.begin().await?;
        let booking = BookingManager::fetch_booking_for_update(&mut tx, booking_id).await?;
        if booking.status != BookingStatus::Blocked {
            return Err(BookingError::InvalidTransition {
                from: booking.status,
                to: BookingStatus::Cancelled,
            });
        }

        let row = sqlx::query(&format!(
            "UPDATE bookings SET status = 'cancelled', updated_at = NOW()
             WHERE id = $1
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking.id)
        .fetch_one(&mut *tx)
        .await?;
        let booking = Booking::from_pg_row(&row);
        tx.commit().await?;

        log::info!("Lifted block {} on court {}", booking.id, booking.court_id);
        Ok(booking)
    }

    /// Re-price the booking for its (possibly new) slot and settle the
    /// difference per the options. Returns the new total, the price change,
    /// the adjusted paid amount, and the ledger row if one was written.
    async fn settle_price_change(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        booking: &Booking,
        court_id: CourtId,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        options: OverrideOptions,
    ) -> BookingResult<(i64, i64, i64, Option<WalletTransaction>)> {
        if !options.recalculate_price {
            return Ok((booking.total_price, 0, booking.paid_amount, None));
        }

        let quote = self
            .pricing
            .quote_in_tx(tx, court_id, start_time, end_time)
            .await?;
        let price_change = quote.total - booking.total_price;
        let mut paid_amount = booking.paid_amount;
        let mut settled = None;

        let user_id = booking.owner.user_id();
        if price_change < 0 && options.refund_to_wallet {
            // Never return more than was actually paid.
            let refund = (-price_change).min(booking.paid_amount);
            if refund > 0 {
                match user_id {
                    Some(user_id) => {
                        let entry = WalletManager::credit_in_tx(
                            tx,
                            user_id,
                            refund,
                            TransactionType::Refund,
                            Some(booking.id),
                            &format!("Price adjustment for booking {}", booking.booking_code),
                        )
                        .await?;
                        paid_amount -= refund;
                        settled = Some(entry);
                    }
                    None => log::info!(
                        "Booking {} repriced with {refund} due back in cash (guest booking)",
                        booking.id
                    ),
                }
            }
        } else if price_change > 0 && options.charge_extra_to_wallet {
            let user_id = user_id.ok_or(BookingError::WalletRequiresUser)?;
            let entry = WalletManager::debit_in_tx(
                tx,
                user_id,
                price_change,
                TransactionType::Payment,
                Some(booking.id),
                &format!("Price adjustment for booking {}", booking.booking_code),
            )
            .await?;
            paid_amount += price_change;
            settled = Some(entry);
        }

        Ok((quote.total, price_change, paid_amount, settled))
    }
}
