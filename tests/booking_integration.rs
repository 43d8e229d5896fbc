//! Integration tests for the booking lifecycle.
//!
//! Tests the payment hold, slot contention under concurrency, wallet
//! settlement, refund tiers, recurring generation, and maintenance blocks
//! against a real PostgreSQL database.

use chrono::{DateTime, Duration, TimeZone, Utc};
use court_booking::admin::AdminOverrideService;
use court_booking::booking::{
    ActorType, BookingError, BookingManager, BookingOwner, BookingStatus, NewBooking,
    PaymentMethod, PaymentStatus,
};
use court_booking::db::{Database, DatabaseConfig};
use court_booking::recurring::{RecurrencePattern, RecurringManager, RecurringRequest};
use court_booking::wallet::WalletManager;
use sqlx::PgPool;
use std::sync::Arc;

/// Helper to create a test database pool
async fn setup_test_db() -> Arc<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://postgres@localhost/court_booking".to_string());

    let config = DatabaseConfig {
        database_url,
        max_connections: 5,
        min_connections: 1,
        connection_timeout_secs: 5,
        idle_timeout_secs: 300,
        max_lifetime_secs: 1800,
    };

    let db = Database::new(&config)
        .await
        .expect("Failed to create test database");
    let pool = Arc::new(db.pool().clone());
    ensure_schema(&pool).await;
    pool
}

/// Apply the schema once against an empty test database.
async fn ensure_schema(pool: &PgPool) {
    let exists: Option<String> = sqlx::query_scalar("SELECT to_regclass('bookings')::text")
        .fetch_one(pool)
        .await
        .expect("Schema check should run");
    if exists.is_none() {
        sqlx::raw_sql(include_str!("../migrations/0001_init.sql"))
            .execute(pool)
            .await
            .expect("Schema should apply");
    }
}

/// Helper to create a court with an all-day, every-day pricing rule.
async fn create_court(pool: &PgPool, name: &str, price_per_hour: i64) -> i64 {
    let court_id: i64 = sqlx::query_scalar(
        "INSERT INTO courts (name, base_price_per_hour) VALUES ($1, $2) RETURNING id",
    )
    .bind(name)
    .bind(price_per_hour)
    .fetch_one(pool)
    .await
    .expect("Should create court");

    // Court-scoped with a high priority so shared fixtures never interfere.
    sqlx::query(
        "INSERT INTO pricing_rules (court_id, start_minute, end_minute, price_per_hour, priority)
         VALUES ($1, 0, 1440, $2, 100)",
    )
    .bind(court_id)
    .bind(price_per_hour)
    .execute(pool)
    .await
    .expect("Should create pricing rule");

    court_id
}

/// Helper to cleanup a test court and everything booked on it
async fn cleanup_court(pool: &PgPool, court_id: i64) {
    let _ = sqlx::query("DELETE FROM bookings WHERE court_id = $1")
        .bind(court_id)
        .execute(pool)
        .await;
    let _ = sqlx::query("DELETE FROM pricing_rules WHERE court_id = $1")
        .bind(court_id)
        .execute(pool)
        .await;
    let _ = sqlx::query("DELETE FROM courts WHERE id = $1")
        .bind(court_id)
        .execute(pool)
        .await;
}

/// Helper to cleanup a test wallet and its ledger
async fn cleanup_wallet(pool: &PgPool, user_id: i64) {
    let _ = sqlx::query("DELETE FROM wallet_transactions WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await;
    let _ = sqlx::query("DELETE FROM wallets WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await;
}

/// A one-hour slot `days_ahead` days from now, minute-aligned.
fn slot(days_ahead: i64, hour: u32) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = (Utc::now() + Duration::days(days_ahead))
        .date_naive()
        .and_hms_opt(hour, 0, 0)
        .expect("valid time")
        .and_utc();
    (start, start + Duration::hours(1))
}

/// A minute-aligned instant `mins` minutes from now.
fn minutes_from_now(mins: i64) -> DateTime<Utc> {
    let ts = (Utc::now() + Duration::minutes(mins)).timestamp() / 60 * 60;
    DateTime::from_timestamp(ts, 0).expect("valid timestamp")
}

fn guest(name: &str) -> BookingOwner {
    BookingOwner::Guest {
        name: name.to_string(),
        phone: "555-0100".to_string(),
    }
}

#[tokio::test]
async fn test_create_places_payment_hold() {
    let pool = setup_test_db().await;
    let bookings = BookingManager::new(pool.clone());
    let court_id = create_court(&pool, "test_hold_court", 80_000).await;
    let (start, end) = slot(3, 18);

    let booking = bookings
        .create(NewBooking {
            court_id,
            owner: guest("Hold Test"),
            start_time: start,
            end_time: end,
            payment_method: None,
            created_by: ActorType::Customer,
            recurrence: None,
        })
        .await
        .expect("Create should succeed");

    assert_eq!(booking.status, BookingStatus::PendingPayment);
    assert_eq!(booking.payment_status, PaymentStatus::Unpaid);
    assert_eq!(booking.total_price, 80_000);
    assert_eq!(booking.paid_amount, 0);
    assert!(booking.expires_at.is_some(), "Hold should carry a deadline");

    // The live hold keeps the slot: a second request must be refused.
    let second = bookings
        .create(NewBooking {
            court_id,
            owner: guest("Second"),
            start_time: start,
            end_time: end,
            payment_method: None,
            created_by: ActorType::Customer,
            recurrence: None,
        })
        .await;
    assert!(matches!(
        second,
        Err(BookingError::SlotUnavailable { conflicts: 1 })
    ));

    cleanup_court(&pool, court_id).await;
}

#[tokio::test]
async fn test_concurrent_creates_one_wins() {
    let pool = setup_test_db().await;
    let bookings = BookingManager::new(pool.clone());
    let court_id = create_court(&pool, "test_race_court", 80_000).await;
    let (start, end) = slot(4, 19);

    let mut handles = vec![];
    for i in 0..2 {
        let mgr = bookings.clone();
        handles.push(tokio::spawn(async move {
            mgr.create(NewBooking {
                court_id,
                owner: guest(&format!("Racer {i}")),
                start_time: start,
                end_time: end,
                payment_method: None,
                created_by: ActorType::Customer,
                recurrence: None,
            })
            .await
        }));
    }

    let mut success_count = 0;
    let mut conflict_count = 0;
    for handle in handles {
        match handle.await.expect("Task should complete") {
            Ok(_) => success_count += 1,
            Err(BookingError::SlotUnavailable { .. }) => conflict_count += 1,
            Err(e) => panic!("Unexpected error: {e}"),
        }
    }
    assert_eq!(success_count, 1, "Exactly one create should win the slot");
    assert_eq!(conflict_count, 1);

    cleanup_court(&pool, court_id).await;
}

#[tokio::test]
async fn test_wallet_immediate_create_settles_in_one_step() {
    let pool = setup_test_db().await;
    let bookings = BookingManager::new(pool.clone());
    let wallet_mgr = WalletManager::new(pool.clone());
    let court_id = create_court(&pool, "test_wallet_court", 80_000).await;
    let user_id = 920_001;
    cleanup_wallet(&pool, user_id).await;
    let (start, end) = slot(3, 10);

    wallet_mgr
        .get_or_create_wallet(user_id)
        .await
        .expect("Should create wallet");
    wallet_mgr
        .top_up(user_id, 200_000, "Seed")
        .await
        .expect("Top-up should succeed");

    let booking = bookings
        .create(NewBooking {
            court_id,
            owner: BookingOwner::User(user_id),
            start_time: start,
            end_time: end,
            payment_method: Some(PaymentMethod::Wallet),
            created_by: ActorType::Customer,
            recurrence: None,
        })
        .await
        .expect("Wallet-immediate create should succeed");

    // No hold: the booking confirms inside the create transaction.
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.payment_status, PaymentStatus::Paid);
    assert_eq!(booking.paid_amount, 80_000);
    assert!(booking.expires_at.is_none());

    let wallet = wallet_mgr
        .get_wallet(user_id)
        .await
        .expect("Should get wallet");
    assert_eq!(wallet.balance, 120_000);

    let entries = wallet_mgr
        .list_transactions(user_id, 10)
        .await
        .expect("Should list transactions");
    assert!(
        entries
            .iter()
            .any(|e| e.booking_id == Some(booking.id) && e.amount == 80_000),
        "Payment should reference the booking"
    );

    cleanup_court(&pool, court_id).await;
    cleanup_wallet(&pool, user_id).await;
}

#[tokio::test]
async fn test_cancel_refund_tiers() {
    let pool = setup_test_db().await;
    let bookings = BookingManager::new(pool.clone());
    let wallet_mgr = WalletManager::new(pool.clone());
    let court_id = create_court(&pool, "test_refund_court", 80_000).await;
    let user_id = 920_002;
    cleanup_wallet(&pool, user_id).await;

    wallet_mgr
        .get_or_create_wallet(user_id)
        .await
        .expect("Should create wallet");
    wallet_mgr
        .top_up(user_id, 200_000, "Seed")
        .await
        .expect("Top-up should succeed");

    // More than 24 hours ahead: full refund back to the wallet.
    let (start, end) = slot(3, 9);
    let early = bookings
        .create(NewBooking {
            court_id,
            owner: BookingOwner::User(user_id),
            start_time: start,
            end_time: end,
            payment_method: Some(PaymentMethod::Wallet),
            created_by: ActorType::Customer,
            recurrence: None,
        })
        .await
        .expect("Create should succeed");

    let (cancelled, refund) = bookings
        .cancel(early.id, Utc::now())
        .await
        .expect("Cancel should succeed");
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);
    assert_eq!(refund, 80_000);

    let wallet = wallet_mgr
        .get_wallet(user_id)
        .await
        .expect("Should get wallet");
    assert_eq!(wallet.balance, 200_000, "Full refund should restore the balance");

    // Inside 12 hours: zero refund, terminal state CancelledLate.
    let late_start = minutes_from_now(180);
    let late = bookings
        .create(NewBooking {
            court_id,
            owner: BookingOwner::User(user_id),
            start_time: late_start,
            end_time: late_start + Duration::hours(1),
            payment_method: Some(PaymentMethod::Wallet),
            created_by: ActorType::Customer,
            recurrence: None,
        })
        .await
        .expect("Create should succeed");

    let (cancelled, refund) = bookings
        .cancel(late.id, Utc::now())
        .await
        .expect("Late cancel should still cancel");
    assert_eq!(cancelled.status, BookingStatus::CancelledLate);
    assert_eq!(refund, 0);

    let wallet = wallet_mgr
        .get_wallet(user_id)
        .await
        .expect("Should get wallet");
    assert_eq!(wallet.balance, 120_000, "Late cancel forfeits the payment");

    cleanup_court(&pool, court_id).await;
    cleanup_wallet(&pool, user_id).await;
}

#[tokio::test]
async fn test_recurring_weekly_skips_conflicting_occurrence() {
    let pool = setup_test_db().await;
    let bookings = BookingManager::new(pool.clone());
    let recurring = RecurringManager::new(pool.clone());
    let court_id = create_court(&pool, "test_recurring_court", 80_000).await;
    let (first_start, first_end) = slot(7, 18);

    // Occupy the third weekly occurrence up front.
    let conflict_start = first_start + Duration::weeks(2);
    bookings
        .create(NewBooking {
            court_id,
            owner: guest("Conflict"),
            start_time: conflict_start,
            end_time: conflict_start + Duration::hours(1),
            payment_method: None,
            created_by: ActorType::Customer,
            recurrence: None,
        })
        .await
        .expect("Conflict booking should succeed");

    let result = recurring
        .generate(RecurringRequest {
            court_id,
            owner: guest("League"),
            first_start,
            first_end,
            pattern: RecurrencePattern::Weekly,
            occurrences: 4,
            payment_method: None,
            created_by: ActorType::Staff,
        })
        .await
        .expect("Generation should complete with a skip");

    assert_eq!(result.created.len(), 3, "Three free occurrences should book");
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].start_time, conflict_start);
    for booking in &result.created {
        assert_eq!(booking.recurrence.map(|r| r.group_id), Some(result.group_id));
    }

    // Group cancel releases every member it created.
    let outcome = recurring
        .cancel_group(result.group_id, Utc::now())
        .await
        .expect("Group cancel should succeed");
    assert_eq!(outcome.cancelled.len(), 3);
    assert!(outcome.failed.is_empty());

    cleanup_court(&pool, court_id).await;
}

#[tokio::test]
async fn test_recurring_abort_reports_created_bookings() {
    let pool = setup_test_db().await;
    let recurring = RecurringManager::new(pool.clone());

    // A court priced only on Mondays: the monthly pattern walks off the
    // weekday, so the second occurrence cannot be priced and the batch
    // aborts mid-way.
    let court_id: i64 = sqlx::query_scalar(
        "INSERT INTO courts (name, base_price_per_hour) VALUES ('test_abort_court', 80000) RETURNING id",
    )
    .fetch_one(pool.as_ref())
    .await
    .expect("Should create court");
    sqlx::query(
        "INSERT INTO pricing_rules (court_id, day_of_week, start_minute, end_minute, price_per_hour, priority)
         VALUES ($1, 1, 0, 1440, 80000, 100)",
    )
    .bind(court_id)
    .execute(pool.as_ref())
    .await
    .expect("Should create pricing rule");

    // 2026-10-05 is a Monday; one month later, 2026-11-05, is a Thursday.
    let first_start = Utc.with_ymd_and_hms(2026, 10, 5, 10, 0, 0).unwrap();
    let err = recurring
        .generate(RecurringRequest {
            court_id,
            owner: guest("Monthly"),
            first_start,
            first_end: first_start + Duration::hours(1),
            pattern: RecurrencePattern::Monthly,
            occurrences: 3,
            payment_method: None,
            created_by: ActorType::Staff,
        })
        .await
        .expect_err("Second occurrence should abort the batch");

    match err {
        BookingError::RecurringAborted {
            group_id,
            created,
            source,
        } => {
            assert_eq!(created.len(), 1, "The Monday occurrence committed first");
            assert!(matches!(*source, BookingError::Pricing(_)));

            // The surviving booking is reachable by group, so the caller can
            // keep it or cancel it.
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM bookings WHERE recurrence_group_id = $1",
            )
            .bind(group_id)
            .fetch_one(pool.as_ref())
            .await
            .expect("Should count group members");
            assert_eq!(count, 1);
        }
        other => panic!("Expected an aborted batch, got {other}"),
    }

    cleanup_court(&pool, court_id).await;
}

#[tokio::test]
async fn test_block_is_released_only_by_admin() {
    let pool = setup_test_db().await;
    let bookings = BookingManager::new(pool.clone());
    let admin = AdminOverrideService::new(pool.clone());
    let court_id = create_court(&pool, "test_block_court", 80_000).await;
    let (start, end) = slot(5, 8);

    let block = admin
        .block_slot(court_id, start, end, "Resurfacing")
        .await
        .expect("Block should succeed");
    assert_eq!(block.status, BookingStatus::Blocked);

    // The customer cancel path must refuse a maintenance block in every
    // refund tier.
    let result = bookings.cancel(block.id, Utc::now()).await;
    assert!(matches!(
        result,
        Err(BookingError::InvalidTransition {
            from: BookingStatus::Blocked,
            ..
        })
    ));

    let lifted = admin
        .lift_block(block.id)
        .await
        .expect("Lift should succeed");
    assert_eq!(lifted.status, BookingStatus::Cancelled);

    // The slot is free again once the block is lifted.
    bookings
        .create(NewBooking {
            court_id,
            owner: guest("After Block"),
            start_time: start,
            end_time: end,
            payment_method: None,
            created_by: ActorType::Customer,
            recurrence: None,
        })
        .await
        .expect("Create should succeed after lifting the block");

    cleanup_court(&pool, court_id).await;
}

#[tokio::test]
async fn test_check_in_outside_window_is_refused() {
    let pool = setup_test_db().await;
    let bookings = BookingManager::new(pool.clone());
    let wallet_mgr = WalletManager::new(pool.clone());
    let court_id = create_court(&pool, "test_checkin_court", 80_000).await;
    let user_id = 920_003;
    cleanup_wallet(&pool, user_id).await;
    let (start, end) = slot(2, 11);

    wallet_mgr
        .get_or_create_wallet(user_id)
        .await
        .expect("Should create wallet");
    wallet_mgr
        .top_up(user_id, 100_000, "Seed")
        .await
        .expect("Top-up should succeed");

    let booking = bookings
        .create(NewBooking {
            court_id,
            owner: BookingOwner::User(user_id),
            start_time: start,
            end_time: end,
            payment_method: Some(PaymentMethod::Wallet),
            created_by: ActorType::Customer,
            recurrence: None,
        })
        .await
        .expect("Create should succeed");

    // Two days before start is far outside the 15-minute lead.
    let result = bookings.check_in(booking.id, Utc::now()).await;
    assert!(matches!(
        result,
        Err(BookingError::OutsideCheckInWindow { .. })
    ));

    cleanup_court(&pool, court_id).await;
    cleanup_wallet(&pool, user_id).await;
}
