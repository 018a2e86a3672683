//! Integration suite for the Postgres ledger. Needs a running Postgres
//! with DATABASE_URL pointing at it:
//!
//!   DATABASE_URL=postgres://... cargo test -p slotgate-store -- --ignored

use chrono::{NaiveDate, NaiveDateTime};
use slotgate_core::booking::BookingDraft;
use slotgate_core::error::BookingError;
use slotgate_core::ledger::BookingLedger;
use slotgate_core::rules::BookingRules;
use slotgate_core::slot::SlotKey;
use slotgate_store::PgBookingLedger;
use sqlx::PgPool;
use std::sync::Arc;

async fn connect() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPool::connect(&url).await.expect("connect to postgres");
    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    pool
}

fn slot_on(day: u32, hour: u32) -> SlotKey {
    let t = NaiveDate::from_ymd_opt(2099, 6, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap();
    SlotKey::derive(t)
}

fn draft(identity: &str, slot: SlotKey, count: u32) -> BookingDraft {
    BookingDraft {
        username: "Rugved".to_string(),
        email: "rugved@example.com".to_string(),
        identity_number: identity.to_string(),
        slot,
        ticket_count: count,
        passenger_names: (0..count).map(|i| format!("Passenger {}", i + 1)).collect(),
    }
}

/// Each test owns one slot; wipe it so reruns start clean.
async fn reset_slot(pool: &PgPool, slot: SlotKey) {
    let t: NaiveDateTime = slot.as_naive();
    sqlx::query(
        "DELETE FROM passengers WHERE booking_id IN \
         (SELECT booking_id FROM bookings WHERE slot_time = $1)",
    )
    .bind(t)
    .execute(pool)
    .await
    .unwrap();
    sqlx::query("DELETE FROM bookings WHERE slot_time = $1")
        .bind(t)
        .execute(pool)
        .await
        .unwrap();
}

/// Seed committed tickets directly, bypassing the attempt path.
async fn seed_tickets(pool: &PgPool, slot: SlotKey, total: i32) {
    let mut remaining = total;
    let mut i = 0;
    while remaining > 0 {
        let count = remaining.min(4);
        sqlx::query(
            "INSERT INTO bookings \
             (booking_id, username, email, identity_number, slot_time, ticket_count) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(slotgate_core::booking::BookingId::generate().as_str().to_string())
        .bind("seed")
        .bind("seed@example.com")
        .bind(format!("999888777{:03}", i % 1000))
        .bind(slot.as_naive())
        .bind(count)
        .execute(pool)
        .await
        .unwrap();
        remaining -= count;
        i += 1;
    }
}

#[tokio::test]
#[ignore]
async fn commit_and_read_back() {
    let pool = connect().await;
    let slot = slot_on(1, 10);
    reset_slot(&pool, slot).await;
    let ledger = PgBookingLedger::new(pool.clone(), BookingRules::default());

    let booking = ledger
        .attempt_booking(&draft("100000000001", slot, 2))
        .await
        .unwrap();
    assert!(booking.booking_id.as_str().starts_with("BK-"));

    let found = ledger
        .latest_booking("100000000001", "rugved@example.com")
        .await
        .unwrap()
        .expect("booking should be readable");
    assert_eq!(found.booking_id, booking.booking_id);
    assert_eq!(found.passenger_names.len(), 2);

    assert_eq!(ledger.slot_availability(slot).await.unwrap(), 498);

    // Lock marker rows never survive a finished transaction.
    let locks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM slot_locks")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(locks, 0);
}

#[tokio::test]
#[ignore]
async fn capacity_boundary_at_five_hundred() {
    let pool = connect().await;
    let slot = slot_on(2, 10);
    reset_slot(&pool, slot).await;
    seed_tickets(&pool, slot, 498).await;
    let ledger = PgBookingLedger::new(pool.clone(), BookingRules::default());

    let err = ledger
        .attempt_booking(&draft("100000000002", slot, 3))
        .await
        .unwrap_err();
    assert_eq!(err, BookingError::SlotFull);

    ledger
        .attempt_booking(&draft("100000000002", slot, 2))
        .await
        .unwrap();
    assert_eq!(ledger.slot_availability(slot).await.unwrap(), 0);
}

#[tokio::test]
#[ignore]
async fn per_identity_boundary_at_four() {
    let pool = connect().await;
    let slot = slot_on(3, 10);
    reset_slot(&pool, slot).await;
    let ledger = PgBookingLedger::new(pool.clone(), BookingRules::default());

    ledger
        .attempt_booking(&draft("100000000003", slot, 3))
        .await
        .unwrap();

    let err = ledger
        .attempt_booking(&draft("100000000003", slot, 2))
        .await
        .unwrap_err();
    assert_eq!(err, BookingError::PerIdentityLimitExceeded);

    ledger
        .attempt_booking(&draft("100000000003", slot, 1))
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore]
async fn concurrent_same_pair_attempts_never_both_commit() {
    let pool = connect().await;
    let slot = slot_on(4, 10);
    reset_slot(&pool, slot).await;
    let ledger = Arc::new(PgBookingLedger::new(pool.clone(), BookingRules::default()));

    let a = {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.attempt_booking(&draft("100000000004", slot, 4)).await })
    };
    let b = {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.attempt_booking(&draft("100000000004", slot, 4)).await })
    };

    let outcomes = [a.await.unwrap(), b.await.unwrap()];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    // The loser hits the in-flight lock when the attempts overlap, or
    // the identity limit if the winner already committed.
    let loser = outcomes.iter().find(|r| r.is_err()).unwrap();
    assert!(matches!(
        loser,
        Err(BookingError::DuplicateInProgress) | Err(BookingError::PerIdentityLimitExceeded)
    ));

    assert_eq!(ledger.slot_availability(slot).await.unwrap(), 496);
}

#[tokio::test]
#[ignore]
async fn rejected_attempt_releases_the_pair_lock() {
    let pool = connect().await;
    let slot = slot_on(5, 10);
    reset_slot(&pool, slot).await;
    seed_tickets(&pool, slot, 500).await;
    let ledger = PgBookingLedger::new(pool.clone(), BookingRules::default());

    for _ in 0..2 {
        // The second attempt must see SlotFull again, not a stale
        // in-flight lock from the first rollback.
        let err = ledger
            .attempt_booking(&draft("100000000005", slot, 1))
            .await
            .unwrap_err();
        assert_eq!(err, BookingError::SlotFull);
    }
}
