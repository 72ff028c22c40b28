//! The concurrency properties again, against PostgreSQL.
//!
//! `MemoryStore` serializes whole units of work, so only these tests reach
//! the `FOR UPDATE` locks and the conditional coupon update. They need a
//! disposable database:
//!
//! ```text
//! DATABASE_URL=postgres://localhost/booking_test cargo test --test pg_concurrency -- --ignored
//! ```

mod common;

use std::sync::Arc;

use chrono::Utc;
use common::{FakeGateway, RecordingNotifier, at, offline, request};
use uuid::Uuid;

use hotel_booking_engine::{
    db::{self, DbPool},
    engine::{Engine, EngineSettings},
    error::AppError,
    models::{
        actor::Actor,
        hotel::{Hotel, Room},
        wallet::WalletSource,
    },
    services::{booking_service, wallet_service},
    store::PgStore,
};

struct PgFixture {
    engine: Engine<PgStore>,
    pool: DbPool,
    hotel: Hotel,
    room: Room,
}

/// Migrated pool plus a fresh hotel and room, or `None` without a database.
async fn setup() -> Option<PgFixture> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = db::create_pool(&url).await.unwrap();
    db::run_migrations(&pool).await.unwrap();

    let hotel = Hotel {
        id: Uuid::new_v4(),
        owner_id: Uuid::new_v4(),
        city_id: None,
        name: "Harbour View".to_string(),
        online_payment_enabled: true,
        offline_payment_enabled: true,
        cancellation_time_hours: 24,
        cancellation_fee_percentage: 20.0,
    };
    sqlx::query(
        r#"
        INSERT INTO hotels (id, owner_id, name, cancellation_time_hours, cancellation_fee_percentage)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(hotel.id)
    .bind(hotel.owner_id)
    .bind(&hotel.name)
    .bind(hotel.cancellation_time_hours)
    .bind(hotel.cancellation_fee_percentage)
    .execute(&pool)
    .await
    .unwrap();

    let room = insert_room(&pool, &hotel, "101").await;

    let engine = Engine::new(
        PgStore::new(pool.clone()),
        Arc::new(FakeGateway::default()),
        Arc::new(RecordingNotifier::default()),
        EngineSettings::default(),
    );

    Some(PgFixture {
        engine,
        pool,
        hotel,
        room,
    })
}

async fn insert_room(pool: &DbPool, hotel: &Hotel, room_number: &str) -> Room {
    let room = common::room_at(hotel, room_number);
    sqlx::query(
        r#"
        INSERT INTO rooms (id, hotel_id, room_type_id, room_number, price_per_night_cents,
                           price_per_hour_cents, capacity, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'available')
        "#,
    )
    .bind(room.id)
    .bind(room.hotel_id)
    .bind(room.room_type_id)
    .bind(&room.room_number)
    .bind(room.price_per_night_cents)
    .bind(room.price_per_hour_cents)
    .bind(room.capacity)
    .execute(pool)
    .await
    .unwrap();
    room
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "needs DATABASE_URL"]
async fn row_lock_admits_one_booking_per_room() {
    let Some(f) = setup().await else { return };
    let f = Arc::new(f);

    let attempts: Vec<_> = (0..10)
        .map(|_| {
            let f = Arc::clone(&f);
            tokio::spawn(async move {
                let guest = Actor::guest(Uuid::new_v4());
                booking_service::create_booking(
                    &f.engine,
                    &guest,
                    request(&f.room, at(2030, 6, 1), at(2030, 6, 3), offline(), 200_000),
                )
                .await
            })
        })
        .collect();

    let mut successes = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(_) => successes += 1,
            Err(AppError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(successes, 1);

    let stored: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM bookings WHERE room_id = $1 AND status <> 'cancelled'",
    )
    .bind(f.room.id)
    .fetch_one(&f.pool)
    .await
    .unwrap();
    assert_eq!(stored, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "needs DATABASE_URL"]
async fn conditional_update_caps_coupon_usage() {
    let Some(f) = setup().await else { return };
    let second_room = insert_room(&f.pool, &f.hotel, "102").await;

    let code = format!("ONCE-{}", Uuid::new_v4().simple());
    let now = Utc::now();
    let coupon_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO coupons (code, discount_type, discount_value, valid_from, valid_to, usage_limit)
        VALUES ($1, 'percentage', 10, $2, $3, 1)
        RETURNING id
        "#,
    )
    .bind(&code)
    .bind(now - chrono::Duration::days(1))
    .bind(now + chrono::Duration::days(1))
    .fetch_one(&f.pool)
    .await
    .unwrap();

    let f = Arc::new(f);
    let attempts: Vec<_> = [f.room.clone(), second_room]
        .into_iter()
        .map(|room| {
            let f = Arc::clone(&f);
            let code = code.clone();
            tokio::spawn(async move {
                let guest = Actor::guest(Uuid::new_v4());
                let mut req = request(&room, at(2030, 6, 1), at(2030, 6, 3), offline(), 180_000);
                req.coupon_code = Some(code);
                booking_service::create_booking(&f.engine, &guest, req).await
            })
        })
        .collect();

    let mut results = Vec::new();
    for attempt in attempts {
        results.push(attempt.await.unwrap());
    }
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(AppError::Conflict(_))))
    );

    let used: i32 = sqlx::query_scalar("SELECT used_count FROM coupons WHERE id = $1")
        .bind(coupon_id)
        .fetch_one(&f.pool)
        .await
        .unwrap();
    assert_eq!(used, 1);

    let usages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM coupon_usages WHERE coupon_id = $1")
        .bind(coupon_id)
        .fetch_one(&f.pool)
        .await
        .unwrap();
    assert_eq!(usages, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "needs DATABASE_URL"]
async fn wallet_row_lock_keeps_the_ledger_consistent() {
    let Some(f) = setup().await else { return };
    let store = f.engine.store.clone();
    let user = Uuid::new_v4();
    wallet_service::credit(&store, user, 10_000, WalletSource::TopUp, None)
        .await
        .unwrap();

    let tasks: Vec<_> = (0..40)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                if i % 2 == 0 {
                    wallet_service::credit(&store, user, 1_000, WalletSource::Cashback, None).await
                } else {
                    wallet_service::debit(&store, user, 1_500, WalletSource::Booking, None).await
                }
            })
        })
        .collect();

    let mut debits_ok = 0;
    for (i, task) in tasks.into_iter().enumerate() {
        match task.await.unwrap() {
            Ok(_) if i % 2 == 1 => debits_ok += 1,
            Ok(_) => {}
            Err(AppError::InsufficientFunds { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    let report = wallet_service::reconcile_wallet(&store, user).await.unwrap();
    assert!(report.is_consistent());
    assert_eq!(report.balance_cents, 10_000 + 20 * 1_000 - debits_ok * 1_500);
    assert_eq!(report.transaction_count as i64, 1 + 20 + debits_ok);
}
