//! PostgreSQL store.
//!
//! A unit of work is a sqlx transaction. Row locks are taken with
//! `SELECT ... FOR UPDATE`; the schema adds an exclusion constraint on active
//! bookings per room and unique indexes on coupon usage and refund requests,
//! whose violations surface here as `AppError::Conflict`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::{
    booking::{Booking, BookingStatus, BookingType, PaymentChannel, PaymentMode, PaymentStatus},
    coupon::{Coupon, CouponMapping, CouponUsage},
    hotel::{Hotel, PriceAdjustment, Room},
    payment::Payment,
    refund::RefundRequest,
    wallet::{WalletAccount, WalletTransaction},
};
use crate::store::{Store, UnitOfWork};

/// Postgres error codes mapped to `Conflict`.
const UNIQUE_VIOLATION: &str = "23505";
const EXCLUSION_VIOLATION: &str = "23P01";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl Store for PgStore {
    type Uow = PgUnitOfWork;

    async fn begin(&self) -> Result<Self::Uow, AppError> {
        let tx = self.pool.begin().await?;
        Ok(PgUnitOfWork { tx })
    }
}

/// Translate constraint violations into conflicts, keep everything else.
fn map_write_error(error: sqlx::Error, conflict_message: &str) -> AppError {
    let is_conflict = error
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION || code == EXCLUSION_VIOLATION);

    if is_conflict {
        AppError::Conflict(conflict_message.to_string())
    } else {
        AppError::Database(error)
    }
}

/// Flat row shape of the `bookings` table.
#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    room_id: Uuid,
    hotel_id: Uuid,
    user_id: Uuid,
    booking_type: BookingType,
    check_in: DateTime<Utc>,
    check_out: DateTime<Utc>,
    guest_count: i32,
    base_cents: i64,
    discount_cents: i64,
    total_cents: i64,
    coupon_id: Option<Uuid>,
    payment_mode: PaymentChannel,
    advance_cents: Option<i64>,
    remaining_cents: Option<i64>,
    status: BookingStatus,
    payment_status: PaymentStatus,
    cancelled_at: Option<DateTime<Utc>>,
    cancelled_by: Option<Uuid>,
    cancellation_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        let payment_mode = match row.payment_mode {
            PaymentChannel::Online => PaymentMode::Online,
            PaymentChannel::Offline => PaymentMode::Offline {
                advance_cents: row.advance_cents.unwrap_or(0),
                remaining_cents: row.remaining_cents.unwrap_or(row.total_cents),
            },
        };

        Booking {
            id: row.id,
            room_id: row.room_id,
            hotel_id: row.hotel_id,
            user_id: row.user_id,
            booking_type: row.booking_type,
            check_in: row.check_in,
            check_out: row.check_out,
            guest_count: row.guest_count,
            base_cents: row.base_cents,
            discount_cents: row.discount_cents,
            total_cents: row.total_cents,
            coupon_id: row.coupon_id,
            payment_mode,
            status: row.status,
            payment_status: row.payment_status,
            cancelled_at: row.cancelled_at,
            cancelled_by: row.cancelled_by,
            cancellation_reason: row.cancellation_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn split_of(mode: &PaymentMode) -> (Option<i64>, Option<i64>) {
    match *mode {
        PaymentMode::Online => (None, None),
        PaymentMode::Offline {
            advance_cents,
            remaining_cents,
        } => (Some(advance_cents), Some(remaining_cents)),
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), AppError> {
        self.tx.rollback().await?;
        Ok(())
    }

    async fn find_hotel(&mut self, hotel_id: Uuid) -> Result<Option<Hotel>, AppError> {
        let hotel = sqlx::query_as::<_, Hotel>(
            r#"
            SELECT id, owner_id, city_id, name, online_payment_enabled, offline_payment_enabled,
                   cancellation_time_hours, cancellation_fee_percentage
            FROM hotels
            WHERE id = $1
            "#,
        )
        .bind(hotel_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(hotel)
    }

    async fn find_room(&mut self, room_id: Uuid) -> Result<Option<Room>, AppError> {
        let room = sqlx::query_as::<_, Room>(
            r#"
            SELECT id, hotel_id, room_type_id, room_number, price_per_night_cents,
                   price_per_hour_cents, capacity, status
            FROM rooms
            WHERE id = $1
            "#,
        )
        .bind(room_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(room)
    }

    async fn lock_room(&mut self, room_id: Uuid) -> Result<Option<Room>, AppError> {
        // FOR UPDATE serializes every booking attempt on this room
        let room = sqlx::query_as::<_, Room>(
            r#"
            SELECT id, hotel_id, room_type_id, room_number, price_per_night_cents,
                   price_per_hour_cents, capacity, status
            FROM rooms
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(room_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(room)
    }

    async fn active_price_adjustments(&mut self) -> Result<Vec<PriceAdjustment>, AppError> {
        let adjustments = sqlx::query_as::<_, PriceAdjustment>(
            "SELECT * FROM price_adjustments WHERE is_active = true ORDER BY created_at, id",
        )
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(adjustments)
    }

    async fn active_bookings_for_room(&mut self, room_id: Uuid) -> Result<Vec<Booking>, AppError> {
        let rows = sqlx::query_as::<_, BookingRow>(
            "SELECT * FROM bookings WHERE room_id = $1 AND status <> 'cancelled'",
        )
        .bind(room_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Booking::from).collect())
    }

    async fn find_booking(&mut self, booking_id: Uuid) -> Result<Option<Booking>, AppError> {
        let row = sqlx::query_as::<_, BookingRow>("SELECT * FROM bookings WHERE id = $1")
            .bind(booking_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(Booking::from))
    }

    async fn lock_booking(&mut self, booking_id: Uuid) -> Result<Option<Booking>, AppError> {
        let row = sqlx::query_as::<_, BookingRow>("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
            .bind(booking_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(Booking::from))
    }

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), AppError> {
        let (advance, remaining) = split_of(&booking.payment_mode);

        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, room_id, hotel_id, user_id, booking_type, check_in, check_out,
                guest_count, base_cents, discount_cents, total_cents, coupon_id,
                payment_mode, advance_cents, remaining_cents, status, payment_status,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(booking.id)
        .bind(booking.room_id)
        .bind(booking.hotel_id)
        .bind(booking.user_id)
        .bind(booking.booking_type)
        .bind(booking.check_in)
        .bind(booking.check_out)
        .bind(booking.guest_count)
        .bind(booking.base_cents)
        .bind(booking.discount_cents)
        .bind(booking.total_cents)
        .bind(booking.coupon_id)
        .bind(booking.payment_mode.channel())
        .bind(advance)
        .bind(remaining)
        .bind(booking.status)
        .bind(booking.payment_status)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, "Room is already booked for the requested dates"))?;

        Ok(())
    }

    async fn update_booking(&mut self, booking: &Booking) -> Result<(), AppError> {
        let updated = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $1,
                payment_status = $2,
                cancelled_at = $3,
                cancelled_by = $4,
                cancellation_reason = $5,
                updated_at = $6
            WHERE id = $7
            "#,
        )
        .bind(booking.status)
        .bind(booking.payment_status)
        .bind(booking.cancelled_at)
        .bind(booking.cancelled_by)
        .bind(&booking.cancellation_reason)
        .bind(booking.updated_at)
        .bind(booking.id)
        .execute(&mut *self.tx)
        .await
        // Reinstating a cancelled booking can collide with a newer one
        .map_err(|e| map_write_error(e, "Room is already booked for the requested dates"))?
        .rows_affected();

        if updated == 0 {
            return Err(AppError::NotFound("booking"));
        }
        Ok(())
    }

    async fn find_coupon_by_code(&mut self, code: &str) -> Result<Option<Coupon>, AppError> {
        let coupon = sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE lower(code) = lower($1)")
            .bind(code)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(coupon)
    }

    async fn coupon_mappings(&mut self, coupon_id: Uuid) -> Result<Vec<CouponMapping>, AppError> {
        let mappings = sqlx::query_as::<_, CouponMapping>(
            "SELECT id, coupon_id, city_id, hotel_id, room_type_id FROM coupon_mappings WHERE coupon_id = $1",
        )
        .bind(coupon_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(mappings)
    }

    async fn has_coupon_usage(&mut self, coupon_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let used: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM coupon_usages WHERE coupon_id = $1 AND user_id = $2)",
        )
        .bind(coupon_id)
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(used)
    }

    async fn try_increment_coupon_usage(&mut self, coupon_id: Uuid) -> Result<bool, AppError> {
        // Check and increment in one statement; concurrent callers queue on the row lock
        let updated = sqlx::query(
            r#"
            UPDATE coupons
            SET used_count = used_count + 1
            WHERE id = $1
              AND (usage_limit IS NULL OR used_count < usage_limit)
            "#,
        )
        .bind(coupon_id)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }

    async fn insert_coupon_usage(&mut self, usage: &CouponUsage) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO coupon_usages (id, coupon_id, booking_id, user_id, discount_cents, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(usage.id)
        .bind(usage.coupon_id)
        .bind(usage.booking_id)
        .bind(usage.user_id)
        .bind(usage.discount_cents)
        .bind(usage.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, "Coupon has already been used by this guest"))?;

        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, booking_id, amount_cents, channel, payment_type, status,
                gateway_order_id, gateway_payment_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(payment.id)
        .bind(payment.booking_id)
        .bind(payment.amount_cents)
        .bind(payment.channel)
        .bind(payment.payment_type)
        .bind(payment.status)
        .bind(&payment.gateway_order_id)
        .bind(&payment.gateway_payment_id)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn payments_for_booking(&mut self, booking_id: Uuid) -> Result<Vec<Payment>, AppError> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE booking_id = $1 ORDER BY created_at, id",
        )
        .bind(booking_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(payments)
    }

    async fn lock_payment(&mut self, payment_id: Uuid) -> Result<Option<Payment>, AppError> {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
            .bind(payment_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(payment)
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<(), AppError> {
        let updated = sqlx::query(
            r#"
            UPDATE payments
            SET status = $1,
                gateway_payment_id = $2,
                updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(payment.status)
        .bind(&payment.gateway_payment_id)
        .bind(payment.updated_at)
        .bind(payment.id)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(AppError::NotFound("payment"));
        }
        Ok(())
    }

    async fn lock_or_create_wallet(&mut self, user_id: Uuid) -> Result<WalletAccount, AppError> {
        // Create lazily; a concurrent creator wins and we lock its row instead
        sqlx::query(
            r#"
            INSERT INTO wallets (id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;

        let wallet = sqlx::query_as::<_, WalletAccount>(
            "SELECT * FROM wallets WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(wallet)
    }

    async fn find_wallet(&mut self, user_id: Uuid) -> Result<Option<WalletAccount>, AppError> {
        let wallet = sqlx::query_as::<_, WalletAccount>("SELECT * FROM wallets WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(wallet)
    }

    async fn save_wallet(&mut self, wallet: &WalletAccount) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE wallets
            SET balance_cents = $1,
                total_earned_cents = $2,
                total_spent_cents = $3,
                updated_at = $4
            WHERE id = $5
            "#,
        )
        .bind(wallet.balance_cents)
        .bind(wallet.total_earned_cents)
        .bind(wallet.total_spent_cents)
        .bind(wallet.updated_at)
        .bind(wallet.id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn append_wallet_transaction(&mut self, entry: &WalletTransaction) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO wallet_transactions (
                id, wallet_id, user_id, direction, amount_cents, balance_after_cents,
                source, reference, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id)
        .bind(entry.wallet_id)
        .bind(entry.user_id)
        .bind(entry.direction)
        .bind(entry.amount_cents)
        .bind(entry.balance_after_cents)
        .bind(entry.source)
        .bind(&entry.reference)
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn wallet_transactions(&mut self, wallet_id: Uuid) -> Result<Vec<WalletTransaction>, AppError> {
        // seq is a BIGSERIAL, so it orders rows written within the same microsecond
        let entries = sqlx::query_as::<_, WalletTransaction>(
            r#"
            SELECT id, wallet_id, user_id, direction, amount_cents, balance_after_cents,
                   source, reference, created_at
            FROM wallet_transactions
            WHERE wallet_id = $1
            ORDER BY seq
            "#,
        )
        .bind(wallet_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(entries)
    }

    async fn find_refund_for_booking(&mut self, booking_id: Uuid) -> Result<Option<RefundRequest>, AppError> {
        let refund = sqlx::query_as::<_, RefundRequest>("SELECT * FROM refund_requests WHERE booking_id = $1")
            .bind(booking_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(refund)
    }

    async fn lock_refund(&mut self, refund_id: Uuid) -> Result<Option<RefundRequest>, AppError> {
        let refund = sqlx::query_as::<_, RefundRequest>("SELECT * FROM refund_requests WHERE id = $1 FOR UPDATE")
            .bind(refund_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(refund)
    }

    async fn insert_refund(&mut self, refund: &RefundRequest) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO refund_requests (
                id, booking_id, user_id, original_amount_cents, cancellation_fee_cents,
                refund_amount_cents, reason, refund_type, refund_method, status,
                requested_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(refund.id)
        .bind(refund.booking_id)
        .bind(refund.user_id)
        .bind(refund.original_amount_cents)
        .bind(refund.cancellation_fee_cents)
        .bind(refund.refund_amount_cents)
        .bind(&refund.reason)
        .bind(refund.refund_type)
        .bind(refund.refund_method)
        .bind(refund.status)
        .bind(refund.requested_by)
        .bind(refund.created_at)
        .bind(refund.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, "A refund request already exists for this booking"))?;

        Ok(())
    }

    async fn update_refund(&mut self, refund: &RefundRequest) -> Result<(), AppError> {
        let updated = sqlx::query(
            r#"
            UPDATE refund_requests
            SET status = $1,
                refund_method = $2,
                processed_by = $3,
                processed_at = $4,
                rejection_reason = $5,
                gateway_refund_id = $6,
                wallet_transaction_id = $7,
                updated_at = $8
            WHERE id = $9
            "#,
        )
        .bind(refund.status)
        .bind(refund.refund_method)
        .bind(refund.processed_by)
        .bind(refund.processed_at)
        .bind(&refund.rejection_reason)
        .bind(&refund.gateway_refund_id)
        .bind(refund.wallet_transaction_id)
        .bind(refund.updated_at)
        .bind(refund.id)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(AppError::NotFound("refund request"));
        }
        Ok(())
    }
}
