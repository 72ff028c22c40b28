//! Persistent store abstraction.
//!
//! All engine reads and writes go through a [`UnitOfWork`]: one atomic,
//! isolated transaction that is committed exactly once by the operation that
//! opened it. Dropping a unit of work without committing rolls it back.
//!
//! Two implementations exist:
//! - [`PgStore`]: PostgreSQL through sqlx, with row locks, a conditional
//!   coupon increment and constraint backstops
//! - [`MemoryStore`]: an in-process store that serializes units of work, used
//!   by the test suite

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    booking::Booking,
    coupon::{Coupon, CouponMapping, CouponUsage},
    hotel::{Hotel, PriceAdjustment, Room},
    payment::Payment,
    refund::RefundRequest,
    wallet::{WalletAccount, WalletTransaction},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Factory for units of work.
#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    type Uow: UnitOfWork;

    /// Open a new unit of work.
    async fn begin(&self) -> Result<Self::Uow, AppError>;
}

/// One atomic transaction against the store.
///
/// Methods named `lock_*` take a write lock on the row that is held until
/// commit or rollback, serializing concurrent writers of that row.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn commit(self) -> Result<(), AppError>;

    async fn rollback(self) -> Result<(), AppError>;

    // Hotels and rooms (read-only)

    async fn find_hotel(&mut self, hotel_id: Uuid) -> Result<Option<Hotel>, AppError>;

    async fn find_room(&mut self, room_id: Uuid) -> Result<Option<Room>, AppError>;

    /// Lock the room row so that availability check and booking insert
    /// cannot interleave with another booking of the same room.
    async fn lock_room(&mut self, room_id: Uuid) -> Result<Option<Room>, AppError>;

    /// Active price adjustments, oldest first.
    async fn active_price_adjustments(&mut self) -> Result<Vec<PriceAdjustment>, AppError>;

    // Bookings

    /// All non-cancelled bookings of a room.
    async fn active_bookings_for_room(&mut self, room_id: Uuid) -> Result<Vec<Booking>, AppError>;

    async fn find_booking(&mut self, booking_id: Uuid) -> Result<Option<Booking>, AppError>;

    async fn lock_booking(&mut self, booking_id: Uuid) -> Result<Option<Booking>, AppError>;

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), AppError>;

    /// Persist status, payment status and cancellation fields.
    async fn update_booking(&mut self, booking: &Booking) -> Result<(), AppError>;

    // Coupons

    async fn find_coupon_by_code(&mut self, code: &str) -> Result<Option<Coupon>, AppError>;

    async fn coupon_mappings(&mut self, coupon_id: Uuid) -> Result<Vec<CouponMapping>, AppError>;

    async fn has_coupon_usage(&mut self, coupon_id: Uuid, user_id: Uuid) -> Result<bool, AppError>;

    /// Increment `used_count` only if it is below `usage_limit`.
    ///
    /// Returns `false` when the coupon is exhausted. The check and the
    /// increment are a single store operation.
    async fn try_increment_coupon_usage(&mut self, coupon_id: Uuid) -> Result<bool, AppError>;

    /// Fails with `Conflict` if the guest already used this coupon.
    async fn insert_coupon_usage(&mut self, usage: &CouponUsage) -> Result<(), AppError>;

    // Payments

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), AppError>;

    async fn payments_for_booking(&mut self, booking_id: Uuid) -> Result<Vec<Payment>, AppError>;

    async fn lock_payment(&mut self, payment_id: Uuid) -> Result<Option<Payment>, AppError>;

    async fn update_payment(&mut self, payment: &Payment) -> Result<(), AppError>;

    // Wallets

    /// Lock the user's wallet, creating an empty one first if needed.
    async fn lock_or_create_wallet(&mut self, user_id: Uuid) -> Result<WalletAccount, AppError>;

    async fn find_wallet(&mut self, user_id: Uuid) -> Result<Option<WalletAccount>, AppError>;

    async fn save_wallet(&mut self, wallet: &WalletAccount) -> Result<(), AppError>;

    async fn append_wallet_transaction(&mut self, entry: &WalletTransaction) -> Result<(), AppError>;

    /// Ledger rows of a wallet in creation order.
    async fn wallet_transactions(&mut self, wallet_id: Uuid) -> Result<Vec<WalletTransaction>, AppError>;

    // Refunds

    async fn find_refund_for_booking(&mut self, booking_id: Uuid) -> Result<Option<RefundRequest>, AppError>;

    async fn lock_refund(&mut self, refund_id: Uuid) -> Result<Option<RefundRequest>, AppError>;

    /// Fails with `Conflict` if the booking already has a refund request.
    async fn insert_refund(&mut self, refund: &RefundRequest) -> Result<(), AppError>;

    async fn update_refund(&mut self, refund: &RefundRequest) -> Result<(), AppError>;
}
