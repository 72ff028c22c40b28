//! In-process store.
//!
//! A unit of work holds the store-wide mutex from `begin` until commit or
//! drop and edits a private copy of the tables, so units of work are fully
//! serialized and a dropped unit leaves no trace. The uniqueness, exclusion
//! and money `CHECK` constraints of the Postgres schema are reproduced on
//! write: uniqueness and exclusion fail with `Conflict`, a failed `CHECK`
//! with `Database` as it would from Postgres.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    booking::{Booking, PaymentMode},
    coupon::{Coupon, CouponMapping, CouponUsage},
    hotel::{Hotel, PriceAdjustment, Room},
    payment::Payment,
    refund::RefundRequest,
    wallet::{WalletAccount, WalletTransaction},
};
use crate::store::{Store, UnitOfWork};

/// A row the schema's `CHECK` constraints would refuse.
fn check_violation(constraint: &str) -> AppError {
    AppError::Database(sqlx::Error::Protocol(format!(
        "new row violates check constraint \"{}\"",
        constraint
    )))
}

fn check_booking(booking: &Booking) -> Result<(), AppError> {
    if booking.total_cents < 0 || booking.total_cents != booking.base_cents - booking.discount_cents {
        return Err(check_violation("bookings_total_cents_check"));
    }
    if let PaymentMode::Offline {
        advance_cents,
        remaining_cents,
    } = booking.payment_mode
    {
        if advance_cents + remaining_cents != booking.total_cents {
            return Err(check_violation("bookings_payment_mode_check"));
        }
    }
    Ok(())
}

fn check_refund(refund: &RefundRequest) -> Result<(), AppError> {
    let amounts = [
        refund.original_amount_cents,
        refund.cancellation_fee_cents,
        refund.refund_amount_cents,
    ];
    if amounts.iter().any(|a| *a < 0)
        || refund.refund_amount_cents + refund.cancellation_fee_cents != refund.original_amount_cents
    {
        return Err(check_violation("refund_requests_amounts_check"));
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
struct Tables {
    hotels: HashMap<Uuid, Hotel>,
    rooms: HashMap<Uuid, Room>,
    price_adjustments: Vec<PriceAdjustment>,
    bookings: HashMap<Uuid, Booking>,
    coupons: HashMap<Uuid, Coupon>,
    coupon_mappings: Vec<CouponMapping>,
    coupon_usages: Vec<CouponUsage>,
    payments: Vec<Payment>,
    /// Keyed by user id
    wallets: HashMap<Uuid, WalletAccount>,
    wallet_transactions: Vec<WalletTransaction>,
    refunds: HashMap<Uuid, RefundRequest>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_hotel(&self, hotel: Hotel) {
        self.tables.lock().await.hotels.insert(hotel.id, hotel);
    }

    pub async fn add_room(&self, room: Room) {
        self.tables.lock().await.rooms.insert(room.id, room);
    }

    pub async fn add_price_adjustment(&self, adjustment: PriceAdjustment) {
        self.tables.lock().await.price_adjustments.push(adjustment);
    }

    pub async fn add_coupon(&self, coupon: Coupon) {
        self.tables.lock().await.coupons.insert(coupon.id, coupon);
    }

    pub async fn add_coupon_mapping(&self, mapping: CouponMapping) {
        self.tables.lock().await.coupon_mappings.push(mapping);
    }

    pub async fn bookings(&self) -> Vec<Booking> {
        self.tables.lock().await.bookings.values().cloned().collect()
    }

    pub async fn booking(&self, booking_id: Uuid) -> Option<Booking> {
        self.tables.lock().await.bookings.get(&booking_id).cloned()
    }

    pub async fn coupon(&self, coupon_id: Uuid) -> Option<Coupon> {
        self.tables.lock().await.coupons.get(&coupon_id).cloned()
    }

    pub async fn coupon_usages(&self) -> Vec<CouponUsage> {
        self.tables.lock().await.coupon_usages.clone()
    }

    pub async fn payments(&self) -> Vec<Payment> {
        self.tables.lock().await.payments.clone()
    }

    pub async fn refunds(&self) -> Vec<RefundRequest> {
        self.tables.lock().await.refunds.values().cloned().collect()
    }

    pub async fn wallet(&self, user_id: Uuid) -> Option<WalletAccount> {
        self.tables.lock().await.wallets.get(&user_id).cloned()
    }

    pub async fn wallet_transactions(&self) -> Vec<WalletTransaction> {
        self.tables.lock().await.wallet_transactions.clone()
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl Store for MemoryStore {
    type Uow = MemoryUnitOfWork;

    async fn begin(&self) -> Result<Self::Uow, AppError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryUnitOfWork { guard, working })
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self) -> Result<(), AppError> {
        let MemoryUnitOfWork { mut guard, working } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), AppError> {
        Ok(())
    }

    async fn find_hotel(&mut self, hotel_id: Uuid) -> Result<Option<Hotel>, AppError> {
        Ok(self.working.hotels.get(&hotel_id).cloned())
    }

    async fn find_room(&mut self, room_id: Uuid) -> Result<Option<Room>, AppError> {
        Ok(self.working.rooms.get(&room_id).cloned())
    }

    async fn lock_room(&mut self, room_id: Uuid) -> Result<Option<Room>, AppError> {
        // The store-wide guard already excludes every other writer.
        self.find_room(room_id).await
    }

    async fn active_price_adjustments(&mut self) -> Result<Vec<PriceAdjustment>, AppError> {
        let mut adjustments: Vec<PriceAdjustment> = self
            .working
            .price_adjustments
            .iter()
            .filter(|a| a.is_active)
            .cloned()
            .collect();
        adjustments.sort_by_key(|a| a.created_at);
        Ok(adjustments)
    }

    async fn active_bookings_for_room(&mut self, room_id: Uuid) -> Result<Vec<Booking>, AppError> {
        Ok(self
            .working
            .bookings
            .values()
            .filter(|b| b.room_id == room_id && b.is_active())
            .cloned()
            .collect())
    }

    async fn find_booking(&mut self, booking_id: Uuid) -> Result<Option<Booking>, AppError> {
        Ok(self.working.bookings.get(&booking_id).cloned())
    }

    async fn lock_booking(&mut self, booking_id: Uuid) -> Result<Option<Booking>, AppError> {
        self.find_booking(booking_id).await
    }

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), AppError> {
        check_booking(booking)?;
        let collides = self.working.bookings.values().any(|existing| {
            existing.room_id == booking.room_id
                && existing.is_active()
                && existing.stay().overlaps(booking.check_in, booking.check_out)
        });
        if collides {
            return Err(AppError::Conflict(
                "Room is already booked for the requested dates".to_string(),
            ));
        }
        self.working.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn update_booking(&mut self, booking: &Booking) -> Result<(), AppError> {
        check_booking(booking)?;
        match self.working.bookings.get_mut(&booking.id) {
            Some(existing) => {
                *existing = booking.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("booking")),
        }
    }

    async fn find_coupon_by_code(&mut self, code: &str) -> Result<Option<Coupon>, AppError> {
        Ok(self
            .working
            .coupons
            .values()
            .find(|c| c.code.eq_ignore_ascii_case(code))
            .cloned())
    }

    async fn coupon_mappings(&mut self, coupon_id: Uuid) -> Result<Vec<CouponMapping>, AppError> {
        Ok(self
            .working
            .coupon_mappings
            .iter()
            .filter(|m| m.coupon_id == coupon_id)
            .cloned()
            .collect())
    }

    async fn has_coupon_usage(&mut self, coupon_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        Ok(self
            .working
            .coupon_usages
            .iter()
            .any(|u| u.coupon_id == coupon_id && u.user_id == user_id))
    }

    async fn try_increment_coupon_usage(&mut self, coupon_id: Uuid) -> Result<bool, AppError> {
        let coupon = self
            .working
            .coupons
            .get_mut(&coupon_id)
            .ok_or(AppError::NotFound("coupon"))?;
        if coupon.is_exhausted() {
            return Ok(false);
        }
        coupon.used_count += 1;
        Ok(true)
    }

    async fn insert_coupon_usage(&mut self, usage: &CouponUsage) -> Result<(), AppError> {
        if self
            .working
            .coupon_usages
            .iter()
            .any(|u| u.coupon_id == usage.coupon_id && u.user_id == usage.user_id)
        {
            return Err(AppError::Conflict(
                "Coupon has already been used by this guest".to_string(),
            ));
        }
        self.working.coupon_usages.push(usage.clone());
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), AppError> {
        if payment.amount_cents <= 0 {
            return Err(check_violation("payments_amount_cents_check"));
        }
        self.working.payments.push(payment.clone());
        Ok(())
    }

    async fn payments_for_booking(&mut self, booking_id: Uuid) -> Result<Vec<Payment>, AppError> {
        Ok(self
            .working
            .payments
            .iter()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn lock_payment(&mut self, payment_id: Uuid) -> Result<Option<Payment>, AppError> {
        Ok(self
            .working
            .payments
            .iter()
            .find(|p| p.id == payment_id)
            .cloned())
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<(), AppError> {
        match self.working.payments.iter_mut().find(|p| p.id == payment.id) {
            Some(existing) => {
                *existing = payment.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("payment")),
        }
    }

    async fn lock_or_create_wallet(&mut self, user_id: Uuid) -> Result<WalletAccount, AppError> {
        Ok(self
            .working
            .wallets
            .entry(user_id)
            .or_insert_with(|| WalletAccount::empty(user_id, Utc::now()))
            .clone())
    }

    async fn find_wallet(&mut self, user_id: Uuid) -> Result<Option<WalletAccount>, AppError> {
        Ok(self.working.wallets.get(&user_id).cloned())
    }

    async fn save_wallet(&mut self, wallet: &WalletAccount) -> Result<(), AppError> {
        if wallet.balance_cents < 0
            || wallet.balance_cents != wallet.total_earned_cents - wallet.total_spent_cents
        {
            return Err(check_violation("wallets_balance_cents_check"));
        }
        self.working.wallets.insert(wallet.user_id, wallet.clone());
        Ok(())
    }

    async fn append_wallet_transaction(&mut self, entry: &WalletTransaction) -> Result<(), AppError> {
        if entry.amount_cents <= 0 || entry.balance_after_cents < 0 {
            return Err(check_violation("wallet_transactions_amount_cents_check"));
        }
        self.working.wallet_transactions.push(entry.clone());
        Ok(())
    }

    async fn wallet_transactions(&mut self, wallet_id: Uuid) -> Result<Vec<WalletTransaction>, AppError> {
        Ok(self
            .working
            .wallet_transactions
            .iter()
            .filter(|t| t.wallet_id == wallet_id)
            .cloned()
            .collect())
    }

    async fn find_refund_for_booking(&mut self, booking_id: Uuid) -> Result<Option<RefundRequest>, AppError> {
        Ok(self
            .working
            .refunds
            .values()
            .find(|r| r.booking_id == booking_id)
            .cloned())
    }

    async fn lock_refund(&mut self, refund_id: Uuid) -> Result<Option<RefundRequest>, AppError> {
        Ok(self.working.refunds.get(&refund_id).cloned())
    }

    async fn insert_refund(&mut self, refund: &RefundRequest) -> Result<(), AppError> {
        check_refund(refund)?;
        if self
            .working
            .refunds
            .values()
            .any(|r| r.booking_id == refund.booking_id)
        {
            return Err(AppError::Conflict(
                "A refund request already exists for this booking".to_string(),
            ));
        }
        self.working.refunds.insert(refund.id, refund.clone());
        Ok(())
    }

    async fn update_refund(&mut self, refund: &RefundRequest) -> Result<(), AppError> {
        check_refund(refund)?;
        match self.working.refunds.get_mut(&refund.id) {
            Some(existing) => {
                *existing = refund.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("refund request")),
        }
    }
}
