//! Coupon data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::booking::BookingType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "discount_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "coupon_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CouponStatus {
    Active,
    Inactive,
}

/// Booking types a coupon may be redeemed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "coupon_booking_scope", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CouponBookingScope {
    Daily,
    Hourly,
    Both,
}

impl CouponBookingScope {
    pub fn allows(self, booking_type: BookingType) -> bool {
        match self {
            CouponBookingScope::Both => true,
            CouponBookingScope::Daily => booking_type == BookingType::Daily,
            CouponBookingScope::Hourly => booking_type == BookingType::Hourly,
        }
    }
}

/// A discount code.
///
/// # Invariants
///
/// - `used_count <= usage_limit` whenever a limit is set
/// - `valid_from <= valid_to`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Coupon {
    pub id: Uuid,

    /// Unique, matched case-insensitively
    pub code: String,

    pub discount_type: DiscountType,

    /// Percent for `Percentage`, cents for `Fixed`
    pub discount_value: f64,

    /// Cap on a percentage discount, in cents
    pub max_discount_cents: Option<i64>,

    pub min_order_cents: i64,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,

    /// `None` means unlimited
    pub usage_limit: Option<i32>,

    pub used_count: i32,
    pub applicable_booking_types: CouponBookingScope,
    pub status: CouponStatus,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    pub fn is_exhausted(&self) -> bool {
        self.usage_limit.is_some_and(|limit| self.used_count >= limit)
    }
}

/// Restricts a coupon to a city, a hotel, or a room type.
///
/// Exactly one target column is expected to be set per row.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct CouponMapping {
    pub id: Uuid,
    pub coupon_id: Uuid,
    pub city_id: Option<Uuid>,
    pub hotel_id: Option<Uuid>,
    pub room_type_id: Option<Uuid>,
}

/// Record of one coupon redemption.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct CouponUsage {
    pub id: Uuid,
    pub coupon_id: Uuid,
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub discount_cents: i64,
    pub created_at: DateTime<Utc>,
}
