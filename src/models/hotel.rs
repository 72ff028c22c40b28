//! Hotel, room and price-adjustment records.
//!
//! These rows are owned by hotel-management CRUD, which lives outside this
//! crate. The engine only reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A hotel and the policy knobs the engine cares about.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Hotel {
    pub id: Uuid,

    /// User id of the hotel owner; only this user may act as the hotel.
    pub owner_id: Uuid,

    /// City the hotel is in, used by city-scoped coupons and adjustments.
    pub city_id: Option<Uuid>,

    pub name: String,

    pub online_payment_enabled: bool,

    pub offline_payment_enabled: bool,

    /// Cancellations closer than this many hours to check-in pay a fee.
    pub cancellation_time_hours: i32,

    /// Fee charged inside the cancellation window, in percent of the amount paid.
    pub cancellation_fee_percentage: f64,
}

/// Room lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "room_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Available,
    Occupied,
    Maintenance,
    OutOfOrder,
}

impl RoomStatus {
    /// Whether new stays may be booked on the room.
    ///
    /// `Occupied` describes the room today, not the requested dates, so it
    /// stays bookable and the overlap check decides.
    pub fn is_bookable(self) -> bool {
        matches!(self, RoomStatus::Available | RoomStatus::Occupied)
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub room_type_id: Option<Uuid>,
    pub room_number: String,
    pub price_per_night_cents: i64,
    pub price_per_hour_cents: Option<i64>,
    pub capacity: i32,
    pub status: RoomStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "adjustment_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    Percentage,
    Fixed,
}

/// A surcharge or markdown applied on top of the room rate.
///
/// Each scope column that is set must agree with the room being priced;
/// unset scopes match everything. A rule with no scope is global.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct PriceAdjustment {
    pub id: Uuid,
    pub name: String,
    pub adjustment_type: AdjustmentType,

    /// Percent for `Percentage`, cents for `Fixed`. Negative values discount.
    pub value: f64,

    pub hotel_id: Option<Uuid>,
    pub city_id: Option<Uuid>,
    pub room_type_id: Option<Uuid>,
    pub is_active: bool,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PriceAdjustment {
    /// Whether this adjustment applies to `room` at `hotel` for a stay
    /// starting at `check_in`.
    pub fn applies_to(&self, hotel: &Hotel, room: &Room, check_in: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        if self.valid_from.is_some_and(|from| check_in < from)
            || self.valid_to.is_some_and(|to| check_in > to)
        {
            return false;
        }

        let scope_matches = |scope: Option<Uuid>, actual: Option<Uuid>| match scope {
            None => true,
            Some(id) => actual == Some(id),
        };

        scope_matches(self.hotel_id, Some(hotel.id))
            && scope_matches(self.city_id, hotel.city_id)
            && scope_matches(self.room_type_id, room.room_type_id)
    }
}
