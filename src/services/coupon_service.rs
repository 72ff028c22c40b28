//! Coupon eligibility, discount computation and redemption.
//!
//! # Check Order
//!
//! First failure wins:
//! 1. coupon exists
//! 2. coupon is active
//! 3. guest has not used it before
//! 4. now is inside `[valid_from, valid_to]`
//! 5. usage limit not reached
//! 6. order meets the minimum amount
//! 7. booking type is allowed
//! 8. a mapping matches the hotel, its city, or the room type (no mappings
//!    means valid everywhere)

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    booking::BookingType,
    coupon::{Coupon, CouponMapping, CouponStatus, CouponUsage, DiscountType},
    hotel::Hotel,
};
use crate::store::UnitOfWork;

/// Why a coupon was refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CouponError {
    #[error("Coupon not found")]
    NotFound,

    #[error("Coupon is not active")]
    Inactive,

    #[error("Coupon has already been used by this guest")]
    AlreadyUsed,

    #[error("Coupon is not valid at this time")]
    OutsideValidity,

    #[error("Coupon usage limit has been reached")]
    Exhausted,

    #[error("Order amount {order_cents} is below the coupon minimum of {min_order_cents}")]
    BelowMinimum { order_cents: i64, min_order_cents: i64 },

    #[error("Coupon does not apply to {0:?} bookings")]
    WrongBookingType(BookingType),

    #[error("Coupon does not apply to this hotel or room type")]
    NotApplicable,
}

impl From<CouponError> for AppError {
    fn from(error: CouponError) -> Self {
        match error {
            CouponError::NotFound => AppError::NotFound("coupon"),
            CouponError::AlreadyUsed | CouponError::Exhausted => AppError::Conflict(error.to_string()),
            other => AppError::Validation(other.to_string()),
        }
    }
}

/// What the coupon is being applied to.
#[derive(Debug, Clone, Copy)]
pub struct CouponTarget<'a> {
    pub hotel: &'a Hotel,
    pub room_type_id: Option<Uuid>,
    pub order_cents: i64,
    pub user_id: Uuid,
    pub booking_type: BookingType,
}

/// An accepted coupon and its effect on the order.
#[derive(Debug, Clone, Serialize)]
pub struct CouponQuote {
    pub coupon: Coupon,
    pub discount_cents: i64,
    pub final_cents: i64,
}

/// A coupon with no mappings is valid everywhere.
pub fn mapping_matches(mappings: &[CouponMapping], hotel: &Hotel, room_type_id: Option<Uuid>) -> bool {
    if mappings.is_empty() {
        return true;
    }

    mappings.iter().any(|m| {
        m.hotel_id == Some(hotel.id)
            || (m.room_type_id.is_some() && m.room_type_id == room_type_id)
            || (m.city_id.is_some() && m.city_id == hotel.city_id)
    })
}

/// Discount for `order_cents`, never more than the order itself.
pub fn compute_discount(coupon: &Coupon, order_cents: i64) -> i64 {
    let raw = match coupon.discount_type {
        DiscountType::Percentage => {
            let percent_off = (order_cents as f64 * coupon.discount_value / 100.0).round() as i64;
            match coupon.max_discount_cents {
                Some(cap) => percent_off.min(cap),
                None => percent_off,
            }
        }
        DiscountType::Fixed => coupon.discount_value.round() as i64,
    };

    raw.clamp(0, order_cents.max(0))
}

/// Run the eligibility checks on already-loaded data.
pub fn check_eligibility(
    coupon: &Coupon,
    mappings: &[CouponMapping],
    already_used: bool,
    target: &CouponTarget<'_>,
    now: DateTime<Utc>,
) -> Result<(), CouponError> {
    if coupon.status != CouponStatus::Active {
        return Err(CouponError::Inactive);
    }
    if already_used {
        return Err(CouponError::AlreadyUsed);
    }
    if now < coupon.valid_from || now > coupon.valid_to {
        return Err(CouponError::OutsideValidity);
    }
    if coupon.is_exhausted() {
        return Err(CouponError::Exhausted);
    }
    if target.order_cents < coupon.min_order_cents {
        return Err(CouponError::BelowMinimum {
            order_cents: target.order_cents,
            min_order_cents: coupon.min_order_cents,
        });
    }
    if !coupon.applicable_booking_types.allows(target.booking_type) {
        return Err(CouponError::WrongBookingType(target.booking_type));
    }
    if !mapping_matches(mappings, target.hotel, target.room_type_id) {
        return Err(CouponError::NotApplicable);
    }
    Ok(())
}

/// Validate a coupon code against an order and compute the discount.
///
/// Reads only. The usage-limit check here is advisory; the binding check is
/// the conditional increment in [`redeem_coupon`].
pub async fn validate_coupon<U: UnitOfWork>(
    uow: &mut U,
    code: &str,
    target: &CouponTarget<'_>,
    now: DateTime<Utc>,
) -> Result<CouponQuote, AppError> {
    let coupon = uow
        .find_coupon_by_code(code.trim())
        .await?
        .ok_or(CouponError::NotFound)?;

    let already_used = uow.has_coupon_usage(coupon.id, target.user_id).await?;
    let mappings = uow.coupon_mappings(coupon.id).await?;

    if let Err(rejection) = check_eligibility(&coupon, &mappings, already_used, target, now) {
        tracing::warn!(code = %coupon.code, user_id = %target.user_id, "Coupon rejected: {}", rejection);
        return Err(rejection.into());
    }

    let discount_cents = compute_discount(&coupon, target.order_cents);
    Ok(CouponQuote {
        discount_cents,
        final_cents: target.order_cents - discount_cents,
        coupon,
    })
}

/// Consume one use of the coupon for `booking_id`.
///
/// Must run in the same unit of work as the booking insert. Fails with
/// `Conflict` if the last slot was taken concurrently or the guest already
/// redeemed the coupon.
pub async fn redeem_coupon<U: UnitOfWork>(
    uow: &mut U,
    quote: &CouponQuote,
    booking_id: Uuid,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<CouponUsage, AppError> {
    if !uow.try_increment_coupon_usage(quote.coupon.id).await? {
        return Err(CouponError::Exhausted.into());
    }

    let usage = CouponUsage {
        id: Uuid::new_v4(),
        coupon_id: quote.coupon.id,
        booking_id,
        user_id,
        discount_cents: quote.discount_cents,
        created_at: now,
    };
    uow.insert_coupon_usage(&usage).await?;

    Ok(usage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::coupon::CouponBookingScope;
    use chrono::Duration;

    fn hotel() -> Hotel {
        Hotel {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            city_id: Some(Uuid::new_v4()),
            name: "Seaside".to_string(),
            online_payment_enabled: true,
            offline_payment_enabled: true,
            cancellation_time_hours: 24,
            cancellation_fee_percentage: 20.0,
        }
    }

    fn coupon(discount_type: DiscountType, value: f64) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: Uuid::new_v4(),
            code: "SAVE10".to_string(),
            discount_type,
            discount_value: value,
            max_discount_cents: None,
            min_order_cents: 0,
            valid_from: now - Duration::days(1),
            valid_to: now + Duration::days(1),
            usage_limit: None,
            used_count: 0,
            applicable_booking_types: CouponBookingScope::Both,
            status: CouponStatus::Active,
            created_at: now,
        }
    }

    fn mapping(coupon: &Coupon) -> CouponMapping {
        CouponMapping {
            id: Uuid::new_v4(),
            coupon_id: coupon.id,
            city_id: None,
            hotel_id: None,
            room_type_id: None,
        }
    }

    #[test]
    fn percentage_discount_with_and_without_cap() {
        let mut c = coupon(DiscountType::Percentage, 10.0);
        assert_eq!(compute_discount(&c, 200_000), 20_000);

        c.max_discount_cents = Some(5_000);
        assert_eq!(compute_discount(&c, 200_000), 5_000);
    }

    #[test]
    fn fixed_discount_never_exceeds_order() {
        let c = coupon(DiscountType::Fixed, 50_000.0);
        assert_eq!(compute_discount(&c, 200_000), 50_000);
        assert_eq!(compute_discount(&c, 30_000), 30_000);
    }

    #[test]
    fn first_failure_wins() {
        let hotel = hotel();
        let target = CouponTarget {
            hotel: &hotel,
            room_type_id: None,
            order_cents: 1_000,
            user_id: Uuid::new_v4(),
            booking_type: BookingType::Daily,
        };
        let mut c = coupon(DiscountType::Fixed, 100.0);
        c.status = CouponStatus::Inactive;
        c.min_order_cents = 5_000;

        // Inactive is checked before the minimum amount
        assert_eq!(
            check_eligibility(&c, &[], true, &target, Utc::now()),
            Err(CouponError::Inactive)
        );

        c.status = CouponStatus::Active;
        assert_eq!(
            check_eligibility(&c, &[], true, &target, Utc::now()),
            Err(CouponError::AlreadyUsed)
        );
        assert!(matches!(
            check_eligibility(&c, &[], false, &target, Utc::now()),
            Err(CouponError::BelowMinimum { .. })
        ));
    }

    #[test]
    fn validity_window_and_limit() {
        let hotel = hotel();
        let target = CouponTarget {
            hotel: &hotel,
            room_type_id: None,
            order_cents: 10_000,
            user_id: Uuid::new_v4(),
            booking_type: BookingType::Daily,
        };
        let mut c = coupon(DiscountType::Percentage, 10.0);

        let later = c.valid_to + Duration::seconds(1);
        assert_eq!(
            check_eligibility(&c, &[], false, &target, later),
            Err(CouponError::OutsideValidity)
        );

        c.usage_limit = Some(3);
        c.used_count = 3;
        assert_eq!(
            check_eligibility(&c, &[], false, &target, Utc::now()),
            Err(CouponError::Exhausted)
        );
    }

    #[test]
    fn booking_type_scope() {
        let hotel = hotel();
        let target = CouponTarget {
            hotel: &hotel,
            room_type_id: None,
            order_cents: 10_000,
            user_id: Uuid::new_v4(),
            booking_type: BookingType::Hourly,
        };
        let mut c = coupon(DiscountType::Percentage, 10.0);
        c.applicable_booking_types = CouponBookingScope::Daily;

        assert_eq!(
            check_eligibility(&c, &[], false, &target, Utc::now()),
            Err(CouponError::WrongBookingType(BookingType::Hourly))
        );
    }

    #[test]
    fn mappings_match_hotel_city_or_room_type() {
        let hotel = hotel();
        let room_type = Uuid::new_v4();
        let c = coupon(DiscountType::Percentage, 10.0);

        assert!(mapping_matches(&[], &hotel, None));

        let mut by_city = mapping(&c);
        by_city.city_id = hotel.city_id;
        assert!(mapping_matches(&[by_city], &hotel, None));

        let mut by_room_type = mapping(&c);
        by_room_type.room_type_id = Some(room_type);
        assert!(mapping_matches(&[by_room_type.clone()], &hotel, Some(room_type)));
        assert!(!mapping_matches(&[by_room_type], &hotel, None));

        let mut other_hotel = mapping(&c);
        other_hotel.hotel_id = Some(Uuid::new_v4());
        assert!(!mapping_matches(&[other_hotel], &hotel, Some(room_type)));
    }

    #[test]
    fn rejections_map_to_taxonomy() {
        assert!(matches!(AppError::from(CouponError::NotFound), AppError::NotFound("coupon")));
        assert!(matches!(AppError::from(CouponError::Exhausted), AppError::Conflict(_)));
        assert!(matches!(AppError::from(CouponError::AlreadyUsed), AppError::Conflict(_)));
        assert!(matches!(AppError::from(CouponError::Inactive), AppError::Validation(_)));
    }
}
