//! Authoritative stay pricing.
//!
//! # Calculation
//!
//! 1. `units` = nights (daily) or hours (hourly), rounded up
//! 2. `subtotal = rate × units`
//! 3. active matching adjustments in creation order: percentage compounds on
//!    the running price, fixed adds a signed amount, never below zero
//! 4. coupon discount on the adjusted price
//!
//! The server price always wins. A client quote is only compared against it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::Engine;
use crate::error::AppError;
use crate::models::{
    booking::{BookingType, StayWindow},
    hotel::{AdjustmentType, Hotel, PriceAdjustment, Room},
};
use crate::services::coupon_service::{self, CouponQuote, CouponTarget};
use crate::store::{Store, UnitOfWork};

const SECONDS_PER_DAY: i64 = 86_400;
const SECONDS_PER_HOUR: i64 = 3_600;

/// Server-side price of a stay.
#[derive(Debug, Clone, Serialize)]
pub struct PriceBreakdown {
    pub booking_type: BookingType,
    pub units: i64,
    pub unit_rate_cents: i64,

    /// `unit_rate_cents × units`
    pub subtotal_cents: i64,

    /// Subtotal after price adjustments
    pub base_cents: i64,

    pub discount_cents: i64,
    pub total_cents: i64,
    pub applied_adjustments: Vec<Uuid>,
    pub coupon_code: Option<String>,

    #[serde(skip)]
    pub coupon: Option<CouponQuote>,
}

/// Parameters for a read-only price quote.
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRequest {
    pub room_id: Uuid,
    pub check_in: DateTime<Utc>,
    pub check_out: DateTime<Utc>,

    #[serde(default = "default_booking_type")]
    pub booking_type: BookingType,

    pub coupon_code: Option<String>,
}

fn default_booking_type() -> BookingType {
    BookingType::Daily
}

/// What is being priced.
#[derive(Debug, Clone, Copy)]
pub struct StayPricing<'a> {
    pub hotel: &'a Hotel,
    pub room: &'a Room,
    pub stay: &'a StayWindow,
    pub booking_type: BookingType,
    pub coupon_code: Option<&'a str>,
    pub user_id: Uuid,
}

/// Billable nights or hours; a partial unit counts as a whole one.
pub fn stay_units(booking_type: BookingType, stay: &StayWindow) -> i64 {
    let seconds = (stay.check_out - stay.check_in).num_seconds().max(0);
    let unit = match booking_type {
        BookingType::Daily => SECONDS_PER_DAY,
        BookingType::Hourly => SECONDS_PER_HOUR,
    };
    (seconds + unit - 1) / unit
}

fn unit_rate(room: &Room, booking_type: BookingType) -> Result<i64, AppError> {
    match booking_type {
        BookingType::Daily => Ok(room.price_per_night_cents),
        BookingType::Hourly => room
            .price_per_hour_cents
            .ok_or_else(|| AppError::Validation("Room does not accept hourly bookings".to_string())),
    }
}

/// Apply `adjustments` to `subtotal_cents` in the order given.
///
/// Returns the adjusted price and the ids of the rules that applied.
pub fn apply_adjustments(
    subtotal_cents: i64,
    adjustments: &[PriceAdjustment],
    hotel: &Hotel,
    room: &Room,
    check_in: DateTime<Utc>,
) -> (i64, Vec<Uuid>) {
    let mut running = subtotal_cents as f64;
    let mut applied = Vec::new();

    for adjustment in adjustments.iter().filter(|a| a.applies_to(hotel, room, check_in)) {
        running = match adjustment.adjustment_type {
            AdjustmentType::Percentage => running * (1.0 + adjustment.value / 100.0),
            AdjustmentType::Fixed => running + adjustment.value,
        }
        .max(0.0);
        applied.push(adjustment.id);
    }

    (running.round() as i64, applied)
}

/// Price a stay without a coupon.
pub fn compute_price(
    hotel: &Hotel,
    room: &Room,
    stay: &StayWindow,
    booking_type: BookingType,
    adjustments: &[PriceAdjustment],
) -> Result<PriceBreakdown, AppError> {
    let unit_rate_cents = unit_rate(room, booking_type)?;
    let units = stay_units(booking_type, stay);
    let subtotal_cents = unit_rate_cents
        .checked_mul(units)
        .ok_or_else(|| AppError::Validation("Stay is too long to price".to_string()))?;

    let (base_cents, applied_adjustments) =
        apply_adjustments(subtotal_cents, adjustments, hotel, room, stay.check_in);

    Ok(PriceBreakdown {
        booking_type,
        units,
        unit_rate_cents,
        subtotal_cents,
        base_cents,
        discount_cents: 0,
        total_cents: base_cents,
        applied_adjustments,
        coupon_code: None,
        coupon: None,
    })
}

/// Reject a client quote more than `tolerance_cents` away from the server total.
pub fn ensure_quote_matches(
    breakdown: &PriceBreakdown,
    quoted_total_cents: i64,
    tolerance_cents: i64,
) -> Result<(), AppError> {
    if (breakdown.total_cents - quoted_total_cents).abs() > tolerance_cents {
        tracing::warn!(
            server_total = breakdown.total_cents,
            quoted_total = quoted_total_cents,
            "Price mismatch"
        );
        return Err(AppError::Validation(format!(
            "Quoted total {} does not match the current price {}",
            quoted_total_cents, breakdown.total_cents
        )));
    }
    Ok(())
}

/// Full price of a stay, coupon included, inside an open unit of work.
pub async fn price_in<U: UnitOfWork>(
    uow: &mut U,
    input: &StayPricing<'_>,
    now: DateTime<Utc>,
) -> Result<PriceBreakdown, AppError> {
    let adjustments = uow.active_price_adjustments().await?;
    let mut breakdown = compute_price(input.hotel, input.room, input.stay, input.booking_type, &adjustments)?;

    if let Some(code) = input.coupon_code.filter(|c| !c.trim().is_empty()) {
        let target = CouponTarget {
            hotel: input.hotel,
            room_type_id: input.room.room_type_id,
            order_cents: breakdown.base_cents,
            user_id: input.user_id,
            booking_type: input.booking_type,
        };
        let quote = coupon_service::validate_coupon(uow, code, &target, now).await?;

        breakdown.discount_cents = quote.discount_cents;
        breakdown.total_cents = quote.final_cents;
        breakdown.coupon_code = Some(quote.coupon.code.clone());
        breakdown.coupon = Some(quote);
    }

    Ok(breakdown)
}

/// Price a stay and check it against the client's quote.
pub async fn price_stay<U: UnitOfWork>(
    uow: &mut U,
    input: &StayPricing<'_>,
    quoted_total_cents: i64,
    tolerance_cents: i64,
    now: DateTime<Utc>,
) -> Result<PriceBreakdown, AppError> {
    let breakdown = price_in(uow, input, now).await?;
    ensure_quote_matches(&breakdown, quoted_total_cents, tolerance_cents)?;
    Ok(breakdown)
}

/// Quote a stay for `user_id` without writing anything.
pub async fn quote_stay<S: Store>(
    engine: &Engine<S>,
    user_id: Uuid,
    request: QuoteRequest,
) -> Result<PriceBreakdown, AppError> {
    let stay = StayWindow::new(request.check_in, request.check_out)?;

    let mut uow = engine.store.begin().await?;
    let room = uow
        .find_room(request.room_id)
        .await?
        .ok_or(AppError::NotFound("room"))?;
    let hotel = uow
        .find_hotel(room.hotel_id)
        .await?
        .ok_or(AppError::NotFound("hotel"))?;

    let input = StayPricing {
        hotel: &hotel,
        room: &room,
        stay: &stay,
        booking_type: request.booking_type,
        coupon_code: request.coupon_code.as_deref(),
        user_id,
    };
    let breakdown = price_in(&mut uow, &input, Utc::now()).await?;
    uow.rollback().await?;

    Ok(breakdown)
}
