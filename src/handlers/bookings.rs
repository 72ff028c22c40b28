//! Booking HTTP handlers.
//!
//! This module implements the booking-related API endpoints:
//! - GET /api/v1/rooms/:id/availability - Check a room for a stay
//! - POST /api/v1/quotes - Server price for a stay
//! - POST /api/v1/bookings - Create a booking
//! - POST /api/v1/bookings/:id/payment/verify - Confirm an online payment
//! - POST /api/v1/bookings/:id/payments/:payment_id/settle - Settle an offline payment
//! - POST /api/v1/bookings/:id/complete - Close a finished stay

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    engine::Engine,
    error::AppError,
    models::{
        actor::Actor,
        booking::{Booking, BookingReceipt, CreateBookingRequest, PaymentVerification},
        payment::Payment,
    },
    services::{
        availability::{self, Availability},
        booking_service,
        pricing::{self, PriceBreakdown, QuoteRequest},
    },
    store::PgStore,
};

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub check_in: DateTime<Utc>,
    pub check_out: DateTime<Utc>,

    #[serde(default = "default_guest_count")]
    pub guest_count: i32,
}

fn default_guest_count() -> i32 {
    1
}

/// Check whether a room is free for a stay.
///
/// # Endpoint
///
/// `GET /api/v1/rooms/{id}/availability?check_in=...&check_out=...&guest_count=2`
///
/// # Response (200 OK)
///
/// ```json
/// { "available": false, "reason": { "kind": "overlap", "booking_id": "..." } }
/// ```
pub async fn check_availability(
    State(engine): State<Engine<PgStore>>,
    Path(room_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Availability>, AppError> {
    let availability = availability::is_available(
        &engine.store,
        room_id,
        query.check_in,
        query.check_out,
        query.guest_count,
    )
    .await?;

    Ok(Json(availability))
}

/// Price a stay for the caller without booking it.
///
/// The returned `total_cents` is what the client should send back as
/// `quoted_total_cents` when booking.
pub async fn quote(
    State(engine): State<Engine<PgStore>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<PriceBreakdown>, AppError> {
    let breakdown = pricing::quote_stay(&engine, actor.user_id, request).await?;
    Ok(Json(breakdown))
}

/// Create a booking.
///
/// # Endpoint
///
/// `POST /api/v1/bookings`
///
/// # Response
///
/// - **Success (201 Created)**: the booking, plus the gateway order id for
///   online bookings
/// - **Error (400)**: invalid input or price mismatch
/// - **Error (409)**: room taken or coupon exhausted
/// - **Error (502)**: gateway order could not be created
pub async fn create_booking(
    State(engine): State<Engine<PgStore>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingReceipt>), AppError> {
    let receipt = booking_service::create_booking(&engine, &actor, request).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Confirm an online payment with the gateway signature.
pub async fn verify_payment(
    State(engine): State<Engine<PgStore>>,
    Extension(actor): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
    Json(verification): Json<PaymentVerification>,
) -> Result<Json<Booking>, AppError> {
    let booking =
        booking_service::confirm_online_payment(&engine, &actor, booking_id, verification).await?;
    Ok(Json(booking))
}

/// Mark an offline payment as received. Hotel owner or admin only.
pub async fn settle_payment(
    State(engine): State<Engine<PgStore>>,
    Extension(actor): Extension<Actor>,
    Path((booking_id, payment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Payment>, AppError> {
    let payment =
        booking_service::settle_offline_payment(&engine, &actor, booking_id, payment_id).await?;
    Ok(Json(payment))
}

pub async fn complete_stay(
    State(engine): State<Engine<PgStore>>,
    Extension(actor): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = booking_service::complete_stay(&engine, &actor, booking_id).await?;
    Ok(Json(booking))
}
