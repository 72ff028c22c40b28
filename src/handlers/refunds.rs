//! Cancellation and refund HTTP handlers.
//!
//! - POST /api/v1/bookings/:id/cancel - Cancel a booking and open a refund
//! - POST /api/v1/refunds/:id/process - Pay out a pending refund
//! - POST /api/v1/refunds/:id/reject - Reject a refund, reinstating the booking

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    engine::Engine,
    error::AppError,
    models::{
        actor::Actor,
        refund::{CancellationRequest, RefundRequest, RejectRefundRequest},
    },
    services::refund_service,
    store::PgStore,
};

/// Cancel a booking.
///
/// # Request Body
///
/// ```json
/// {
///   "reason": "Change of plans",
///   "refund_type": "user_cancellation",
///   "refund_method": "wallet"
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: the pending refund request with its fee split
/// - **Error (403)**: actor may not cancel this booking with this refund type
/// - **Error (409)**: booking already cancelled or refunded
pub async fn cancel_booking(
    State(engine): State<Engine<PgStore>>,
    Extension(actor): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<CancellationRequest>,
) -> Result<(StatusCode, Json<RefundRequest>), AppError> {
    let refund = refund_service::request_cancellation(&engine, &actor, booking_id, request).await?;
    Ok((StatusCode::CREATED, Json(refund)))
}

pub async fn process_refund(
    State(engine): State<Engine<PgStore>>,
    Extension(actor): Extension<Actor>,
    Path(refund_id): Path<Uuid>,
) -> Result<Json<RefundRequest>, AppError> {
    let refund = refund_service::process_refund(&engine, &actor, refund_id).await?;
    Ok(Json(refund))
}

pub async fn reject_refund(
    State(engine): State<Engine<PgStore>>,
    Extension(actor): Extension<Actor>,
    Path(refund_id): Path<Uuid>,
    Json(request): Json<RejectRefundRequest>,
) -> Result<Json<RefundRequest>, AppError> {
    let refund = refund_service::reject_refund(&engine, &actor, refund_id, request.reason).await?;
    Ok(Json(refund))
}
