//! Cancellation and refund engine.
//!
//! # State Machine
//!
//! ```text
//! booking confirmed ──request_cancellation──▶ booking cancelled + refund pending
//! refund pending ──process_refund──▶ processed (money returned)
//! refund pending ──reject_refund──▶ rejected (booking confirmed again)
//! ```
//!
//! # Fee Policy
//!
//! Hotel cancellations always refund in full. Otherwise the hotel's
//! `cancellation_fee_percentage` is charged when the cancellation happens
//! less than `cancellation_time_hours` before check-in. The fee is taken from
//! what was actually collected, so an unpaid booking refunds nothing.

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::engine::Engine;
use crate::error::AppError;
use crate::integrations::{dispatch, notifier::templates};
use crate::models::{
    actor::Actor,
    booking::{Booking, BookingStatus, PaymentChannel, PaymentStatus},
    hotel::Hotel,
    payment::{PaymentRecordStatus, collected_cents},
    refund::{CancellationRequest, RefundMethod, RefundRequest, RefundStatus, RefundType},
    wallet::WalletSource,
};
use crate::services::{availability, ensure_hotel_operator, wallet_service};
use crate::store::{Store, UnitOfWork};

/// Split of a refundable amount into fee and refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeQuote {
    pub fee_cents: i64,
    pub refund_cents: i64,
}

/// Compute the cancellation fee for `original_cents`.
///
/// `hours_before_check_in` is negative once check-in has passed, which is
/// always inside the window.
pub fn cancellation_fee(
    original_cents: i64,
    hours_before_check_in: f64,
    hotel: &Hotel,
    refund_type: RefundType,
) -> FeeQuote {
    let original_cents = original_cents.max(0);

    let in_window = hours_before_check_in < f64::from(hotel.cancellation_time_hours);
    let fee_cents = if refund_type == RefundType::HotelCancellation || !in_window {
        0
    } else {
        ((original_cents as f64 * hotel.cancellation_fee_percentage / 100.0).round() as i64)
            .clamp(0, original_cents)
    };

    FeeQuote {
        fee_cents,
        refund_cents: original_cents - fee_cents,
    }
}

fn authorize_cancellation(
    actor: &Actor,
    booking: &Booking,
    hotel: &Hotel,
    refund_type: RefundType,
) -> Result<(), AppError> {
    let allowed = match refund_type {
        RefundType::UserCancellation => actor.user_id == booking.user_id,
        RefundType::HotelCancellation => actor.is_admin() || actor.owns_hotel(hotel.owner_id),
        RefundType::AdminRefund => actor.is_admin(),
    };
    if !allowed {
        tracing::warn!(
            user_id = %actor.user_id,
            booking_id = %booking.id,
            ?refund_type,
            "Cancellation denied"
        );
        return Err(AppError::Authorization(format!(
            "Not allowed to request a {:?} for this booking",
            refund_type
        )));
    }
    Ok(())
}

/// Cancel a booking and open its refund request.
///
/// # Process
///
/// 1. Lock the booking and authorize the actor for the refund type
/// 2. Reject cancelled or completed bookings and bookings with a refund
/// 3. Price the fee against the collected amount
/// 4. Insert the refund and mark the booking cancelled in one unit of work
///
/// # Errors
///
/// - `Validation`: empty reason
/// - `Authorization`: guest cancelling someone else's booking, hotel owner
///   acting for another hotel, non-admin using `admin_refund`
/// - `Conflict`: booking already cancelled, completed, or already refunded
/// - `NotFound`: unknown booking or hotel
pub async fn request_cancellation<S: Store>(
    engine: &Engine<S>,
    actor: &Actor,
    booking_id: Uuid,
    request: CancellationRequest,
) -> Result<RefundRequest, AppError> {
    let reason = request.reason.trim().to_string();
    if reason.is_empty() {
        return Err(AppError::Validation("A cancellation reason is required".to_string()));
    }

    let now = Utc::now();
    let mut uow = engine.store.begin().await?;

    let mut booking = uow
        .lock_booking(booking_id)
        .await?
        .ok_or(AppError::NotFound("booking"))?;
    let hotel = uow
        .find_hotel(booking.hotel_id)
        .await?
        .ok_or(AppError::NotFound("hotel"))?;

    authorize_cancellation(actor, &booking, &hotel, request.refund_type)?;

    match booking.status {
        BookingStatus::Cancelled => {
            return Err(AppError::Conflict("Booking is already cancelled".to_string()));
        }
        BookingStatus::Completed => {
            return Err(AppError::Conflict("Completed stays cannot be cancelled".to_string()));
        }
        BookingStatus::Pending | BookingStatus::Confirmed => {}
    }
    if uow.find_refund_for_booking(booking_id).await?.is_some() {
        return Err(AppError::Conflict(
            "Booking already has a refund request".to_string(),
        ));
    }

    let original_amount_cents = collected_cents(&uow.payments_for_booking(booking_id).await?);
    let hours_before_check_in = (booking.check_in - now).num_seconds() as f64 / 3600.0;
    let quote = cancellation_fee(
        original_amount_cents,
        hours_before_check_in,
        &hotel,
        request.refund_type,
    );

    let refund = RefundRequest {
        id: Uuid::new_v4(),
        booking_id,
        user_id: booking.user_id,
        original_amount_cents,
        cancellation_fee_cents: quote.fee_cents,
        refund_amount_cents: quote.refund_cents,
        reason: reason.clone(),
        refund_type: request.refund_type,
        refund_method: request.refund_method,
        status: RefundStatus::Pending,
        requested_by: actor.user_id,
        processed_by: None,
        processed_at: None,
        rejection_reason: None,
        gateway_refund_id: None,
        wallet_transaction_id: None,
        created_at: now,
        updated_at: now,
    };
    uow.insert_refund(&refund).await?;

    booking.mark_cancelled(actor.user_id, reason, now);
    uow.update_booking(&booking).await?;

    uow.commit().await?;

    tracing::info!(
        %booking_id,
        refund_id = %refund.id,
        refund_type = ?refund.refund_type,
        original_cents = refund.original_amount_cents,
        fee_cents = refund.cancellation_fee_cents,
        "Booking cancelled"
    );

    dispatch(
        &engine.notifier,
        templates::BOOKING_CANCELLED,
        booking.user_id,
        json!({
            "booking_id": booking_id,
            "hotel_name": hotel.name,
            "refund_amount_cents": refund.refund_amount_cents,
            "cancellation_fee_cents": refund.cancellation_fee_cents,
        }),
    );

    Ok(refund)
}

/// Load a pending refund with its booking and authorize the operator.
async fn pending_refund_for<U: UnitOfWork>(
    uow: &mut U,
    operator: &Actor,
    refund_id: Uuid,
) -> Result<(RefundRequest, Booking), AppError> {
    let refund = uow
        .lock_refund(refund_id)
        .await?
        .ok_or(AppError::NotFound("refund"))?;
    let booking = uow
        .lock_booking(refund.booking_id)
        .await?
        .ok_or(AppError::NotFound("booking"))?;
    let hotel = uow
        .find_hotel(booking.hotel_id)
        .await?
        .ok_or(AppError::NotFound("hotel"))?;

    ensure_hotel_operator(operator, &hotel)?;

    if refund.status != RefundStatus::Pending {
        return Err(AppError::Conflict(format!(
            "Refund is already {:?}",
            refund.status
        )));
    }
    Ok((refund, booking))
}

/// Pay out a pending refund.
///
/// # Process
///
/// 1. Authorize the operator and find the gateway payment, if any
/// 2. `original_payment` with a gateway payment: refund through the gateway
///    outside any unit of work
/// 3. Otherwise credit the guest's wallet inside the processing unit of work
/// 4. Mark the refund processed and the booking's payment refunded
///
/// # Errors
///
/// - `Authorization`: operator is neither admin nor the hotel owner
/// - `Conflict`: refund is not pending
/// - `ExternalGateway`: gateway refund failed (refund stays pending)
pub async fn process_refund<S: Store>(
    engine: &Engine<S>,
    operator: &Actor,
    refund_id: Uuid,
) -> Result<RefundRequest, AppError> {
    let mut uow = engine.store.begin().await?;
    let (refund, _) = pending_refund_for(&mut uow, operator, refund_id).await?;

    let gateway_payment_id = match refund.refund_method {
        RefundMethod::OriginalPayment => uow
            .payments_for_booking(refund.booking_id)
            .await?
            .into_iter()
            .find(|p| p.channel == PaymentChannel::Online && p.status == PaymentRecordStatus::Completed)
            .and_then(|p| p.gateway_payment_id),
        RefundMethod::Wallet => None,
    };
    uow.rollback().await?;

    let gateway_refund_id = match &gateway_payment_id {
        Some(payment_id) if refund.refund_amount_cents > 0 => Some(
            engine
                .gateway
                .refund(payment_id, refund.refund_amount_cents)
                .await?,
        ),
        _ => None,
    };

    let now = Utc::now();
    let mut uow = engine.store.begin().await?;
    let (mut refund, mut booking) = match pending_refund_for(&mut uow, operator, refund_id).await {
        Ok(found) => found,
        Err(e) => {
            if let Some(gateway_refund_id) = &gateway_refund_id {
                tracing::error!(%refund_id, %gateway_refund_id, "Gateway refund issued but refund could not be recorded: {}", e);
            }
            return Err(e);
        }
    };

    if gateway_payment_id.is_none() && refund.refund_amount_cents > 0 {
        let receipt = wallet_service::credit_in(
            &mut uow,
            refund.user_id,
            refund.refund_amount_cents,
            WalletSource::Refund,
            Some(refund.id.to_string()),
        )
        .await?;
        refund.wallet_transaction_id = Some(receipt.transaction_id);
    }

    refund.status = RefundStatus::Processed;
    refund.processed_by = Some(operator.user_id);
    refund.processed_at = Some(now);
    refund.gateway_refund_id = gateway_refund_id;
    refund.updated_at = now;
    uow.update_refund(&refund).await?;

    if refund.original_amount_cents > 0 {
        booking.payment_status = PaymentStatus::Refunded;
        booking.updated_at = now;
        uow.update_booking(&booking).await?;
    }

    uow.commit().await?;

    tracing::info!(
        %refund_id,
        amount_cents = refund.refund_amount_cents,
        via_gateway = refund.gateway_refund_id.is_some(),
        "Refund processed"
    );

    dispatch(
        &engine.notifier,
        templates::REFUND_PROCESSED,
        refund.user_id,
        json!({
            "booking_id": refund.booking_id,
            "refund_amount_cents": refund.refund_amount_cents,
        }),
    );

    Ok(refund)
}

/// Reject a pending refund and reinstate the booking.
///
/// The room may have been booked by someone else since the cancellation, so
/// availability is checked again with the room locked.
///
/// # Errors
///
/// - `Validation`: empty reason
/// - `Authorization`: operator is neither admin nor the hotel owner
/// - `Conflict`: refund is not pending, or the room is no longer free
pub async fn reject_refund<S: Store>(
    engine: &Engine<S>,
    operator: &Actor,
    refund_id: Uuid,
    reason: String,
) -> Result<RefundRequest, AppError> {
    let reason = reason.trim().to_string();
    if reason.is_empty() {
        return Err(AppError::Validation("A rejection reason is required".to_string()));
    }

    let now = Utc::now();
    let mut uow = engine.store.begin().await?;
    let (mut refund, mut booking) = pending_refund_for(&mut uow, operator, refund_id).await?;

    let room = uow
        .lock_room(booking.room_id)
        .await?
        .ok_or(AppError::NotFound("room"))?;
    availability::check_availability(
        &mut uow,
        &room,
        &booking.stay(),
        booking.guest_count,
        Some(booking.id),
    )
    .await?
    .into_result()?;

    refund.status = RefundStatus::Rejected;
    refund.rejection_reason = Some(reason.clone());
    refund.processed_by = Some(operator.user_id);
    refund.processed_at = Some(now);
    refund.updated_at = now;
    uow.update_refund(&refund).await?;

    booking.reinstate(now);
    uow.update_booking(&booking).await?;

    uow.commit().await?;

    tracing::info!(%refund_id, booking_id = %booking.id, "Refund rejected, booking reinstated");

    dispatch(
        &engine.notifier,
        templates::REFUND_REJECTED,
        refund.user_id,
        json!({
            "booking_id": booking.id,
            "reason": reason,
        }),
    );

    Ok(refund)
}
