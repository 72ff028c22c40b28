//! Booking orchestration - turns a priced, available stay into a committed
//! booking with its payment rows and coupon usage.
//!
//! # Phases
//!
//! 1. **Dry run**: load room and hotel, check the payment mode is enabled,
//!    price the stay (coupon included) against the client quote and check
//!    availability. Nothing is written.
//! 2. **Gateway**: online bookings create a gateway order. No unit of work is
//!    open during the call, so a gateway failure leaves nothing behind.
//! 3. **Commit**: lock the room, repeat every check, then insert the booking,
//!    redeem the coupon and insert the payment rows in one unit of work.
//!
//! Notifications are dispatched only after commit.

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::engine::Engine;
use crate::error::AppError;
use crate::integrations::{dispatch, notifier::templates};
use crate::models::{
    actor::Actor,
    booking::{
        Booking, BookingReceipt, BookingStatus, CreateBookingRequest, PaymentChannel, PaymentMode,
        PaymentStatus, PaymentVerification, StayWindow,
    },
    hotel::{Hotel, Room},
    payment::{Payment, PaymentRecordStatus, PaymentType, collected_cents},
};
use crate::services::{
    availability, coupon_service,
    ensure_hotel_operator,
    pricing::{self, PriceBreakdown, StayPricing},
};
use crate::store::{Store, UnitOfWork};

/// Everything the commit phase needs, produced by [`validate_in`].
struct ValidatedBooking {
    hotel: Hotel,
    room: Room,
    price: PriceBreakdown,
    payment_mode: PaymentMode,
}

fn ensure_channel_enabled(hotel: &Hotel, channel: PaymentChannel) -> Result<(), AppError> {
    let enabled = match channel {
        PaymentChannel::Online => hotel.online_payment_enabled,
        PaymentChannel::Offline => hotel.offline_payment_enabled,
    };
    if !enabled {
        return Err(AppError::Validation(format!(
            "{:?} payment is not enabled for this hotel",
            channel
        )));
    }
    Ok(())
}

/// Run every booking check against `room` inside `uow`.
async fn validate_in<U: UnitOfWork>(
    uow: &mut U,
    tolerance_cents: i64,
    room: Room,
    user_id: Uuid,
    request: &CreateBookingRequest,
    stay: &StayWindow,
    now: DateTime<Utc>,
) -> Result<ValidatedBooking, AppError> {
    let hotel = uow
        .find_hotel(room.hotel_id)
        .await?
        .ok_or(AppError::NotFound("hotel"))?;

    ensure_channel_enabled(&hotel, request.payment_mode.channel())?;

    let input = StayPricing {
        hotel: &hotel,
        room: &room,
        stay,
        booking_type: request.booking_type,
        coupon_code: request.coupon_code.as_deref(),
        user_id,
    };
    let price = pricing::price_stay(
        uow,
        &input,
        request.quoted_total_cents,
        tolerance_cents,
        now,
    )
    .await?;

    let payment_mode = request.payment_mode.resolve(price.total_cents)?;
    if payment_mode == PaymentMode::Online && price.total_cents <= 0 {
        return Err(AppError::Validation(
            "Online bookings need a positive total".to_string(),
        ));
    }

    availability::check_availability(uow, &room, stay, request.guest_count, None)
        .await?
        .into_result()?;

    Ok(ValidatedBooking {
        hotel,
        room,
        price,
        payment_mode,
    })
}

/// Payment rows for a new booking.
///
/// Online: one `full` row against the gateway order. Offline with an
/// advance: an `advance` and a `remaining` row. Offline without: one `full`
/// row. A booking with nothing to pay gets no rows.
fn payment_rows(booking: &Booking, gateway_order_id: Option<String>, now: DateTime<Utc>) -> Vec<Payment> {
    if booking.total_cents == 0 {
        return Vec::new();
    }
    match booking.payment_mode {
        PaymentMode::Online => vec![Payment::pending(
            booking.id,
            booking.total_cents,
            PaymentChannel::Online,
            PaymentType::Full,
            gateway_order_id,
            now,
        )],
        PaymentMode::Offline {
            advance_cents,
            remaining_cents,
        } if advance_cents > 0 => vec![
            Payment::pending(
                booking.id,
                advance_cents,
                PaymentChannel::Offline,
                PaymentType::Advance,
                None,
                now,
            ),
            Payment::pending(
                booking.id,
                remaining_cents,
                PaymentChannel::Offline,
                PaymentType::Remaining,
                None,
                now,
            ),
        ],
        PaymentMode::Offline { .. } => vec![Payment::pending(
            booking.id,
            booking.total_cents,
            PaymentChannel::Offline,
            PaymentType::Full,
            None,
            now,
        )],
    }
}

/// Create a booking for `actor`.
///
/// # Process
///
/// 1. Dry-run validation in a read-only unit of work
/// 2. Create the gateway order (online only)
/// 3. Lock the room and repeat validation
/// 4. Insert booking, coupon usage and payment rows
/// 5. Commit, then notify the guest
///
/// Offline bookings start `confirmed`; online bookings stay `pending` until
/// [`confirm_online_payment`].
///
/// # Errors
///
/// - `Validation`: bad dates or guest count, disabled payment mode, price
///   mismatch, bad advance, coupon not applicable
/// - `Conflict`: room taken or not bookable, coupon exhausted or already used
/// - `NotFound`: unknown room, hotel or coupon
/// - `ExternalGateway`: gateway order creation failed (nothing persisted)
pub async fn create_booking<S: Store>(
    engine: &Engine<S>,
    actor: &Actor,
    request: CreateBookingRequest,
) -> Result<BookingReceipt, AppError> {
    let stay = StayWindow::new(request.check_in, request.check_out)?;
    let user_id = actor.user_id;

    // Dry run
    let mut uow = engine.store.begin().await?;
    let room = uow
        .find_room(request.room_id)
        .await?
        .ok_or(AppError::NotFound("room"))?;
    let tolerance_cents = engine.settings.price_tolerance_cents;
    let preview = validate_in(&mut uow, tolerance_cents, room, user_id, &request, &stay, Utc::now()).await?;
    uow.rollback().await?;

    let booking_id = Uuid::new_v4();

    let gateway_order_id = match preview.payment_mode {
        PaymentMode::Online => Some(
            engine
                .gateway
                .create_order(
                    preview.price.total_cents,
                    &engine.settings.currency,
                    &booking_id.to_string(),
                )
                .await?,
        ),
        PaymentMode::Offline { .. } => None,
    };

    // Commit
    let now = Utc::now();
    let mut uow = engine.store.begin().await?;
    let room = uow
        .lock_room(request.room_id)
        .await?
        .ok_or(AppError::NotFound("room"))?;
    let checked = validate_in(&mut uow, tolerance_cents, room, user_id, &request, &stay, now).await?;

    // The gateway order was created for the dry-run amount
    if gateway_order_id.is_some() && checked.price.total_cents != preview.price.total_cents {
        return Err(AppError::Conflict(
            "Price changed while the booking was being placed".to_string(),
        ));
    }

    let (status, payment_status) = match checked.payment_mode {
        PaymentMode::Online => (BookingStatus::Pending, PaymentStatus::Pending),
        PaymentMode::Offline { .. } if checked.price.total_cents == 0 => {
            (BookingStatus::Confirmed, PaymentStatus::Completed)
        }
        PaymentMode::Offline { .. } => (BookingStatus::Confirmed, PaymentStatus::Pending),
    };

    let booking = Booking {
        id: booking_id,
        room_id: checked.room.id,
        hotel_id: checked.hotel.id,
        user_id,
        booking_type: request.booking_type,
        check_in: stay.check_in,
        check_out: stay.check_out,
        guest_count: request.guest_count,
        base_cents: checked.price.base_cents,
        discount_cents: checked.price.discount_cents,
        total_cents: checked.price.total_cents,
        coupon_id: checked.price.coupon.as_ref().map(|q| q.coupon.id),
        payment_mode: checked.payment_mode,
        status,
        payment_status,
        cancelled_at: None,
        cancelled_by: None,
        cancellation_reason: None,
        created_at: now,
        updated_at: now,
    };
    uow.insert_booking(&booking).await?;

    if let Some(quote) = &checked.price.coupon {
        coupon_service::redeem_coupon(&mut uow, quote, booking.id, user_id, now).await?;
    }

    for payment in payment_rows(&booking, gateway_order_id.clone(), now) {
        uow.insert_payment(&payment).await?;
    }

    uow.commit().await?;

    tracing::info!(
        booking_id = %booking.id,
        room_id = %booking.room_id,
        %user_id,
        total_cents = booking.total_cents,
        mode = ?booking.payment_mode.channel(),
        "Booking created"
    );

    dispatch(
        &engine.notifier,
        templates::BOOKING_CREATED,
        user_id,
        json!({
            "booking_id": booking.id,
            "hotel_name": checked.hotel.name,
            "room_number": checked.room.room_number,
            "check_in": booking.check_in,
            "check_out": booking.check_out,
            "total_cents": booking.total_cents,
        }),
    );

    Ok(BookingReceipt {
        booking,
        gateway_order_id,
    })
}

/// Record a verified online payment.
///
/// # Process
///
/// 1. Find the booking's online payment for the order
/// 2. Verify the signature with the gateway (outside any unit of work)
/// 3. Lock booking and payment, mark the payment completed and the booking
///    `confirmed/completed`
///
/// Repeating the call with the same gateway payment id returns the booking
/// unchanged.
///
/// # Errors
///
/// - `Authorization`: actor is neither the guest nor an admin
/// - `Validation`: order does not belong to the booking, or bad signature
/// - `Conflict`: booking was cancelled meanwhile, or the payment was already
///   completed with a different gateway payment
/// - `ExternalGateway`: verification call failed
pub async fn confirm_online_payment<S: Store>(
    engine: &Engine<S>,
    actor: &Actor,
    booking_id: Uuid,
    verification: PaymentVerification,
) -> Result<Booking, AppError> {
    let mut uow = engine.store.begin().await?;
    let booking = uow
        .find_booking(booking_id)
        .await?
        .ok_or(AppError::NotFound("booking"))?;

    if booking.user_id != actor.user_id && !actor.is_admin() {
        return Err(AppError::Authorization(
            "Only the guest may confirm this payment".to_string(),
        ));
    }

    let payment = uow
        .payments_for_booking(booking_id)
        .await?
        .into_iter()
        .find(|p| {
            p.channel == PaymentChannel::Online
                && p.gateway_order_id.as_deref() == Some(verification.gateway_order_id.as_str())
        })
        .ok_or_else(|| AppError::Validation("Order does not belong to this booking".to_string()))?;
    uow.rollback().await?;

    if payment.status == PaymentRecordStatus::Completed
        && payment.gateway_payment_id.as_deref() == Some(verification.gateway_payment_id.as_str())
    {
        return Ok(booking);
    }

    let verified = engine
        .gateway
        .verify_payment(
            &verification.gateway_order_id,
            &verification.gateway_payment_id,
            &verification.signature,
        )
        .await?;
    if !verified {
        tracing::warn!(%booking_id, order_id = %verification.gateway_order_id, "Payment signature rejected");
        return Err(AppError::Validation("Payment signature is invalid".to_string()));
    }

    let now = Utc::now();
    let mut uow = engine.store.begin().await?;
    let mut booking = uow
        .lock_booking(booking_id)
        .await?
        .ok_or(AppError::NotFound("booking"))?;
    if booking.status == BookingStatus::Cancelled {
        return Err(AppError::Conflict(
            "Booking was cancelled before the payment was confirmed".to_string(),
        ));
    }

    let mut payment = uow
        .lock_payment(payment.id)
        .await?
        .ok_or(AppError::NotFound("payment"))?;
    if payment.status == PaymentRecordStatus::Completed {
        if payment.gateway_payment_id.as_deref() == Some(verification.gateway_payment_id.as_str()) {
            uow.rollback().await?;
            return Ok(booking);
        }
        return Err(AppError::Conflict("Payment is already completed".to_string()));
    }

    let collected = collected_cents(&uow.payments_for_booking(booking_id).await?);
    if collected + payment.amount_cents > booking.total_cents {
        return Err(AppError::Conflict(
            "Payment would exceed the booking total".to_string(),
        ));
    }

    payment.status = PaymentRecordStatus::Completed;
    payment.gateway_payment_id = Some(verification.gateway_payment_id);
    payment.updated_at = now;
    uow.update_payment(&payment).await?;

    booking.status = BookingStatus::Confirmed;
    if collected + payment.amount_cents == booking.total_cents {
        booking.payment_status = PaymentStatus::Completed;
    }
    booking.updated_at = now;
    uow.update_booking(&booking).await?;

    uow.commit().await?;

    tracing::info!(%booking_id, payment_id = %payment.id, "Online payment confirmed");

    dispatch(
        &engine.notifier,
        templates::BOOKING_CONFIRMED,
        booking.user_id,
        json!({
            "booking_id": booking.id,
            "amount_cents": payment.amount_cents,
        }),
    );

    Ok(booking)
}

/// Mark an offline payment as received at the hotel.
///
/// When every payment row of the booking is completed the booking's payment
/// status becomes `completed`. Settling an already completed payment returns
/// it unchanged.
pub async fn settle_offline_payment<S: Store>(
    engine: &Engine<S>,
    operator: &Actor,
    booking_id: Uuid,
    payment_id: Uuid,
) -> Result<Payment, AppError> {
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
    ensure_hotel_operator(operator, &hotel)?;

    let mut payment = uow
        .lock_payment(payment_id)
        .await?
        .filter(|p| p.booking_id == booking_id)
        .ok_or(AppError::NotFound("payment"))?;

    if payment.channel != PaymentChannel::Offline {
        return Err(AppError::Validation(
            "Only offline payments can be settled at the hotel".to_string(),
        ));
    }
    if payment.status == PaymentRecordStatus::Completed {
        uow.rollback().await?;
        return Ok(payment);
    }
    if booking.status == BookingStatus::Cancelled {
        return Err(AppError::Conflict("Booking is cancelled".to_string()));
    }

    let payments = uow.payments_for_booking(booking_id).await?;
    let collected = collected_cents(&payments);
    if collected + payment.amount_cents > booking.total_cents {
        return Err(AppError::Conflict(
            "Payment would exceed the booking total".to_string(),
        ));
    }

    payment.status = PaymentRecordStatus::Completed;
    payment.updated_at = now;
    uow.update_payment(&payment).await?;

    let all_settled = payments
        .iter()
        .all(|p| p.id == payment.id || p.status == PaymentRecordStatus::Completed);
    if all_settled {
        booking.payment_status = PaymentStatus::Completed;
        booking.updated_at = now;
        uow.update_booking(&booking).await?;
    }

    uow.commit().await?;

    tracing::info!(%booking_id, %payment_id, operator = %operator.user_id, "Offline payment settled");
    Ok(payment)
}

/// Close a confirmed booking once the guest has checked out.
pub async fn complete_stay<S: Store>(
    engine: &Engine<S>,
    operator: &Actor,
    booking_id: Uuid,
) -> Result<Booking, AppError> {
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
    ensure_hotel_operator(operator, &hotel)?;

    if booking.status != BookingStatus::Confirmed {
        return Err(AppError::Conflict(format!(
            "Only confirmed bookings can be completed, booking is {:?}",
            booking.status
        )));
    }
    if now < booking.check_out {
        return Err(AppError::Validation("Stay has not ended yet".to_string()));
    }

    booking.status = BookingStatus::Completed;
    booking.updated_at = now;
    uow.update_booking(&booking).await?;
    uow.commit().await?;

    tracing::info!(%booking_id, "Stay completed");
    Ok(booking)
}
