//! Cancellation, fee policy and refund processing.

mod common;

use chrono::{Duration, Utc};
use common::{FakeGateway, Fixture, at, offline, request};

use hotel_booking_engine::{
    error::AppError,
    models::{
        actor::Actor,
        booking::{Booking, BookingStatus, PaymentStatus, PaymentVerification, RequestedPaymentMode},
        refund::{CancellationRequest, RefundMethod, RefundStatus, RefundType},
    },
    services::{booking_service, refund_service, wallet_service},
};
use uuid::Uuid;

fn cancellation(refund_type: RefundType) -> CancellationRequest {
    CancellationRequest {
        reason: "Plans changed".to_string(),
        refund_type,
        refund_method: RefundMethod::Wallet,
    }
}

/// Offline booking for two nights starting `hours_ahead` from now, fully paid.
async fn paid_booking(f: &Fixture, hours_ahead: i64) -> Booking {
    let check_in = Utc::now() + Duration::hours(hours_ahead);
    let booking = booking_service::create_booking(
        &f.engine,
        &f.guest,
        request(&f.room, check_in, check_in + Duration::days(2), offline(), 200_000),
    )
    .await
    .unwrap()
    .booking;

    let payment = f
        .store
        .payments()
        .await
        .into_iter()
        .find(|p| p.booking_id == booking.id)
        .unwrap();
    booking_service::settle_offline_payment(&f.engine, &f.owner, booking.id, payment.id)
        .await
        .unwrap();

    booking
}

#[tokio::test]
async fn late_cancellation_pays_the_fee() {
    let f = Fixture::new().await;
    let booking = paid_booking(&f, 10).await;

    let refund = refund_service::request_cancellation(
        &f.engine,
        &f.guest,
        booking.id,
        cancellation(RefundType::UserCancellation),
    )
    .await
    .unwrap();

    assert_eq!(refund.original_amount_cents, 200_000);
    assert_eq!(refund.cancellation_fee_cents, 40_000);
    assert_eq!(refund.refund_amount_cents, 160_000);
    assert_eq!(refund.status, RefundStatus::Pending);

    let cancelled = f.store.booking(booking.id).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.cancelled_by, Some(f.guest.user_id));
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Plans changed"));
}

#[tokio::test]
async fn early_cancellation_is_free() {
    let f = Fixture::new().await;
    let booking = paid_booking(&f, 72).await;

    let refund = refund_service::request_cancellation(
        &f.engine,
        &f.guest,
        booking.id,
        cancellation(RefundType::UserCancellation),
    )
    .await
    .unwrap();

    assert_eq!(refund.cancellation_fee_cents, 0);
    assert_eq!(refund.refund_amount_cents, 200_000);
}

#[tokio::test]
async fn hotel_cancellation_refunds_in_full() {
    let f = Fixture::new().await;
    let booking = paid_booking(&f, 2).await;

    let refund = refund_service::request_cancellation(
        &f.engine,
        &f.owner,
        booking.id,
        cancellation(RefundType::HotelCancellation),
    )
    .await
    .unwrap();

    assert_eq!(refund.cancellation_fee_cents, 0);
    assert_eq!(refund.refund_amount_cents, refund.original_amount_cents);
}

#[tokio::test]
async fn unpaid_bookings_refund_nothing() {
    let f = Fixture::new().await;
    let booking = booking_service::create_booking(
        &f.engine,
        &f.guest,
        request(&f.room, at(2030, 6, 1), at(2030, 6, 3), offline(), 200_000),
    )
    .await
    .unwrap()
    .booking;

    let refund = refund_service::request_cancellation(
        &f.engine,
        &f.guest,
        booking.id,
        cancellation(RefundType::UserCancellation),
    )
    .await
    .unwrap();
    assert_eq!(refund.original_amount_cents, 0);
    assert_eq!(refund.refund_amount_cents, 0);

    let processed = refund_service::process_refund(&f.engine, &f.owner, refund.id)
        .await
        .unwrap();
    assert_eq!(processed.status, RefundStatus::Processed);
    assert!(processed.wallet_transaction_id.is_none());
    assert!(f.store.wallet(f.guest.user_id).await.is_none());
}

#[tokio::test]
async fn only_authorized_actors_may_cancel() {
    let f = Fixture::new().await;
    let booking = paid_booking(&f, 72).await;

    let stranger = Actor::guest(Uuid::new_v4());
    assert!(matches!(
        refund_service::request_cancellation(&f.engine, &stranger, booking.id, cancellation(RefundType::UserCancellation)).await,
        Err(AppError::Authorization(_))
    ));

    let other_owner = Actor::hotel_owner(Uuid::new_v4());
    assert!(matches!(
        refund_service::request_cancellation(&f.engine, &other_owner, booking.id, cancellation(RefundType::HotelCancellation)).await,
        Err(AppError::Authorization(_))
    ));

    assert!(matches!(
        refund_service::request_cancellation(&f.engine, &f.guest, booking.id, cancellation(RefundType::AdminRefund)).await,
        Err(AppError::Authorization(_))
    ));

    assert_eq!(
        f.store.booking(booking.id).await.unwrap().status,
        BookingStatus::Confirmed
    );
    assert!(f.store.refunds().await.is_empty());

    let refund = refund_service::request_cancellation(
        &f.engine,
        &f.admin,
        booking.id,
        cancellation(RefundType::AdminRefund),
    )
    .await
    .unwrap();
    assert_eq!(refund.requested_by, f.admin.user_id);
    assert_eq!(refund.user_id, f.guest.user_id);
}

#[tokio::test]
async fn a_booking_is_cancelled_once() {
    let f = Fixture::new().await;
    let booking = paid_booking(&f, 72).await;

    refund_service::request_cancellation(&f.engine, &f.guest, booking.id, cancellation(RefundType::UserCancellation))
        .await
        .unwrap();
    let again = refund_service::request_cancellation(
        &f.engine,
        &f.guest,
        booking.id,
        cancellation(RefundType::UserCancellation),
    )
    .await;

    assert!(matches!(again, Err(AppError::Conflict(_))));
    assert_eq!(f.store.refunds().await.len(), 1);
}

#[tokio::test]
async fn processing_credits_the_wallet_exactly_once() {
    let f = Fixture::new().await;
    let booking = paid_booking(&f, 10).await;
    let refund = refund_service::request_cancellation(
        &f.engine,
        &f.guest,
        booking.id,
        cancellation(RefundType::UserCancellation),
    )
    .await
    .unwrap();

    assert!(matches!(
        refund_service::process_refund(&f.engine, &f.guest, refund.id).await,
        Err(AppError::Authorization(_))
    ));

    let processed = refund_service::process_refund(&f.engine, &f.owner, refund.id)
        .await
        .unwrap();
    assert_eq!(processed.status, RefundStatus::Processed);
    assert_eq!(processed.processed_by, Some(f.owner.user_id));
    assert!(processed.wallet_transaction_id.is_some());

    let balance = wallet_service::wallet_balance(&f.store, f.guest.user_id).await.unwrap();
    assert_eq!(balance.balance_cents, 160_000);
    assert_eq!(
        f.store.booking(booking.id).await.unwrap().payment_status,
        PaymentStatus::Refunded
    );

    let again = refund_service::process_refund(&f.engine, &f.owner, refund.id).await;
    assert!(matches!(again, Err(AppError::Conflict(_))));
    assert_eq!(
        wallet_service::wallet_balance(&f.store, f.guest.user_id).await.unwrap().balance_cents,
        160_000
    );
}

#[tokio::test]
async fn original_payment_refunds_go_through_the_gateway() {
    let f = Fixture::new().await;
    let receipt = booking_service::create_booking(
        &f.engine,
        &f.guest,
        request(&f.room, at(2030, 6, 1), at(2030, 6, 3), RequestedPaymentMode::Online, 200_000),
    )
    .await
    .unwrap();
    let order_id = receipt.gateway_order_id.unwrap();
    booking_service::confirm_online_payment(
        &f.engine,
        &f.guest,
        receipt.booking.id,
        PaymentVerification {
            gateway_order_id: order_id.clone(),
            gateway_payment_id: "pay_9".to_string(),
            signature: FakeGateway::signature(&order_id, "pay_9"),
        },
    )
    .await
    .unwrap();

    let refund = refund_service::request_cancellation(
        &f.engine,
        &f.guest,
        receipt.booking.id,
        CancellationRequest {
            reason: "Found another hotel".to_string(),
            refund_type: RefundType::UserCancellation,
            refund_method: RefundMethod::OriginalPayment,
        },
    )
    .await
    .unwrap();

    let processed = refund_service::process_refund(&f.engine, &f.admin, refund.id)
        .await
        .unwrap();

    assert_eq!(f.gateway.refunds(), vec![("pay_9".to_string(), 200_000)]);
    assert_eq!(processed.gateway_refund_id.as_deref(), Some("rfnd_1"));
    assert!(processed.wallet_transaction_id.is_none());
    assert!(f.store.wallet(f.guest.user_id).await.is_none());
}

#[tokio::test]
async fn confirming_a_cancelled_booking_conflicts() {
    let f = Fixture::new().await;
    let receipt = booking_service::create_booking(
        &f.engine,
        &f.guest,
        request(&f.room, at(2030, 6, 1), at(2030, 6, 3), RequestedPaymentMode::Online, 200_000),
    )
    .await
    .unwrap();
    refund_service::request_cancellation(
        &f.engine,
        &f.guest,
        receipt.booking.id,
        cancellation(RefundType::UserCancellation),
    )
    .await
    .unwrap();

    let order_id = receipt.gateway_order_id.unwrap();
    let result = booking_service::confirm_online_payment(
        &f.engine,
        &f.guest,
        receipt.booking.id,
        PaymentVerification {
            gateway_order_id: order_id.clone(),
            gateway_payment_id: "pay_late".to_string(),
            signature: FakeGateway::signature(&order_id, "pay_late"),
        },
    )
    .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn rejecting_a_refund_reinstates_the_booking() {
    let f = Fixture::new().await;
    let booking = paid_booking(&f, 72).await;
    let refund = refund_service::request_cancellation(
        &f.engine,
        &f.guest,
        booking.id,
        cancellation(RefundType::UserCancellation),
    )
    .await
    .unwrap();

    let rejected = refund_service::reject_refund(&f.engine, &f.owner, refund.id, "Outside policy".to_string())
        .await
        .unwrap();
    assert_eq!(rejected.status, RefundStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("Outside policy"));

    let reinstated = f.store.booking(booking.id).await.unwrap();
    assert_eq!(reinstated.status, BookingStatus::Confirmed);
    assert!(reinstated.cancelled_at.is_none());
    assert!(reinstated.cancelled_by.is_none());
    assert!(reinstated.cancellation_reason.is_none());

    assert!(matches!(
        refund_service::process_refund(&f.engine, &f.owner, refund.id).await,
        Err(AppError::Conflict(_))
    ));
}

#[tokio::test]
async fn rejecting_fails_when_the_room_was_rebooked() {
    let f = Fixture::new().await;
    let booking = booking_service::create_booking(
        &f.engine,
        &f.guest,
        request(&f.room, at(2030, 6, 1), at(2030, 6, 3), offline(), 200_000),
    )
    .await
    .unwrap()
    .booking;
    let refund = refund_service::request_cancellation(
        &f.engine,
        &f.guest,
        booking.id,
        cancellation(RefundType::UserCancellation),
    )
    .await
    .unwrap();

    let newcomer = Actor::guest(Uuid::new_v4());
    booking_service::create_booking(
        &f.engine,
        &newcomer,
        request(&f.room, at(2030, 6, 2), at(2030, 6, 4), offline(), 200_000),
    )
    .await
    .unwrap();

    let result = refund_service::reject_refund(&f.engine, &f.owner, refund.id, "No".to_string()).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    assert_eq!(
        f.store.booking(booking.id).await.unwrap().status,
        BookingStatus::Cancelled
    );
    assert_eq!(f.store.refunds().await[0].status, RefundStatus::Pending);
}

#[tokio::test]
async fn cancellation_and_refund_notify_the_guest() {
    let f = Fixture::new().await;
    let booking = paid_booking(&f, 72).await;
    let refund = refund_service::request_cancellation(
        &f.engine,
        &f.guest,
        booking.id,
        cancellation(RefundType::UserCancellation),
    )
    .await
    .unwrap();
    refund_service::process_refund(&f.engine, &f.owner, refund.id)
        .await
        .unwrap();

    let sent = f.notifier.wait_for(3).await;
    assert!(sent.contains(&"booking_cancelled".to_string()));
    assert!(sent.contains(&"refund_processed".to_string()));
}
