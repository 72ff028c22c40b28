//! Booking data models and request types.
//!
//! This module defines:
//! - `Booking`: a guest's reservation of one room over a half-open date range
//! - `PaymentMode`: how the booking is paid, as a closed variant
//! - `StayWindow`: a validated `[check_in, check_out)` range
//! - `CreateBookingRequest`: parameters for the booking orchestrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Whether a booking is priced per night or per hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingType {
    Daily,
    Hourly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Refunded,
}

/// Channel a payment is collected through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_channel", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentChannel {
    Online,
    Offline,
}

/// How a booking is paid.
///
/// Offline bookings carry their split: `advance_cents` collected up front and
/// `remaining_cents` due at the hotel, always summing to the booking total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PaymentMode {
    Online,
    Offline {
        advance_cents: i64,
        remaining_cents: i64,
    },
}

impl PaymentMode {
    pub fn channel(&self) -> PaymentChannel {
        match self {
            PaymentMode::Online => PaymentChannel::Online,
            PaymentMode::Offline { .. } => PaymentChannel::Offline,
        }
    }
}

/// Payment mode as requested by the client, before the total is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RequestedPaymentMode {
    Online,
    Offline {
        #[serde(default)]
        advance_cents: Option<i64>,
    },
}

impl RequestedPaymentMode {
    pub fn channel(&self) -> PaymentChannel {
        match self {
            RequestedPaymentMode::Online => PaymentChannel::Online,
            RequestedPaymentMode::Offline { .. } => PaymentChannel::Offline,
        }
    }

    /// Resolve against the authoritative total.
    ///
    /// An offline advance must be strictly between zero and the total; an
    /// absent advance means the whole amount is due at the hotel.
    pub fn resolve(self, total_cents: i64) -> Result<PaymentMode, AppError> {
        match self {
            RequestedPaymentMode::Online => Ok(PaymentMode::Online),
            RequestedPaymentMode::Offline { advance_cents: None } => Ok(PaymentMode::Offline {
                advance_cents: 0,
                remaining_cents: total_cents,
            }),
            RequestedPaymentMode::Offline {
                advance_cents: Some(advance),
            } => {
                if advance <= 0 || advance >= total_cents {
                    return Err(AppError::Validation(format!(
                        "Advance must be greater than 0 and less than the total of {}",
                        total_cents
                    )));
                }
                Ok(PaymentMode::Offline {
                    advance_cents: advance,
                    remaining_cents: total_cents - advance,
                })
            }
        }
    }
}

/// A validated half-open stay range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayWindow {
    pub check_in: DateTime<Utc>,
    pub check_out: DateTime<Utc>,
}

impl StayWindow {
    pub fn new(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> Result<Self, AppError> {
        if check_out <= check_in {
            return Err(AppError::Validation(
                "Check-out must be after check-in".to_string(),
            ));
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    /// Half-open overlap: touching ranges do not overlap.
    pub fn overlaps(&self, check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> bool {
        check_in < self.check_out && check_out > self.check_in
    }
}

/// A booking record.
///
/// `check_in`/`check_out` never change once the booking is confirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub room_id: Uuid,
    pub hotel_id: Uuid,

    /// Guest who owns the booking
    pub user_id: Uuid,

    pub booking_type: BookingType,
    pub check_in: DateTime<Utc>,
    pub check_out: DateTime<Utc>,
    pub guest_count: i32,

    /// Price after adjustments, before the coupon
    pub base_cents: i64,

    pub discount_cents: i64,

    /// Amount charged: `base_cents - discount_cents`
    pub total_cents: i64,

    pub coupon_id: Option<Uuid>,
    pub payment_mode: PaymentMode,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn stay(&self) -> StayWindow {
        StayWindow {
            check_in: self.check_in,
            check_out: self.check_out,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status != BookingStatus::Cancelled
    }

    pub fn mark_cancelled(&mut self, by: Uuid, reason: String, at: DateTime<Utc>) {
        self.status = BookingStatus::Cancelled;
        self.cancelled_at = Some(at);
        self.cancelled_by = Some(by);
        self.cancellation_reason = Some(reason);
        self.updated_at = at;
    }

    /// Undo a cancellation; the only path by which a booking leaves `Cancelled`.
    pub fn reinstate(&mut self, at: DateTime<Utc>) {
        self.status = BookingStatus::Confirmed;
        self.cancelled_at = None;
        self.cancelled_by = None;
        self.cancellation_reason = None;
        self.updated_at = at;
    }
}

/// Parameters for creating a booking.
///
/// # JSON Example
///
/// ```json
/// {
///   "room_id": "550e8400-e29b-41d4-a716-446655440000",
///   "check_in": "2024-06-01T12:00:00Z",
///   "check_out": "2024-06-03T12:00:00Z",
///   "guest_count": 2,
///   "booking_type": "daily",
///   "coupon_code": "SAVE10",
///   "payment_mode": { "mode": "offline", "advance_cents": 50000 },
///   "quoted_total_cents": 180000
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub room_id: Uuid,
    pub check_in: DateTime<Utc>,
    pub check_out: DateTime<Utc>,
    pub guest_count: i32,

    #[serde(default = "default_booking_type")]
    pub booking_type: BookingType,

    pub coupon_code: Option<String>,
    pub payment_mode: RequestedPaymentMode,

    /// Total the client displayed to the guest; must match the server price
    pub quoted_total_cents: i64,
}

fn default_booking_type() -> BookingType {
    BookingType::Daily
}

/// Parameters for verifying an online payment with the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentVerification {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

/// Result of creating a booking.
///
/// `gateway_order_id` is set for online bookings; the client completes the
/// payment against it and then calls verification.
#[derive(Debug, Clone, Serialize)]
pub struct BookingReceipt {
    pub booking: Booking,
    pub gateway_order_id: Option<String>,
}
