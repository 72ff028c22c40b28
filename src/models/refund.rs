//! Refund request models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "refund_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Processed,
    Rejected,
}

/// Who initiated the cancellation, which drives fee policy and authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "refund_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RefundType {
    /// Guest cancels their own booking; hotel fee policy applies
    UserCancellation,
    /// Hotel cancels; always a full refund
    HotelCancellation,
    /// Admin cancels on anyone's behalf; hotel fee policy applies
    AdminRefund,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "refund_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RefundMethod {
    /// Credit the guest's wallet
    Wallet,
    /// Return the money through the payment gateway
    OriginalPayment,
}

/// A refund owed for a cancelled booking. One per booking.
///
/// # Invariants
///
/// - `refund_amount_cents + cancellation_fee_cents == original_amount_cents`
/// - hotel cancellations have `cancellation_fee_cents == 0`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct RefundRequest {
    pub id: Uuid,
    pub booking_id: Uuid,

    /// Guest the refund is owed to
    pub user_id: Uuid,

    /// Amount collected for the booking at cancellation time
    pub original_amount_cents: i64,

    pub cancellation_fee_cents: i64,
    pub refund_amount_cents: i64,
    pub reason: String,
    pub refund_type: RefundType,
    pub refund_method: RefundMethod,
    pub status: RefundStatus,
    pub requested_by: Uuid,
    pub processed_by: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub gateway_refund_id: Option<String>,
    pub wallet_transaction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for cancelling a booking.
///
/// # JSON Example
///
/// ```json
/// {
///   "reason": "Change of plans",
///   "refund_type": "user_cancellation",
///   "refund_method": "wallet"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct CancellationRequest {
    pub reason: String,
    pub refund_type: RefundType,

    #[serde(default = "default_refund_method")]
    pub refund_method: RefundMethod,
}

fn default_refund_method() -> RefundMethod {
    RefundMethod::Wallet
}

#[derive(Debug, Clone, Deserialize)]
pub struct RejectRefundRequest {
    pub reason: String,
}
