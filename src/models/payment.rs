//! Payment records attached to bookings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::booking::PaymentChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Advance,
    Remaining,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_record_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentRecordStatus {
    Pending,
    Completed,
    Failed,
}

/// One expected or received payment for a booking.
///
/// The sum of `Completed` amounts for a booking never exceeds its total.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub amount_cents: i64,
    pub channel: PaymentChannel,
    pub payment_type: PaymentType,
    pub status: PaymentRecordStatus,

    /// Gateway order the guest pays against (online only)
    pub gateway_order_id: Option<String>,

    /// Gateway payment id, known once verification succeeds
    pub gateway_payment_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn pending(
        booking_id: Uuid,
        amount_cents: i64,
        channel: PaymentChannel,
        payment_type: PaymentType,
        gateway_order_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            amount_cents,
            channel,
            payment_type,
            status: PaymentRecordStatus::Pending,
            gateway_order_id,
            gateway_payment_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Sum of completed payment amounts.
pub fn collected_cents(payments: &[Payment]) -> i64 {
    payments
        .iter()
        .filter(|p| p.status == PaymentRecordStatus::Completed)
        .map(|p| p.amount_cents)
        .sum()
}
