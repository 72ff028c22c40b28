//! Wallet account and ledger models.
//!
//! # Balance Storage
//!
//! Balances are `i64` cents, like every amount in the engine.
//!
//! # Invariants
//!
//! - `balance_cents == total_earned_cents - total_spent_cents`
//! - `balance_cents >= 0`
//! - replaying a wallet's transactions in creation order reproduces
//!   `balance_cents` exactly

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct WalletAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance_cents: i64,
    pub total_earned_cents: i64,
    pub total_spent_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WalletAccount {
    pub fn empty(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            balance_cents: 0,
            total_earned_cents: 0,
            total_spent_cents: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ledger_direction", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LedgerDirection {
    Credit,
    Debit,
}

/// Why money entered or left a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "wallet_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WalletSource {
    Refund,
    Booking,
    TopUp,
    Cashback,
    Adjustment,
}

/// Append-only ledger row. Never updated after insert.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub user_id: Uuid,
    pub direction: LedgerDirection,
    pub amount_cents: i64,

    /// Wallet balance right after this row was applied
    pub balance_after_cents: i64,

    pub source: WalletSource,

    /// Free-form pointer to what caused the movement (refund id, booking id)
    pub reference: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    /// Signed effect on the balance.
    pub fn delta_cents(&self) -> i64 {
        match self.direction {
            LedgerDirection::Credit => self.amount_cents,
            LedgerDirection::Debit => -self.amount_cents,
        }
    }
}

/// Outcome of a credit or debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerReceipt {
    pub transaction_id: Uuid,
    pub new_balance_cents: i64,
}

/// Result of replaying a wallet's ledger against its stored totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerReconciliation {
    pub balance_cents: i64,
    pub replayed_balance_cents: i64,
    pub total_earned_cents: i64,
    pub total_spent_cents: i64,
    pub transaction_count: usize,
}

impl LedgerReconciliation {
    pub fn is_consistent(&self) -> bool {
        self.balance_cents == self.replayed_balance_cents
            && self.balance_cents == self.total_earned_cents - self.total_spent_cents
            && self.balance_cents >= 0
    }
}
