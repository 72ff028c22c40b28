//! Wallet ledger - per-user balances with an append-only history.
//!
//! This service handles:
//! - Atomic credits and debits
//! - Non-negative balance enforcement
//! - Ledger replay for reconciliation
//!
//! # Atomicity Guarantees
//!
//! Every balance change locks the wallet row, updates the running totals and
//! appends one ledger row inside a single unit of work. The `*_in` variants
//! join a caller's unit of work so a refund and its wallet credit commit
//! together.

use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::wallet::{
    LedgerDirection, LedgerReceipt, LedgerReconciliation, WalletSource, WalletTransaction,
};
use crate::store::{Store, UnitOfWork};

/// Current wallet totals. Users without a wallet read as all zeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WalletBalance {
    pub user_id: Uuid,
    pub balance_cents: i64,
    pub total_earned_cents: i64,
    pub total_spent_cents: i64,
}

fn ensure_positive(amount_cents: i64) -> Result<(), AppError> {
    if amount_cents <= 0 {
        return Err(AppError::Validation("Amount must be positive".to_string()));
    }
    Ok(())
}

fn overflow() -> AppError {
    AppError::Validation("Amount exceeds the wallet limit".to_string())
}

/// Add money to a user's wallet inside an open unit of work.
///
/// # Process
///
/// 1. Lock the wallet, creating it on first use
/// 2. Raise balance and lifetime earnings
/// 3. Append a credit row to the ledger
///
/// # Errors
///
/// - `Validation`: amount is zero, negative, or would overflow the balance
/// - `Database`: store failure
pub async fn credit_in<U: UnitOfWork>(
    uow: &mut U,
    user_id: Uuid,
    amount_cents: i64,
    source: WalletSource,
    reference: Option<String>,
) -> Result<LedgerReceipt, AppError> {
    ensure_positive(amount_cents)?;

    let mut wallet = uow.lock_or_create_wallet(user_id).await?;
    let now = chrono::Utc::now();

    wallet.balance_cents = wallet.balance_cents.checked_add(amount_cents).ok_or_else(overflow)?;
    wallet.total_earned_cents = wallet
        .total_earned_cents
        .checked_add(amount_cents)
        .ok_or_else(overflow)?;
    wallet.updated_at = now;
    uow.save_wallet(&wallet).await?;

    let entry = WalletTransaction {
        id: Uuid::new_v4(),
        wallet_id: wallet.id,
        user_id,
        direction: LedgerDirection::Credit,
        amount_cents,
        balance_after_cents: wallet.balance_cents,
        source,
        reference,
        created_at: now,
    };
    uow.append_wallet_transaction(&entry).await?;

    Ok(LedgerReceipt {
        transaction_id: entry.id,
        new_balance_cents: wallet.balance_cents,
    })
}

/// Take money from a user's wallet inside an open unit of work.
///
/// Fails closed: on `InsufficientFunds` nothing is written.
///
/// # Errors
///
/// - `Validation`: amount is zero or negative
/// - `InsufficientFunds`: balance is lower than the amount
/// - `Database`: store failure
pub async fn debit_in<U: UnitOfWork>(
    uow: &mut U,
    user_id: Uuid,
    amount_cents: i64,
    source: WalletSource,
    reference: Option<String>,
) -> Result<LedgerReceipt, AppError> {
    ensure_positive(amount_cents)?;

    let mut wallet = uow.lock_or_create_wallet(user_id).await?;
    if wallet.balance_cents < amount_cents {
        return Err(AppError::InsufficientFunds {
            requested_cents: amount_cents,
            available_cents: wallet.balance_cents,
        });
    }

    let now = chrono::Utc::now();
    wallet.balance_cents -= amount_cents;
    wallet.total_spent_cents = wallet
        .total_spent_cents
        .checked_add(amount_cents)
        .ok_or_else(overflow)?;
    wallet.updated_at = now;
    uow.save_wallet(&wallet).await?;

    let entry = WalletTransaction {
        id: Uuid::new_v4(),
        wallet_id: wallet.id,
        user_id,
        direction: LedgerDirection::Debit,
        amount_cents,
        balance_after_cents: wallet.balance_cents,
        source,
        reference,
        created_at: now,
    };
    uow.append_wallet_transaction(&entry).await?;

    Ok(LedgerReceipt {
        transaction_id: entry.id,
        new_balance_cents: wallet.balance_cents,
    })
}

/// Credit a wallet in its own unit of work.
pub async fn credit<S: Store>(
    store: &S,
    user_id: Uuid,
    amount_cents: i64,
    source: WalletSource,
    reference: Option<String>,
) -> Result<LedgerReceipt, AppError> {
    let mut uow = store.begin().await?;
    let receipt = credit_in(&mut uow, user_id, amount_cents, source, reference).await?;
    uow.commit().await?;

    tracing::info!(%user_id, amount_cents, ?source, balance = receipt.new_balance_cents, "Wallet credited");
    Ok(receipt)
}

/// Debit a wallet in its own unit of work.
pub async fn debit<S: Store>(
    store: &S,
    user_id: Uuid,
    amount_cents: i64,
    source: WalletSource,
    reference: Option<String>,
) -> Result<LedgerReceipt, AppError> {
    let mut uow = store.begin().await?;
    let receipt = match debit_in(&mut uow, user_id, amount_cents, source, reference).await {
        Ok(receipt) => receipt,
        Err(e) => {
            uow.rollback().await?;
            return Err(e);
        }
    };
    uow.commit().await?;

    tracing::info!(%user_id, amount_cents, ?source, balance = receipt.new_balance_cents, "Wallet debited");
    Ok(receipt)
}

pub async fn wallet_balance<S: Store>(store: &S, user_id: Uuid) -> Result<WalletBalance, AppError> {
    let mut uow = store.begin().await?;
    let wallet = uow.find_wallet(user_id).await?;
    uow.rollback().await?;

    Ok(match wallet {
        Some(w) => WalletBalance {
            user_id,
            balance_cents: w.balance_cents,
            total_earned_cents: w.total_earned_cents,
            total_spent_cents: w.total_spent_cents,
        },
        None => WalletBalance {
            user_id,
            balance_cents: 0,
            total_earned_cents: 0,
            total_spent_cents: 0,
        },
    })
}

/// Ledger rows of the user's wallet, oldest first.
pub async fn wallet_history<S: Store>(store: &S, user_id: Uuid) -> Result<Vec<WalletTransaction>, AppError> {
    let mut uow = store.begin().await?;
    let history = match uow.find_wallet(user_id).await? {
        Some(wallet) => uow.wallet_transactions(wallet.id).await?,
        None => Vec::new(),
    };
    uow.rollback().await?;

    Ok(history)
}

/// Replay the ledger and compare it with the stored totals.
pub async fn reconcile_wallet<S: Store>(store: &S, user_id: Uuid) -> Result<LedgerReconciliation, AppError> {
    let mut uow = store.begin().await?;
    let Some(wallet) = uow.find_wallet(user_id).await? else {
        uow.rollback().await?;
        return Ok(LedgerReconciliation {
            balance_cents: 0,
            replayed_balance_cents: 0,
            total_earned_cents: 0,
            total_spent_cents: 0,
            transaction_count: 0,
        });
    };
    let history = uow.wallet_transactions(wallet.id).await?;
    uow.rollback().await?;

    let reconciliation = LedgerReconciliation {
        balance_cents: wallet.balance_cents,
        replayed_balance_cents: replay(&history),
        total_earned_cents: wallet.total_earned_cents,
        total_spent_cents: wallet.total_spent_cents,
        transaction_count: history.len(),
    };

    if !reconciliation.is_consistent() {
        tracing::error!(%user_id, ?reconciliation, "Wallet ledger does not reconcile");
    }
    Ok(reconciliation)
}

/// Sum of signed ledger deltas.
fn replay(history: &[WalletTransaction]) -> i64 {
    history.iter().map(WalletTransaction::delta_cents).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(direction: LedgerDirection, amount_cents: i64) -> WalletTransaction {
        WalletTransaction {
            id: Uuid::new_v4(),
            wallet_id: Uuid::nil(),
            user_id: Uuid::nil(),
            direction,
            amount_cents,
            balance_after_cents: 0,
            source: WalletSource::Adjustment,
            reference: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn replay_sums_signed_deltas() {
        let history = vec![
            entry(LedgerDirection::Credit, 50_000),
            entry(LedgerDirection::Debit, 20_000),
            entry(LedgerDirection::Credit, 1_000),
        ];
        assert_eq!(replay(&history), 31_000);
        assert_eq!(replay(&[]), 0);
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        assert!(ensure_positive(0).is_err());
        assert!(ensure_positive(-1).is_err());
        assert!(ensure_positive(1).is_ok());
    }
}
