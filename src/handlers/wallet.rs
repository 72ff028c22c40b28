//! Wallet HTTP handlers. Callers only ever see their own wallet.

use axum::{Extension, Json, extract::State};

use crate::{
    engine::Engine,
    error::AppError,
    models::{
        actor::Actor,
        wallet::{LedgerReconciliation, WalletTransaction},
    },
    services::wallet_service::{self, WalletBalance},
    store::PgStore,
};

/// `GET /api/v1/wallet`
pub async fn get_balance(
    State(engine): State<Engine<PgStore>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<WalletBalance>, AppError> {
    let balance = wallet_service::wallet_balance(&engine.store, actor.user_id).await?;
    Ok(Json(balance))
}

/// `GET /api/v1/wallet/transactions`, oldest first
pub async fn get_history(
    State(engine): State<Engine<PgStore>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<WalletTransaction>>, AppError> {
    let history = wallet_service::wallet_history(&engine.store, actor.user_id).await?;
    Ok(Json(history))
}

/// `GET /api/v1/wallet/reconcile`
pub async fn reconcile(
    State(engine): State<Engine<PgStore>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<LedgerReconciliation>, AppError> {
    let report = wallet_service::reconcile_wallet(&engine.store, actor.user_id).await?;
    Ok(Json(report))
}
