//! Liveness probe for the booking engine.

use crate::{engine::Engine, error::AppError, store::PgStore};
use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    /// Connections currently open in the pool
    pub pool_size: u32,
    /// Currency every amount is settled in
    pub currency: String,
    pub timestamp: DateTime<Utc>,
}

/// `GET /health`
///
/// Round-trips `SELECT 1` through the pool. An unreachable database surfaces
/// as the usual `internal_error` response.
pub async fn health_check(
    State(engine): State<Engine<PgStore>>,
) -> Result<Json<HealthResponse>, AppError> {
    let pool = engine.store.pool();
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(Json(HealthResponse {
        status: "healthy",
        database: "connected",
        pool_size: pool.size(),
        currency: engine.settings.currency.clone(),
        timestamp: Utc::now(),
    }))
}
