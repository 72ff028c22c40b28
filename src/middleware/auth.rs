//! Bearer API keys resolve to the [`Actor`](crate::models::actor::Actor)
//! every engine operation is authorized against.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

use crate::{engine::Engine, error::AppError, models::api_key::ApiKey, store::PgStore};

/// Hex-encoded SHA-256 of a raw API key, as stored in `api_keys.key_hash`.
pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Look up `Authorization: Bearer <key>` among the active keys and attach
/// the owning actor as a request extension. Missing or inactive keys get a
/// 401.
pub async fn auth_middleware(
    State(engine): State<Engine<PgStore>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let api_key = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::InvalidApiKey)?;

    let record = sqlx::query_as::<_, ApiKey>(
        "SELECT id, key_hash, user_id, role, created_at, is_active
         FROM api_keys
         WHERE key_hash = $1 AND is_active = true",
    )
    .bind(hash_api_key(api_key))
    .fetch_optional(engine.store.pool())
    .await?
    .ok_or(AppError::InvalidApiKey)?;

    let actor = record.actor();
    tracing::debug!(user_id = %actor.user_id, role = ?actor.role, "Request authenticated");
    request.extensions_mut().insert(actor);

    Ok(next.run(request).await)
}
