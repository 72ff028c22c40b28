//! Error types and HTTP error response handling.
//!
//! Every engine operation returns `Result<T, AppError>`. The variants follow
//! the caller-facing taxonomy: the caller must be able to tell "retry with
//! different input" (validation, conflict) from "retry later" (gateway) from
//! "nothing to retry" (not found, authorization).

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Validation**: malformed input, including a tampered client price
/// - **Conflict**: the request collides with existing state (room taken,
///   coupon exhausted, duplicate refund request)
/// - **NotFound**: unknown room, hotel, coupon, booking, payment or refund
/// - **InsufficientFunds**: wallet debit larger than the balance
/// - **ExternalGateway**: the payment gateway failed or timed out
/// - **Authorization**: the actor may not touch this booking or refund
/// - **Database**: the persistent store failed
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Store operation failed (connection error, query error).
    ///
    /// Unique and exclusion violations are mapped to `Conflict` by the
    /// Postgres store before they reach this variant.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Input is malformed or inconsistent. Returns HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// Request conflicts with current state. Returns HTTP 409.
    #[error("{0}")]
    Conflict(String),

    /// Referenced entity does not exist. Returns HTTP 404.
    ///
    /// The string names the kind of entity ("room", "booking", ...).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Wallet debit exceeds the current balance. Returns HTTP 422.
    #[error("Insufficient funds: requested {requested_cents}, available {available_cents}")]
    InsufficientFunds {
        requested_cents: i64,
        available_cents: i64,
    },

    /// Payment gateway call failed. Returns HTTP 502.
    #[error("Payment gateway error: {0}")]
    ExternalGateway(String),

    /// Actor lacks rights for the operation. Returns HTTP 403.
    #[error("{0}")]
    Authorization(String),

    /// Missing or unknown API key. Returns HTTP 401.
    #[error("Invalid API key")]
    InvalidApiKey,
}

impl AppError {
    /// Short machine-readable code used in HTTP error bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "internal_error",
            AppError::Validation(_) => "validation_error",
            AppError::Conflict(_) => "conflict",
            AppError::NotFound(_) => "not_found",
            AppError::InsufficientFunds { .. } => "insufficient_funds",
            AppError::ExternalGateway(_) => "gateway_error",
            AppError::Authorization(_) => "forbidden",
            AppError::InvalidApiKey => "invalid_api_key",
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "conflict",
///     "message": "Room is already booked for the requested dates"
///   }
/// }
/// ```
///
/// Database errors hide their details from the client.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ExternalGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                "An internal error occurred".to_string()
            }
            ref other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
