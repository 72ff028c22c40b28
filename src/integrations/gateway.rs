//! Payment gateway interface and its HTTP implementation.
//!
//! Gateway calls are never made inside a unit of work. Callers create the
//! order before committing a booking and reconcile payment rows afterwards
//! through signature verification.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("gateway is misconfigured: {0}")]
    Config(String),
}

impl From<GatewayError> for AppError {
    fn from(error: GatewayError) -> Self {
        AppError::ExternalGateway(error.to_string())
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create an order the guest pays against. Returns the gateway order id.
    async fn create_order(
        &self,
        amount_cents: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<String, GatewayError>;

    /// Check the signature the client received after paying.
    async fn verify_payment(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<bool, GatewayError>;

    /// Refund part or all of a captured payment. Returns the gateway refund id.
    async fn refund(&self, payment_id: &str, amount_cents: i64) -> Result<String, GatewayError>;
}

/// Gateway speaking a Razorpay-compatible REST API.
///
/// # Authentication
///
/// Requests use HTTP basic auth with the key id and secret. Payment
/// signatures are `hex(HMAC-SHA256(secret, "<order_id>|<payment_id>"))`.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

#[derive(Debug, Deserialize)]
struct EntityId {
    id: String,
}

impl HttpPaymentGateway {
    pub fn new(base_url: &str, key_id: String, key_secret: String) -> Result<Self, GatewayError> {
        url::Url::parse(base_url)
            .map_err(|e| GatewayError::Config(format!("invalid base url: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            key_id,
            key_secret,
        })
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<EntityId, GatewayError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<EntityId>().await?)
    }
}

/// Constant-time check of a hex HMAC-SHA256 signature over `message`.
pub fn verify_signature(secret: &str, message: &str, signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(message.as_bytes());
    mac.verify_slice(&signature).is_ok()
}

/// Hex HMAC-SHA256 signature of `message`.
pub fn sign(secret: &str, message: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_order(
        &self,
        amount_cents: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<String, GatewayError> {
        let order = self
            .post(
                "/orders",
                json!({
                    "amount": amount_cents,
                    "currency": currency,
                    "receipt": receipt,
                }),
            )
            .await?;

        tracing::info!(order_id = %order.id, receipt, "Gateway order created");
        Ok(order.id)
    }

    async fn verify_payment(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<bool, GatewayError> {
        let message = format!("{}|{}", order_id, payment_id);
        Ok(verify_signature(&self.key_secret, &message, signature))
    }

    async fn refund(&self, payment_id: &str, amount_cents: i64) -> Result<String, GatewayError> {
        let refund = self
            .post(
                &format!("/payments/{}/refund", payment_id),
                json!({ "amount": amount_cents }),
            )
            .await?;

        tracing::info!(refund_id = %refund.id, payment_id, amount_cents, "Gateway refund created");
        Ok(refund.id)
    }
}
