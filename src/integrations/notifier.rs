//! Notification dispatch.
//!
//! Notifications are side effects of already-committed state changes. They
//! run on a spawned task and their failures are logged, never returned.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::integrations::gateway::sign;

/// Template keys sent by the engine.
pub mod templates {
    pub const BOOKING_CREATED: &str = "booking_created";
    pub const BOOKING_CONFIRMED: &str = "booking_confirmed";
    pub const BOOKING_CANCELLED: &str = "booking_cancelled";
    pub const REFUND_PROCESSED: &str = "refund_processed";
    pub const REFUND_REJECTED: &str = "refund_rejected";
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notification endpoint answered {0}")]
    Status(u16),

    #[error("invalid notification url: {0}")]
    InvalidUrl(String),
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(&self, template_key: &str, user_id: Uuid, variables: Value) -> Result<(), NotifyError>;
}

/// Fire-and-forget: run the notification on its own task and log failures.
pub fn dispatch(
    notifier: &Arc<dyn NotificationDispatcher>,
    template_key: &'static str,
    user_id: Uuid,
    variables: Value,
) {
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(template_key, user_id, variables).await {
            tracing::warn!(template_key, %user_id, "Notification failed: {}", e);
        }
    });
}

/// Writes notifications to the log only. Used when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl NotificationDispatcher for LogNotifier {
    async fn notify(&self, template_key: &str, user_id: Uuid, variables: Value) -> Result<(), NotifyError> {
        tracing::info!(template_key, %user_id, %variables, "Notification");
        Ok(())
    }
}

#[derive(Serialize)]
struct NotificationPayload<'a> {
    event_id: Uuid,
    template_key: &'a str,
    user_id: Uuid,
    variables: Value,
}

/// Posts notifications to a delivery service.
///
/// # Headers Sent
///
/// - `Content-Type: application/json`
/// - `X-Webhook-Signature: sha256=<hex>` (HMAC-SHA256 of the body)
/// - `X-Webhook-Event-Id: <uuid>`
///
/// # Timeout
///
/// 5 seconds per request
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    secret: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, secret: String) -> Result<Self, NotifyError> {
        validate_webhook_url(url)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            secret,
        })
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookNotifier {
    async fn notify(&self, template_key: &str, user_id: Uuid, variables: Value) -> Result<(), NotifyError> {
        let event_id = Uuid::new_v4();
        let payload = NotificationPayload {
            event_id,
            template_key,
            user_id,
            variables,
        };
        // Serializing a struct of strings, uuids and a Value cannot fail
        let body = serde_json::to_string(&payload).unwrap_or_default();
        let signature = format!("sha256={}", sign(&self.secret, &body));

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("X-Webhook-Signature", signature)
            .header("X-Webhook-Event-Id", event_id.to_string())
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

/// HTTPS only, except plain HTTP to localhost for development.
fn validate_webhook_url(url: &str) -> Result<(), NotifyError> {
    if url.len() > 2048 {
        return Err(NotifyError::InvalidUrl("URL exceeds 2048 characters".to_string()));
    }

    let parsed = url::Url::parse(url).map_err(|_| NotifyError::InvalidUrl("Invalid URL format".to_string()))?;

    match parsed.scheme() {
        "https" => Ok(()),
        "http" if matches!(parsed.host_str(), Some("localhost" | "127.0.0.1" | "0.0.0.0")) => Ok(()),
        "http" => Err(NotifyError::InvalidUrl(
            "HTTP is only allowed for localhost. Use HTTPS for production.".to_string(),
        )),
        _ => Err(NotifyError::InvalidUrl("URL must use HTTP or HTTPS".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_url_rules() {
        assert!(validate_webhook_url("https://notify.example.com/hook").is_ok());
        assert!(validate_webhook_url("http://localhost:8080/hook").is_ok());
        assert!(validate_webhook_url("http://notify.example.com/hook").is_err());
        assert!(validate_webhook_url("ftp://notify.example.com").is_err());
        assert!(validate_webhook_url("nonsense").is_err());
    }
}
