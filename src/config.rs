//! Application configuration management.
//!
//! Configuration is read from environment variables with `envy`, after an
//! optional `.env` file has been loaded.

use serde::Deserialize;

use crate::engine::EngineSettings;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `CURRENCY` (optional): ISO 4217 code used for gateway orders, defaults to INR
/// - `PRICE_TOLERANCE_CENTS` (optional): accepted gap between the client quote
///   and the server price, defaults to 1 (0.01 currency unit)
/// - `GATEWAY_BASE_URL` (optional): payment gateway API root
/// - `GATEWAY_KEY_ID` / `GATEWAY_KEY_SECRET` (required): gateway credentials
/// - `NOTIFY_WEBHOOK_URL` / `NOTIFY_WEBHOOK_SECRET` (optional): notification
///   webhook; notifications are only logged when unset
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default = "default_price_tolerance")]
    pub price_tolerance_cents: i64,

    #[serde(default = "default_gateway_base_url")]
    pub gateway_base_url: String,

    pub gateway_key_id: String,

    pub gateway_key_secret: String,

    pub notify_webhook_url: Option<String>,

    pub notify_webhook_secret: Option<String>,
}

fn default_port() -> u16 {
    3000
}

fn default_currency() -> String {
    "INR".to_string()
}

fn default_price_tolerance() -> i64 {
    1
}

fn default_gateway_base_url() -> String {
    "https://api.razorpay.com/v1".to_string()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value cannot
    /// be parsed into its field type.
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        envy::from_env::<Config>()
    }

    /// Engine-level knobs derived from this configuration.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            currency: self.currency.clone(),
            price_tolerance_cents: self.price_tolerance_cents,
        }
    }
}
