//! Shared handle passed to every engine operation.

use std::sync::Arc;

use crate::integrations::{NotificationDispatcher, PaymentGateway};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// ISO 4217 code for gateway orders
    pub currency: String,

    /// Largest accepted gap between a client quote and the server price
    pub price_tolerance_cents: i64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            currency: "INR".to_string(),
            price_tolerance_cents: 1,
        }
    }
}

/// Store plus external collaborators.
///
/// Operations hold no in-memory state between calls; everything shared
/// lives in the store.
#[derive(Clone)]
pub struct Engine<S> {
    pub store: S,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn NotificationDispatcher>,
    pub settings: EngineSettings,
}

impl<S: Store> Engine<S> {
    pub fn new(
        store: S,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationDispatcher>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            settings,
        }
    }
}
