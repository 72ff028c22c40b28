//! Collaborators outside the engine: the payment gateway and notification
//! delivery.

pub mod gateway;
pub mod notifier;

pub use gateway::{GatewayError, HttpPaymentGateway, PaymentGateway};
pub use notifier::{LogNotifier, NotificationDispatcher, NotifyError, WebhookNotifier, dispatch};
