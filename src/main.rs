//! Booking Engine - Main Application Entry Point
//!
//! REST API server exposing the booking engine: availability, quotes,
//! bookings, payment confirmation, cancellations, refunds and wallets.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: API key with SHA-256 hashing, resolved to an actor
//! - **Payments**: REST payment gateway over reqwest
//! - **Notifications**: signed webhook, or log-only when unconfigured
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build gateway, notifier and engine
//! 5. Build HTTP router with routes and middleware
//! 6. Start server on configured port

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use hotel_booking_engine::{
    config, db,
    engine::Engine,
    handlers,
    integrations::{HttpPaymentGateway, LogNotifier, NotificationDispatcher, WebhookNotifier},
    middleware,
    store::PgStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG (defaults to "info")
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let gateway = HttpPaymentGateway::new(
        &config.gateway_base_url,
        config.gateway_key_id.clone(),
        config.gateway_key_secret.clone(),
    )?;

    let notifier: Arc<dyn NotificationDispatcher> =
        match (&config.notify_webhook_url, &config.notify_webhook_secret) {
            (Some(url), Some(secret)) => {
                tracing::info!("Notifications go to {}", url);
                Arc::new(WebhookNotifier::new(url, secret.clone())?)
            }
            _ => {
                tracing::warn!("No notification webhook configured, logging notifications only");
                Arc::new(LogNotifier)
            }
        };

    let engine = Engine::new(
        PgStore::new(pool),
        Arc::new(gateway),
        notifier,
        config.engine_settings(),
    );

    let authenticated_routes = Router::new()
        // Availability and pricing
        .route(
            "/api/v1/rooms/{id}/availability",
            get(handlers::bookings::check_availability),
        )
        .route("/api/v1/quotes", post(handlers::bookings::quote))
        // Bookings
        .route("/api/v1/bookings", post(handlers::bookings::create_booking))
        .route(
            "/api/v1/bookings/{id}/payment/verify",
            post(handlers::bookings::verify_payment),
        )
        .route(
            "/api/v1/bookings/{id}/payments/{payment_id}/settle",
            post(handlers::bookings::settle_payment),
        )
        .route(
            "/api/v1/bookings/{id}/complete",
            post(handlers::bookings::complete_stay),
        )
        // Cancellations and refunds
        .route(
            "/api/v1/bookings/{id}/cancel",
            post(handlers::refunds::cancel_booking),
        )
        .route(
            "/api/v1/refunds/{id}/process",
            post(handlers::refunds::process_refund),
        )
        .route(
            "/api/v1/refunds/{id}/reject",
            post(handlers::refunds::reject_refund),
        )
        // Wallet
        .route("/api/v1/wallet", get(handlers::wallet::get_balance))
        .route(
            "/api/v1/wallet/transactions",
            get(handlers::wallet::get_history),
        )
        .route(
            "/api/v1/wallet/reconcile",
            get(handlers::wallet::reconcile),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            engine.clone(),
            middleware::auth::auth_middleware,
        ));

    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(engine);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
