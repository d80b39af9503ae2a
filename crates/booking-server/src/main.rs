//! booking-server
//!
//! Axum server exposing payment initiation and verification for bookings.

mod config;
mod error;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use booking_payments::{
    ChapaClient, LogMailer, Mailer, MemoryPaymentStore, NotificationDispatcher, PaymentService,
    SmtpMailer,
};

use crate::config::Config;
use crate::handlers::{health_check, initiate_payment, verify_payment};
use crate::state::AppState;

/// Build the router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/payments/initiate", post(initiate_payment))
        .route("/payments/verify/{booking_reference}", get(verify_payment))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    // Mail delivery
    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, "SMTP mailer configured");
            Arc::new(SmtpMailer::new(smtp)?)
        }
        None => {
            tracing::warn!("SMTP_HOST not set - confirmations will only be logged");
            Arc::new(LogMailer)
        }
    };

    let (dispatcher, worker) = NotificationDispatcher::spawn(mailer, config.dispatcher.clone());

    let gateway = ChapaClient::new(config.chapa.clone())?;
    tracing::info!(
        api_base = %config.chapa.api_base,
        timeout_secs = config.chapa.timeout.as_secs(),
        currency = %config.lifecycle.currency,
        "Chapa gateway configured"
    );

    let payments = PaymentService::new(
        Arc::new(MemoryPaymentStore::new()),
        Arc::new(gateway),
        Arc::new(dispatcher),
        config.lifecycle.clone(),
    );

    let router = app(AppState::new(payments));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("booking-server listening on http://{}", config.bind_addr);
    tracing::info!("  GET  /health");
    tracing::info!("  POST /payments/initiate");
    tracing::info!("  GET  /payments/verify/{{booking_reference}}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router (and with it the last dispatcher) is gone; drain the queue
    let stats = worker.shutdown().await;
    tracing::info!(
        delivered = stats.delivered,
        failed = stats.failed,
        "Notification worker stopped"
    );

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
