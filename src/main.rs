//! Booking backend HTTP server.

use seathold::config::Config;
use seathold::engine::{janitor, ReservationEngine};
use seathold::payment::build_verifier;
use seathold::server::{build_router, AppState};
use seathold::stores::{PgStore, RedisLockStore};
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seathold=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting booking backend");

    let config = Config::from_env();
    info!(
        postgres_url = %config.postgres.url,
        redis_url = %config.redis.url,
        lock_ttl = config.lock.ttl_seconds,
        payment_mode = ?config.payment.mode,
        "Configuration loaded"
    );

    info!("Connecting to durable store...");
    let store = Arc::new(PgStore::connect(&config.postgres).await?);
    store.migrate().await?;
    info!("Durable store ready");

    info!("Connecting to lock store...");
    let locks = Arc::new(RedisLockStore::connect(&config.redis.url).await?);
    info!("Lock store ready");

    let payment = build_verifier(&config.payment);

    let engine = Arc::new(ReservationEngine::new(
        locks.clone(),
        store.clone(),
        payment,
        config.lock.ttl_seconds,
        config.payment.default_currency.clone(),
    ));

    let janitor_handle = (config.lock.janitor_interval > 0)
        .then(|| janitor::spawn(store.clone(), config.lock.janitor_interval));

    let state = AppState::new(engine, store, locks, config.auth.clone());
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Server listening");

    // Graceful shutdown: stop accepting, drain in-flight handlers, then
    // stop the janitor and drop the adapters.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = janitor_handle {
        handle.abort();
    }

    info!("Server stopped");
    Ok(())
}

/// Wait for Ctrl+C (SIGINT) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
