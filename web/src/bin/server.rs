//! Booking server.
//!
//! Serves the booking API over HTTP and runs the offer sweeper in the
//! background until Ctrl+C or SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! BOOKING_OFFER_TTL_SECS=3600 PORT=8080 cargo run --bin booking-server
//! ```

use booking_core::{ApprovingPaymentGate, SystemClock};
use booking_runtime::{metrics, BookingEngine, EngineConfig, OfferManager};
use booking_web::{build_router, AppState, ServerConfig};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let server = ServerConfig::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| server.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let engine_config = EngineConfig::from_env()?;
    tracing::info!(
        address = %server.address(),
        offer_ttl_secs = engine_config.offer_ttl_secs,
        sweep_interval_secs = engine_config.sweep_interval_secs,
        "Configuration loaded"
    );

    let prometheus = metrics::install_recorder()?;
    let engine = Arc::new(BookingEngine::new(
        engine_config,
        Arc::new(SystemClock),
        ApprovingPaymentGate::shared(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = OfferManager::new(Arc::clone(&engine)).spawn(shutdown_rx);

    let app = build_router(AppState::new(engine).with_metrics(prometheus));
    let listener = tokio::net::TcpListener::bind(server.address()).await?;
    tracing::info!(address = %server.address(), "Booking server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, stopping offer sweeper");
    let _ = shutdown_tx.send(true);
    match tokio::time::timeout(server.shutdown_timeout(), sweeper).await {
        Ok(Ok(())) => tracing::info!("Offer sweeper stopped"),
        Ok(Err(e)) => tracing::error!(error = %e, "Offer sweeper panicked"),
        Err(_) => tracing::warn!("Offer sweeper did not stop in time"),
    }
    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
