//! Application entry point for the `hydromind` telemetry service.
//!
//! This binary orchestrates the full startup sequence:
//! - Initializing structured logging/tracing
//! - Loading configuration from environment variables or `.env`
//! - Creating the data directories if they do not exist
//! - Warming the historical dataset cache
//! - Spawning the live device feed (when enabled and reachable)
//! - Mounting all API routes via the `routes` gateway (EMBP pattern)
//! - Serving until Ctrl-C, then stopping the live feed
//!
//! See [`hydromind::config::load_from_env`] for the environment variables.
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use dotenvy::dotenv;
use tokio::sync::watch;

use hydromind::feed::{open_device, run_feed};
use hydromind::logging::init_tracing;
use hydromind::routes::{self, AppState};
use hydromind::{config, schema};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    schema::ensure_layout(&cfg)?;

    let state = AppState::new(cfg.clone());
    // Load warnings are logged by the store as rows are read
    if let Err(e) = state.dataset().await {
        tracing::error!("Historical log unavailable: {}", e);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let feed_task = if cfg.live_feed_enabled {
        match open_device(&cfg.device_path).await {
            Ok(lines) => Some(tokio::spawn(run_feed(
                lines,
                Arc::clone(&state.live),
                shutdown_rx.clone(),
                cfg.poll_interval,
            ))),
            Err(e) => {
                tracing::warn!("{}; real-time view disabled", e);
                None
            }
        }
    } else {
        tracing::info!("Live feed disabled by configuration");
        None
    };

    // Build app from routes gateway (EMBP)
    let app: Router = routes::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.listen_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    if let Some(task) = feed_task {
        match task.await {
            Ok(stats) => tracing::debug!("Live feed task finished: {:?}", stats),
            Err(e) => tracing::error!("Live feed task failed: {}", e),
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolve on Ctrl-C and tell background tasks to stop.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    // ---
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
    // No receivers left is fine: the feed may never have started
    let _ = shutdown_tx.send(true);
}
