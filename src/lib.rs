//! Ingest Monitor - Pipeline ingestion health reporting
//!
//! Daily cleaned-vs-raw volume graphs, per-day reconciliation of cleaned
//! records against their raw counterparts, and data quality monitors,
//! served over a small REST API.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod state;

use api::ApiServer;
use config::MonitorConfig;
use state::AppState;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging, open the store and serve until Ctrl-C
pub async fn run() -> anyhow::Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ingest_monitor_lib=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Ingest Monitor...");

    let config = MonitorConfig::from_env()?;
    let app_state = AppState::new(config)?;
    tracing::info!("Application state initialized");

    let mut server = ApiServer::new(app_state);
    server.start().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    server.stop();
    server.wait().await;

    Ok(())
}
