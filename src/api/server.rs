//! HTTP server for the reporting API

use crate::api::handlers;
use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Build the router with all routes
pub fn router(state: AppState) -> Router {
    // Build CORS layer (dashboards are served from other origins)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ====================================================================
        // Health check
        // ====================================================================
        .route("/health", get(handlers::health_check))
        .route("/", get(handlers::health_check))

        // ====================================================================
        // Reports
        // ====================================================================
        .route("/reports", get(handlers::list_reports))
        .route("/graph/:slug", get(handlers::get_graph))
        .route("/point-data/:slug", get(handlers::get_point_data))

        // ====================================================================
        // Monitors
        // ====================================================================
        .route("/monitor/companies", get(handlers::get_company_monitor))
        .route("/monitor/news-models", get(handlers::get_news_models))
        .route("/monitor/contacts", get(handlers::get_contacts_monitor))

        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// API server manager
pub struct ApiServer {
    state: AppState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl ApiServer {
    /// Create a new server
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            shutdown_tx: None,
            handle: None,
            local_addr: None,
        }
    }

    /// Bind and start serving in the background
    pub async fn start(&mut self) -> Result<SocketAddr> {
        let addr = self.state.config.bind_addr()?;
        let app = router(self.state.clone());

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        info!("Starting Ingest Monitor API server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            AppError::Config(format!("Failed to bind to {}: {}", addr, e))
        })?;
        let local_addr = listener.local_addr()?;

        // Spawn server task
        let handle = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("API server shutting down");
            });

            if let Err(e) = server.await {
                error!("API server error: {}", e);
            }
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.handle = Some(handle);
        self.local_addr = Some(local_addr);

        info!("=== Endpoints ===");
        info!("  GET  http://{}/health", local_addr);
        info!("  GET  http://{}/reports", local_addr);
        info!("  GET  http://{}/graph/{{slug}}?period=N", local_addr);
        info!("  GET  http://{}/point-data/{{slug}}?date=MM/DD/YYYY", local_addr);
        info!("  GET  http://{}/monitor/companies", local_addr);
        info!("  GET  http://{}/monitor/news-models?period=N", local_addr);
        info!("  GET  http://{}/monitor/contacts?period=N", local_addr);

        Ok(local_addr)
    }

    /// Wait until the server task exits
    pub async fn wait(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!("API server task failed: {}", e);
            }
        }
        self.shutdown_tx = None;
    }

    /// Stop the server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            info!("API server stop signal sent");
        }
    }

    /// Check if server is running
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        self.stop();
    }
}
