//! Application state management

use crate::config::MonitorConfig;
use crate::db::sqlite::SqliteStore;
use crate::db::{RecordStore, TimeoutStore};
use crate::error::Result;
use crate::services::catalog::ReportCatalog;
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Record store every report reads from
    pub store: Arc<dyn RecordStore>,

    /// Metric sets and reconciliation profiles
    pub catalog: Arc<ReportCatalog>,

    pub config: Arc<MonitorConfig>,
}

impl AppState {
    /// Open the SQLite store and load the catalog described by `config`
    pub fn new(config: MonitorConfig) -> Result<Self> {
        tracing::info!("Database path: {:?}", config.database_path);

        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let sqlite = SqliteStore::new(&config.database_path)?;
        let store = TimeoutStore::new(sqlite, config.fetch_timeout);
        let catalog = config.load_catalog()?;

        tracing::info!(
            "Loaded {} metric sets and {} reconcile profiles",
            catalog.metric_sets.len(),
            catalog.reconcile_profiles.len()
        );

        Ok(Self::with_store(Arc::new(store), catalog, config))
    }

    /// Build state around an existing store
    pub fn with_store(
        store: Arc<dyn RecordStore>,
        catalog: ReportCatalog,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            catalog: Arc::new(catalog),
            config: Arc::new(config),
        }
    }
}
