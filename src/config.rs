//! Service configuration
//!
//! Values come from the process environment, with an optional `.env` file.

use crate::error::{AppError, Result};
use crate::services::catalog::ReportCatalog;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DATABASE_PATH: &str = "ingest-monitor.db";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_VIEW_RANGE: i64 = 30;
pub const DEFAULT_MAX_VIEW_RANGE: i64 = 1095;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub database_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// Window used when a request has no `period`
    pub default_view_range: i64,
    /// Largest `period` a request may ask for
    pub max_view_range: i64,
    pub fetch_timeout: Duration,
    pub catalog_path: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            default_view_range: DEFAULT_VIEW_RANGE,
            max_view_range: DEFAULT_MAX_VIEW_RANGE,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            catalog_path: None,
        }
    }
}

fn parse_var<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{}='{}': {}", key, value, e))),
    }
}

impl MonitorConfig {
    /// Load from the environment after reading `.env` if present
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    /// Load from any key lookup; unset keys take their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let default_view_range = parse_var(
            "MONITOR_DEFAULT_VIEW_RANGE",
            lookup("MONITOR_DEFAULT_VIEW_RANGE"),
            defaults.default_view_range,
        )?;
        if default_view_range < 0 {
            return Err(AppError::Config(format!(
                "MONITOR_DEFAULT_VIEW_RANGE must be >= 0, got {}",
                default_view_range
            )));
        }

        let max_view_range = parse_var(
            "MONITOR_MAX_VIEW_RANGE",
            lookup("MONITOR_MAX_VIEW_RANGE"),
            defaults.max_view_range,
        )?;
        if max_view_range < default_view_range {
            return Err(AppError::Config(format!(
                "MONITOR_MAX_VIEW_RANGE ({}) is below MONITOR_DEFAULT_VIEW_RANGE ({})",
                max_view_range, default_view_range
            )));
        }

        let timeout_secs = parse_var(
            "MONITOR_FETCH_TIMEOUT_SECS",
            lookup("MONITOR_FETCH_TIMEOUT_SECS"),
            DEFAULT_FETCH_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(AppError::Config(
                "MONITOR_FETCH_TIMEOUT_SECS must be positive".to_string(),
            ));
        }

        Ok(Self {
            database_path: lookup("MONITOR_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            host: lookup("MONITOR_HOST").unwrap_or(defaults.host),
            port: parse_var("MONITOR_PORT", lookup("MONITOR_PORT"), defaults.port)?,
            default_view_range,
            max_view_range,
            fetch_timeout: Duration::from_secs(timeout_secs),
            catalog_path: lookup("MONITOR_REPORT_CATALOG")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid address: {}", e)))
    }

    /// Configured catalog file, or the built-in catalog
    pub fn load_catalog(&self) -> Result<ReportCatalog> {
        match &self.catalog_path {
            Some(path) => ReportCatalog::load(path),
            None => Ok(ReportCatalog::builtin()),
        }
    }
}
