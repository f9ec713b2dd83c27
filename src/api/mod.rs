//! REST API server module
//!
//! Provides:
//! - Metric-set graphs (/graph/{slug})
//! - Daily reconciliation rows (/point-data/{slug})
//! - Company, news and contacts monitors (/monitor/*)

pub mod handlers;
mod server;
mod types;

pub use server::{router, ApiServer};
pub use types::{ApiResponse, DateQuery, Empty, PeriodQuery, ReportKind, ReportSummary};
