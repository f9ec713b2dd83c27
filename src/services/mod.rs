//! Services Layer
//!
//! Reporting logic shared by the REST API handlers. Every service receives
//! the record store per call and holds no state of its own.
//!
//! # Architecture
//!
//! ```text
//! REST API --> ReportService / PointDataService ──> core ──> RecordStore
//!          --> Company / News / Contacts monitors ────────┘
//! ```
//!
//! # Core
//!
//! - `day_bucket` - Daily counts over the canonical window
//! - `combiner` - Series alignment, ratio and statistics
//! - `reconcile` - Cleaned/raw record join
//! - `dates` - Tolerant date parsing
//!
//! # Services
//!
//! - `ReportService` - Metric-set graphs
//! - `PointDataService` - Daily reconciliation
//! - `CompanyMonitorService` - Incomplete company profiles
//! - `NewsMonitorService` - Model usage for flagged news sources
//! - `ContactsMonitorService` - Contacts attached to value triggers

pub mod catalog;
pub mod combiner;
pub mod company_monitor;
pub mod contacts_monitor;
pub mod dates;
pub mod day_bucket;
pub mod news_monitor;
pub mod point_data;
pub mod reconcile;
pub mod report_service;

// Re-export commonly used types and services
pub use catalog::{MetricSet, ReconcileProfile, ReportCatalog};
pub use combiner::{combine_series, CombinedReport, CombinedRow, DerivedRatio, SummaryStatistics};
pub use company_monitor::{CompanyMonitorConfig, CompanyMonitorReport, CompanyMonitorService};
pub use contacts_monitor::{ContactRow, ContactsMonitorConfig, ContactsMonitorService};
pub use day_bucket::{bucket_by_day, DayBucketCounter, MetricPoint, MetricSeries, MetricSource, Window};
pub use news_monitor::{ModelUsageRow, NewsMonitorConfig, NewsMonitorService};
pub use point_data::{PointDataReport, PointDataService};
pub use reconcile::{reconcile, MergedRecord, SourceRecord, TargetRecord};
pub use report_service::{GraphReport, ReportService};
