//! Metric-set report service

use super::catalog::MetricSet;
use super::combiner::{combine_series, CombinedRow, SummaryStatistics};
use super::day_bucket::{DayBucketCounter, Window};
use crate::db::RecordStore;
use crate::error::Result;
use futures_util::future::try_join_all;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info};

/// Chart-ready report for one metric set
#[derive(Debug, Clone, Serialize)]
pub struct GraphReport {
    pub slug: String,
    pub title: String,
    pub period: u32,
    pub metadata: Map<String, Value>,
    pub data: Vec<CombinedRow>,
    pub statistics: Vec<SummaryStatistics>,
}

/// Report service
pub struct ReportService;

impl ReportService {
    /// Count every metric of `set` concurrently and combine the series.
    ///
    /// The first failing fetch aborts the report.
    pub async fn build(
        store: &dyn RecordStore,
        set: &MetricSet,
        window: &Window,
    ) -> Result<GraphReport> {
        info!(
            "ReportService::build - slug={} period={}",
            set.slug,
            window.days()
        );

        let fetches = set
            .metrics
            .iter()
            .map(|metric| DayBucketCounter::count_by_day(store, &metric.source, window));

        let series = try_join_all(fetches).await.map_err(|e| {
            error!("Failed to build report {}: {}", set.slug, e);
            e
        })?;

        let combined = combine_series(&series, window, set.derived_ratio())?;

        Ok(GraphReport {
            slug: set.slug.clone(),
            title: set.title.clone(),
            period: window.days(),
            metadata: set.metadata(),
            data: combined.rows,
            statistics: combined.stats,
        })
    }
}
