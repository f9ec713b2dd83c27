//! Day Bucket Counter
//!
//! Turns filtered event timestamps into a gap-free daily series over the
//! canonical window `[today - days, today]` (UTC).

use crate::db::{AttributeFilter, RecordStore, TimeRange};
use crate::error::{AppError, Result};
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

// ============================================================================
// Window
// ============================================================================

/// Canonical reporting window: `days + 1` calendar dates ending at `today`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    start: NaiveDate,
    today: NaiveDate,
    days: u32,
}

impl Window {
    /// Build a window ending at `today`.
    ///
    /// Fails with `InvalidParameter` for a negative or unrepresentable size.
    pub fn new(today: NaiveDate, window_days: i64) -> Result<Self> {
        if window_days < 0 {
            return Err(AppError::InvalidParameter(format!(
                "window days must be >= 0, got {}",
                window_days
            )));
        }

        let days = u32::try_from(window_days).map_err(|_| {
            AppError::InvalidParameter(format!("window of {} days is too large", window_days))
        })?;

        let start = today
            .checked_sub_days(Days::new(u64::from(days)))
            .ok_or_else(|| {
                AppError::InvalidParameter(format!(
                    "window of {} days reaches before the supported calendar",
                    window_days
                ))
            })?;

        Ok(Self { start, today, days })
    }

    /// Window ending at the current UTC date
    pub fn ending_today(window_days: i64) -> Result<Self> {
        Self::new(Utc::now().date_naive(), window_days)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.today
    }

    pub fn days(&self) -> u32 {
        self.days
    }

    /// Number of dates covered (`days + 1`)
    pub fn len(&self) -> usize {
        self.days as usize + 1
    }

    /// Always false; a window covers at least `today`
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.today
    }

    /// Every date of the window, ascending
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        self.start.iter_days().take(self.len())
    }

    /// `[start 00:00 UTC, (today + 1) 00:00 UTC)`
    pub fn time_range(&self) -> TimeRange {
        let midnight = |d: NaiveDate| d.and_time(NaiveTime::MIN).and_utc();
        TimeRange {
            start: Some(midnight(self.start)),
            end: self.today.succ_opt().map(midnight),
        }
    }
}

// ============================================================================
// Series
// ============================================================================

/// Count of events on one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub date: NaiveDate,
    pub count: u64,
}

/// Daily counts in ascending date order, one point per distinct day
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSeries {
    points: Vec<MetricPoint>,
}

impl MetricSeries {
    /// Build a series from arbitrary points.
    ///
    /// Points are sorted by date and duplicate dates are summed.
    pub fn from_points(points: impl IntoIterator<Item = MetricPoint>) -> Self {
        let mut by_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for point in points {
            *by_day.entry(point.date).or_insert(0) += point.count;
        }
        Self {
            points: by_day
                .into_iter()
                .map(|(date, count)| MetricPoint { date, count })
                .collect(),
        }
    }

    fn zero_filled(window: &Window, counts: &BTreeMap<NaiveDate, u64>) -> Self {
        Self {
            points: window
                .dates()
                .map(|date| MetricPoint {
                    date,
                    count: counts.get(&date).copied().unwrap_or(0),
                })
                .collect(),
        }
    }

    pub fn points(&self) -> &[MetricPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Count recorded for `date`, if the series covers it
    pub fn count_on(&self, date: NaiveDate) -> Option<u64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| self.points[i].count)
    }

    pub fn total(&self) -> u64 {
        self.points.iter().map(|p| p.count).sum()
    }
}

/// Bucket timestamps by UTC calendar day, zero-filling the whole window.
///
/// Timestamps outside the window are ignored.
pub fn bucket_by_day<'a>(
    timestamps: impl IntoIterator<Item = &'a DateTime<Utc>>,
    window: &Window,
) -> MetricSeries {
    let mut counts: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for ts in timestamps {
        let day = ts.date_naive();
        if window.contains(day) {
            *counts.entry(day).or_insert(0) += 1;
        }
    }
    MetricSeries::zero_filled(window, &counts)
}

// ============================================================================
// Store-backed counter
// ============================================================================

/// Which events a metric counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSource {
    pub collection: String,
    #[serde(default)]
    pub filter: AttributeFilter,
}

impl MetricSource {
    pub fn new(collection: &str, filter: AttributeFilter) -> Self {
        Self {
            collection: collection.to_string(),
            filter,
        }
    }
}

/// Counts filtered store events into daily buckets
pub struct DayBucketCounter;

impl DayBucketCounter {
    /// Count events of `source` per day over `window`.
    ///
    /// Any store failure aborts the whole count.
    pub async fn count_by_day(
        store: &dyn RecordStore,
        source: &MetricSource,
        window: &Window,
    ) -> Result<MetricSeries> {
        info!(
            "DayBucketCounter::count_by_day - collection={} window={}..={}",
            source.collection,
            window.start(),
            window.end()
        );

        let records = store
            .query(&source.collection, &source.filter, &window.time_range())
            .await?;

        debug!(
            "Bucketing {} records from {}",
            records.len(),
            source.collection
        );

        Ok(bucket_by_day(records.iter().map(|r| &r.created_at), window))
    }
}
