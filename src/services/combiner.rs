//! Metric Series Combiner
//!
//! Aligns independently produced daily series onto the canonical window and
//! derives the optional cleaned/raw ratio plus per-metric statistics.

use super::day_bucket::{MetricSeries, Window};
use crate::error::{AppError, Result};
use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Derived column attached to each row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedRatio {
    #[default]
    None,
    /// `metric_1 / metric_2 * 100`, where metric 1 is cleaned and metric 2 raw
    CleanedToRaw,
}

/// One row per window date
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedRow {
    pub date: NaiveDate,
    pub metrics: Vec<u64>,
    pub ratio: Option<f64>,
}

impl Serialize for CombinedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let extra = usize::from(self.ratio.is_some());
        let mut map = serializer.serialize_map(Some(1 + self.metrics.len() + extra))?;
        map.serialize_entry("date", &self.date.format("%Y-%m-%d").to_string())?;
        for (i, value) in self.metrics.iter().enumerate() {
            map.serialize_entry(&metric_key(i), value)?;
        }
        if let Some(ratio) = self.ratio {
            map.serialize_entry("ratio", &ratio)?;
        }
        map.end()
    }
}

/// Totals for a single metric column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStatistics {
    pub metric: String,
    pub total: u64,
    pub min: u64,
    pub max: u64,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedReport {
    pub rows: Vec<CombinedRow>,
    pub stats: Vec<SummaryStatistics>,
}

/// Stable column name for the metric at `index` (zero based)
pub fn metric_key(index: usize) -> String {
    format!("metric_{}", index + 1)
}

/// Round half away from zero to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage of `numerator` over `denominator`, 0 when the denominator is 0
pub fn safe_pct(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    round2(numerator as f64 / denominator as f64 * 100.0)
}

/// Combine series onto `window`.
///
/// Dates a series lacks count as 0; dates outside the window are ignored.
pub fn combine_series(
    series: &[MetricSeries],
    window: &Window,
    ratio: DerivedRatio,
) -> Result<CombinedReport> {
    if series.is_empty() {
        return Err(AppError::InvalidParameter(
            "at least one series is required".to_string(),
        ));
    }
    if ratio == DerivedRatio::CleanedToRaw && series.len() != 2 {
        return Err(AppError::InvalidParameter(format!(
            "cleaned/raw ratio needs exactly 2 series, got {}",
            series.len()
        )));
    }

    let rows: Vec<CombinedRow> = window
        .dates()
        .map(|date| {
            let metrics: Vec<u64> = series
                .iter()
                .map(|s| s.count_on(date).unwrap_or(0))
                .collect();
            let ratio = match ratio {
                DerivedRatio::CleanedToRaw => Some(safe_pct(metrics[0], metrics[1])),
                DerivedRatio::None => None,
            };
            CombinedRow {
                date,
                metrics,
                ratio,
            }
        })
        .collect();

    let stats = (0..series.len())
        .map(|i| summarize(i, rows.iter().map(|r| r.metrics[i])))
        .collect();

    Ok(CombinedReport { rows, stats })
}

fn summarize(index: usize, values: impl Iterator<Item = u64>) -> SummaryStatistics {
    let mut total = 0u64;
    let mut min: Option<u64> = None;
    let mut max: Option<u64> = None;
    let mut count = 0usize;

    for value in values {
        total += value;
        min = Some(min.map_or(value, |m| m.min(value)));
        max = Some(max.map_or(value, |m| m.max(value)));
        count += 1;
    }

    let average = if count == 0 {
        0.0
    } else {
        round2(total as f64 / count as f64)
    };

    SummaryStatistics {
        metric: metric_key(index),
        total,
        min: min.unwrap_or(0),
        max: max.unwrap_or(0),
        average,
    }
}
