//! Report catalog
//!
//! Named metric sets and reconciliation profiles. The built-in catalog
//! covers the ingestion pipelines; a JSON file can replace it entirely.

use super::combiner::{metric_key, DerivedRatio};
use super::company_monitor::CompanyMonitorConfig;
use super::contacts_monitor::ContactsMonitorConfig;
use super::day_bucket::MetricSource;
use super::news_monitor::NewsMonitorConfig;
use crate::db::AttributeFilter;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::path::Path;

const CLEANED_COLOR: &str = "#F97316";
const RAW_COLOR: &str = "#3B82F6";
const RATIO_COLOR: &str = "#10B981";

// ============================================================================
// Metric sets
// ============================================================================

/// Display label and chart color
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesMeta {
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub label: String,
    pub color: String,
    pub source: MetricSource,
}

/// Metrics charted together, optionally with the cleaned/raw ratio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    pub slug: String,
    pub title: String,
    pub metrics: Vec<MetricDefinition>,
    #[serde(default)]
    pub ratio: Option<SeriesMeta>,
}

impl MetricSet {
    pub fn derived_ratio(&self) -> DerivedRatio {
        if self.ratio.is_some() {
            DerivedRatio::CleanedToRaw
        } else {
            DerivedRatio::None
        }
    }

    /// Presentation metadata keyed by row column
    pub fn metadata(&self) -> Map<String, Value> {
        let mut metadata: Map<String, Value> = self
            .metrics
            .iter()
            .enumerate()
            .map(|(i, m)| (metric_key(i), json!({"label": m.label, "color": m.color})))
            .collect();
        if let Some(ratio) = &self.ratio {
            metadata.insert(
                "ratio".to_string(),
                json!({"label": ratio.label, "color": ratio.color}),
            );
        }
        metadata
    }

    fn cleaned_vs_raw(slug: &str, title: &str, cleaned: MetricSource, raw: MetricSource) -> Self {
        Self {
            slug: slug.to_string(),
            title: title.to_string(),
            metrics: vec![
                MetricDefinition {
                    label: "Cleaned Data".to_string(),
                    color: CLEANED_COLOR.to_string(),
                    source: cleaned,
                },
                MetricDefinition {
                    label: "Raw Data".to_string(),
                    color: RAW_COLOR.to_string(),
                    source: raw,
                },
            ],
            ratio: Some(SeriesMeta {
                label: "Percentage (%)".to_string(),
                color: RATIO_COLOR.to_string(),
            }),
        }
    }
}

// ============================================================================
// Reconciliation profiles
// ============================================================================

/// Where a reconciled record keeps each field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordLayout {
    pub collection: String,
    #[serde(default)]
    pub filter: AttributeFilter,
    #[serde(default)]
    pub foreign_key: Option<String>,
    pub company_field: String,
    pub url_field: String,
    pub date_field: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyDirectoryConfig {
    pub collection: String,
    pub name_field: String,
}

impl Default for CompanyDirectoryConfig {
    fn default() -> Self {
        Self {
            collection: "companies".to_string(),
            name_field: "name".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileProfile {
    pub slug: String,
    pub title: String,
    pub source: RecordLayout,
    pub target: RecordLayout,
    #[serde(default)]
    pub companies: CompanyDirectoryConfig,
}

impl ReconcileProfile {
    /// Source attribute holding the target id
    pub fn foreign_key(&self) -> Result<&str> {
        self.source.foreign_key.as_deref().ok_or_else(|| {
            AppError::Config(format!("profile '{}' has no source foreign_key", self.slug))
        })
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportCatalog {
    #[serde(default)]
    pub metric_sets: Vec<MetricSet>,
    #[serde(default)]
    pub reconcile_profiles: Vec<ReconcileProfile>,
    #[serde(default)]
    pub company_monitor: CompanyMonitorConfig,
    #[serde(default)]
    pub news_monitor: NewsMonitorConfig,
    #[serde(default)]
    pub contacts_monitor: ContactsMonitorConfig,
}

impl Default for ReportCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ReportCatalog {
    /// Catalog for the standard ingestion pipelines
    pub fn builtin() -> Self {
        let active = |kind: &str| {
            AttributeFilter::new()
                .with("type", kind)
                .with("status", "Active")
        };
        let datasources = |kind: &str| MetricSource::new("datasources", active(kind));
        let raw = |collection: &str| MetricSource::new(collection, AttributeFilter::new());

        let metric_sets = vec![
            MetricSet::cleaned_vs_raw(
                "latest-news",
                "Latest News",
                datasources("scrapper"),
                raw("scrapper"),
            ),
            MetricSet::cleaned_vs_raw(
                "latest-jobs",
                "Latest Jobs",
                datasources("jobsearch"),
                raw("theirstack"),
            ),
            MetricSet::cleaned_vs_raw(
                "latest-transcripts",
                "Latest Transcripts",
                datasources("transcript"),
                raw("transcripts"),
            ),
            MetricSet::cleaned_vs_raw(
                "latest-filings",
                "Latest Filings",
                datasources("edgar"),
                raw("edgar_file"),
            ),
            MetricSet::cleaned_vs_raw(
                "latest-contacts",
                "Latest Contacts",
                MetricSource::new("contacts", AttributeFilter::new().with("status", "Active")),
                raw("raw_contacts"),
            ),
        ];

        let edgar = ReconcileProfile {
            slug: "edgar".to_string(),
            title: "EDGAR Filings".to_string(),
            source: RecordLayout {
                collection: "datasources".to_string(),
                filter: active("edgar"),
                foreign_key: Some("raw_source_id".to_string()),
                company_field: "company_id".to_string(),
                url_field: "url".to_string(),
                date_field: "date".to_string(),
            },
            target: RecordLayout {
                collection: "edgar_file".to_string(),
                filter: AttributeFilter::new(),
                foreign_key: None,
                company_field: "company_id".to_string(),
                url_field: "file_url".to_string(),
                date_field: "file_date".to_string(),
            },
            companies: CompanyDirectoryConfig::default(),
        };

        Self {
            metric_sets,
            reconcile_profiles: vec![edgar],
            company_monitor: CompanyMonitorConfig::default(),
            news_monitor: NewsMonitorConfig::default(),
            contacts_monitor: ContactsMonitorConfig::default(),
        }
    }

    /// Parse and validate a catalog document
    pub fn from_json(text: &str) -> Result<Self> {
        let catalog: ReportCatalog = serde_json::from_str(text)
            .map_err(|e| AppError::Config(format!("invalid report catalog: {}", e)))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self> {
        tracing::info!("Loading report catalog from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("cannot read catalog {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        let mut slugs = HashSet::new();
        for set in &self.metric_sets {
            if !slugs.insert(set.slug.as_str()) {
                return Err(AppError::Config(format!("duplicate metric set '{}'", set.slug)));
            }
            if set.metrics.is_empty() {
                return Err(AppError::Config(format!("metric set '{}' has no metrics", set.slug)));
            }
            if set.ratio.is_some() && set.metrics.len() != 2 {
                return Err(AppError::Config(format!(
                    "metric set '{}' has a ratio but {} metrics",
                    set.slug,
                    set.metrics.len()
                )));
            }
        }

        let mut slugs = HashSet::new();
        for profile in &self.reconcile_profiles {
            if !slugs.insert(profile.slug.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate reconcile profile '{}'",
                    profile.slug
                )));
            }
            profile.foreign_key()?;
        }

        Ok(())
    }

    pub fn metric_set(&self, slug: &str) -> Option<&MetricSet> {
        self.metric_sets.iter().find(|s| s.slug == slug)
    }

    pub fn reconcile_profile(&self, slug: &str) -> Option<&ReconcileProfile> {
        self.reconcile_profiles.iter().find(|p| p.slug == slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = ReportCatalog::builtin();
        catalog.validate().unwrap();

        let news = catalog.metric_set("latest-news").unwrap();
        assert_eq!(news.derived_ratio(), DerivedRatio::CleanedToRaw);
        assert_eq!(news.metrics[1].source.collection, "scrapper");
        assert_eq!(catalog.reconcile_profile("edgar").unwrap().foreign_key().unwrap(), "raw_source_id");
        assert!(catalog.metric_set("nope").is_none());
    }

    #[test]
    fn test_metadata_keys_follow_columns() {
        let catalog = ReportCatalog::builtin();
        let metadata = catalog.metric_set("latest-jobs").unwrap().metadata();
        assert_eq!(metadata["metric_1"]["label"], "Cleaned Data");
        assert_eq!(metadata["metric_2"]["color"], RAW_COLOR);
        assert_eq!(metadata["ratio"]["label"], "Percentage (%)");
    }

    #[test]
    fn test_catalog_from_json() {
        let catalog = ReportCatalog::from_json(
            r##"{
                "metric_sets": [{
                    "slug": "signups",
                    "title": "Signups",
                    "metrics": [{
                        "label": "Users",
                        "color": "#000000",
                        "source": {"collection": "users", "filter": {"status": "Active"}}
                    }]
                }]
            }"##,
        )
        .unwrap();

        let set = catalog.metric_set("signups").unwrap();
        assert_eq!(set.derived_ratio(), DerivedRatio::None);
        assert!(catalog.reconcile_profiles.is_empty());
        assert_eq!(catalog.news_monitor, NewsMonitorConfig::default());
        assert_eq!(catalog.contacts_monitor, ContactsMonitorConfig::default());
    }

    #[test]
    fn test_validation_rejects_bad_catalogs() {
        let mut catalog = ReportCatalog::builtin();
        catalog.metric_sets.push(catalog.metric_sets[0].clone());
        assert!(matches!(catalog.validate(), Err(AppError::Config(_))));

        let mut catalog = ReportCatalog::builtin();
        catalog.metric_sets[0].metrics.pop();
        assert!(matches!(catalog.validate(), Err(AppError::Config(_))));

        let mut catalog = ReportCatalog::builtin();
        catalog.metric_sets[0].metrics.clear();
        catalog.metric_sets[0].ratio = None;
        assert!(matches!(catalog.validate(), Err(AppError::Config(_))));

        let mut catalog = ReportCatalog::builtin();
        catalog.reconcile_profiles[0].source.foreign_key = None;
        assert!(matches!(catalog.validate(), Err(AppError::Config(_))));

        assert!(matches!(
            ReportCatalog::from_json("{not json"),
            Err(AppError::Config(_))
        ));
    }
}
