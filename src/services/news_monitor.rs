//! News model usage monitor
//!
//! Daily model counts for companies flagged with a bad news source.

use super::day_bucket::Window;
use crate::db::{AttributeFilter, RecordId, RecordStore, TimeRange};
use crate::error::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsMonitorConfig {
    pub companies_collection: String,
    pub name_field: String,
    pub flag_field: String,
    pub loggers_collection: String,
    pub company_field: String,
    pub step_field: String,
    pub step: String,
    pub model_field: String,
    pub tracked_models: Vec<String>,
}

impl Default for NewsMonitorConfig {
    fn default() -> Self {
        Self {
            companies_collection: "companies".to_string(),
            name_field: "name".to_string(),
            flag_field: "has_bad_news_source".to_string(),
            loggers_collection: "loggers".to_string(),
            company_field: "company_id".to_string(),
            step_field: "step".to_string(),
            step: "STEP: trim_and_validate".to_string(),
            model_field: "openai_data.openai_model".to_string(),
            tracked_models: vec!["gpt-4.1".to_string(), "gpt-4o-mini".to_string()],
        }
    }
}

/// Model counts for one company on one day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelUsageRow {
    pub company_id: String,
    pub name: String,
    /// `DD/MM/YYYY`
    pub date: String,
    pub models: BTreeMap<String, u64>,
}

/// News monitor service
pub struct NewsMonitorService;

impl NewsMonitorService {
    /// Per company and UTC day model usage inside `window`.
    ///
    /// Rows are sorted by day, then company name, then company id.
    pub async fn model_usage(
        store: &dyn RecordStore,
        config: &NewsMonitorConfig,
        window: &Window,
    ) -> Result<Vec<ModelUsageRow>> {
        info!(
            "NewsMonitorService::model_usage - period={} models={:?}",
            window.days(),
            config.tracked_models
        );

        let flagged = AttributeFilter::new().with(&config.flag_field, true);
        let step = AttributeFilter::new().with(&config.step_field, config.step.as_str());

        let all = TimeRange::all();
        let range = window.time_range();

        let (companies, logs) = tokio::try_join!(
            store.query(&config.companies_collection, &flagged, &all),
            store.query(&config.loggers_collection, &step, &range)
        )?;

        let names: HashMap<&RecordId, &str> = companies
            .iter()
            .map(|c| {
                let name = c.attribute_str(&config.name_field).unwrap_or_default();
                (&c.id, name)
            })
            .collect();

        let mut groups: BTreeMap<(NaiveDate, RecordId), BTreeMap<String, u64>> = BTreeMap::new();
        for log in &logs {
            let Some(company) = log.attribute_id(&config.company_field) else {
                continue;
            };
            if !names.contains_key(&company) {
                continue;
            }

            let counts = groups
                .entry((log.created_at.date_naive(), company))
                .or_insert_with(|| {
                    config
                        .tracked_models
                        .iter()
                        .map(|m| (m.clone(), 0))
                        .collect()
                });

            if let Some(model) = log.attribute_str(&config.model_field) {
                if let Some(count) = counts.get_mut(model) {
                    *count += 1;
                }
            }
        }

        debug!(
            "{} flagged companies, {} log entries, {} groups",
            companies.len(),
            logs.len(),
            groups.len()
        );

        let mut rows: Vec<(NaiveDate, ModelUsageRow)> = groups
            .into_iter()
            .map(|((day, company), models)| {
                let name = names.get(&company).copied().unwrap_or_default();
                let row = ModelUsageRow {
                    company_id: company.to_string(),
                    name: name.to_string(),
                    date: day.format("%d/%m/%Y").to_string(),
                    models,
                };
                (day, row)
            })
            .collect();

        rows.sort_by(|(a_day, a), (b_day, b)| {
            (a_day, &a.name, &a.company_id).cmp(&(b_day, &b.name, &b.company_id))
        });

        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryStore;
    use crate::db::StoreRecord;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap()
    }

    fn log(id: &str, company: &str, created: DateTime<Utc>, model: &str) -> StoreRecord {
        StoreRecord::new(id, created)
            .with("company_id", json!({"$oid": company}))
            .with("step", "STEP: trim_and_validate")
            .with("openai_data", json!({"openai_model": model}))
    }

    #[tokio::test]
    async fn test_model_usage_groups_by_company_and_day() {
        let store = InMemoryStore::new();
        store.insert_all(
            "companies",
            [
                StoreRecord::new("C1", at(1, 0)).with("name", "Zeta").with("has_bad_news_source", true),
                StoreRecord::new("C2", at(1, 0)).with("name", "Alpha").with("has_bad_news_source", true),
                StoreRecord::new("C3", at(1, 0)).with("name", "Quiet").with("has_bad_news_source", false),
            ],
        );
        store.insert_all(
            "loggers",
            [
                log("L1", "C1", at(14, 9), "gpt-4.1"),
                log("L2", "C1", at(14, 10), "gpt-4.1"),
                log("L3", "C1", at(14, 11), "gpt-4o-mini"),
                log("L4", "C2", at(14, 12), "claude"),
                log("L5", "C2", at(15, 1), "gpt-4o-mini"),
                log("L6", "C3", at(15, 1), "gpt-4.1"),
                log("L7", "C1", at(1, 1), "gpt-4.1"),
                log("L8", "C1", at(15, 2), "gpt-4.1").with("step", "STEP: other"),
            ],
        );

        let window = Window::new(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(), 5).unwrap();
        let rows = NewsMonitorService::model_usage(&store, &NewsMonitorConfig::default(), &window)
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].name, "Alpha");
        assert_eq!(rows[0].date, "14/06/2024");
        assert_eq!(rows[0].models["gpt-4.1"], 0);
        assert_eq!(rows[0].models["gpt-4o-mini"], 0);

        assert_eq!(rows[1].name, "Zeta");
        assert_eq!(rows[1].company_id, "C1");
        assert_eq!(rows[1].models["gpt-4.1"], 2);
        assert_eq!(rows[1].models["gpt-4o-mini"], 1);

        assert_eq!(rows[2].date, "15/06/2024");
        assert_eq!(rows[2].models["gpt-4o-mini"], 1);
        assert!(!rows[2].models.contains_key("claude"));
    }

    #[tokio::test]
    async fn test_no_flagged_companies() {
        let store = InMemoryStore::new();
        store.insert("loggers", log("L1", "C1", at(15, 9), "gpt-4.1"));
        let window = Window::new(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(), 1).unwrap();
        let rows = NewsMonitorService::model_usage(&store, &NewsMonitorConfig::default(), &window)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}
