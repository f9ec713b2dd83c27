//! Point data service
//!
//! Store-backed reconciliation of one calendar day for a profile.

use super::catalog::{ReconcileProfile, RecordLayout};
use super::dates::{format_day, parse_day, DateValue};
use super::reconcile::{reconcile, unclaimed_targets, MergedRecord, SourceRecord, TargetRecord};
use crate::db::{RecordId, RecordStore, StoreRecord, TimeRange};
use crate::error::Result;
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, error, info};

/// Reconciled rows of one day
#[derive(Debug, Clone, Serialize)]
pub struct PointDataReport {
    pub slug: String,
    pub title: String,
    pub date: String,
    pub total: usize,
    pub data: Vec<MergedRecord>,
}

// ============================================================================
// Record projection
// ============================================================================

fn day_range(day: NaiveDate) -> TimeRange {
    let midnight = |d: NaiveDate| d.and_time(NaiveTime::MIN).and_utc();
    TimeRange {
        start: Some(midnight(day)),
        end: day.succ_opt().map(midnight),
    }
}

/// Date attribute, falling back to the record's creation time
fn record_date(record: &StoreRecord, field: &str) -> DateValue {
    match record.attribute(field) {
        None | Some(Value::Null) => DateValue::Timestamp(record.created_at),
        value => DateValue::from_json(value),
    }
}

fn record_url(record: &StoreRecord, field: &str) -> String {
    record.attribute_str(field).unwrap_or_default().to_string()
}

fn to_source(record: &StoreRecord, layout: &RecordLayout, foreign_key: &str) -> SourceRecord {
    SourceRecord {
        id: record.id.clone(),
        foreign_key: record.attribute_id(foreign_key),
        company_id: record.attribute_id(&layout.company_field),
        url: record_url(record, &layout.url_field),
        date: record_date(record, &layout.date_field),
    }
}

fn to_target(record: &StoreRecord, layout: &RecordLayout) -> TargetRecord {
    TargetRecord {
        id: record.id.clone(),
        company_id: record.attribute_id(&layout.company_field),
        url: record_url(record, &layout.url_field),
        date: record_date(record, &layout.date_field),
    }
}

// ============================================================================
// Service
// ============================================================================

/// Point data service
pub struct PointDataService;

impl PointDataService {
    /// Reconcile source and target records created on `day`.
    ///
    /// Fails with `InvalidDate` for an unparseable day and with
    /// `DataSource` when any fetch fails.
    pub async fn reconcile_day(
        store: &dyn RecordStore,
        profile: &ReconcileProfile,
        day: &str,
    ) -> Result<Vec<MergedRecord>> {
        info!(
            "PointDataService::reconcile_day - profile={} day={}",
            profile.slug, day
        );

        let date = parse_day(day)?;
        let foreign_key = profile.foreign_key()?;
        let range = day_range(date);

        let (source_rows, target_rows) = tokio::try_join!(
            store.query(&profile.source.collection, &profile.source.filter, &range),
            store.query(&profile.target.collection, &profile.target.filter, &range)
        )
        .map_err(|e| {
            error!("Failed to fetch {} records for {}: {}", profile.slug, date, e);
            e
        })?;

        let sources: Vec<SourceRecord> = source_rows
            .iter()
            .map(|r| to_source(r, &profile.source, foreign_key))
            .collect();
        let targets: Vec<TargetRecord> = target_rows
            .iter()
            .map(|r| to_target(r, &profile.target))
            .collect();

        let unclaimed = unclaimed_targets(&sources, &targets);
        let company_ids: Vec<RecordId> = sources
            .iter()
            .filter_map(|s| s.company_id.clone())
            .chain(targets.iter().filter_map(|t| t.company_id.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        debug!(
            "Day {}: {} sources, {} targets, {} unclaimed, {} companies",
            format_day(date),
            sources.len(),
            targets.len(),
            unclaimed.len(),
            company_ids.len()
        );

        let (candidates, company_rows) = tokio::try_join!(
            Self::reverse_candidates(store, profile, foreign_key, &unclaimed),
            store.find_by_ids(&profile.companies.collection, &company_ids)
        )
        .map_err(|e| {
            error!("Failed to resolve lookups for {}: {}", profile.slug, e);
            e
        })?;

        let mut reverse: HashMap<RecordId, RecordId> = HashMap::new();
        for candidate in &candidates {
            if let Some(key) = candidate.attribute_id(foreign_key) {
                reverse.entry(key).or_insert_with(|| candidate.id.clone());
            }
        }

        let companies: HashMap<RecordId, String> = company_rows
            .iter()
            .map(|c| {
                let name = c.attribute_str(&profile.companies.name_field).unwrap_or_default();
                (c.id.clone(), name.to_string())
            })
            .collect();

        Ok(reconcile(&sources, &targets, &companies, &reverse))
    }

    /// Source records anywhere in time that point at an unclaimed target
    async fn reverse_candidates(
        store: &dyn RecordStore,
        profile: &ReconcileProfile,
        foreign_key: &str,
        unclaimed: &[RecordId],
    ) -> Result<Vec<StoreRecord>> {
        if unclaimed.is_empty() {
            return Ok(Vec::new());
        }

        let mut found = store
            .find_by_field_in(&profile.source.collection, foreign_key, unclaimed)
            .await?;
        found.retain(|r| profile.source.filter.matches(r));
        Ok(found)
    }

    /// Reconcile and wrap the rows with profile details
    pub async fn report(
        store: &dyn RecordStore,
        profile: &ReconcileProfile,
        day: &str,
    ) -> Result<PointDataReport> {
        let data = Self::reconcile_day(store, profile, day).await?;
        let date = format_day(parse_day(day)?);
        Ok(PointDataReport {
            slug: profile.slug.clone(),
            title: profile.title.clone(),
            date,
            total: data.len(),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryStore;
    use crate::error::AppError;
    use crate::services::catalog::ReportCatalog;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
    }

    fn edgar() -> ReconcileProfile {
        ReportCatalog::builtin().reconcile_profile("edgar").unwrap().clone()
    }

    fn active_edgar(id: &str, created: DateTime<Utc>) -> StoreRecord {
        StoreRecord::new(id, created)
            .with("type", "edgar")
            .with("status", "Active")
    }

    fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.insert(
            "datasources",
            active_edgar("S1", at(1, 9))
                .with("raw_source_id", json!({"$oid": "T1"}))
                .with("company_id", json!({"$oid": "C1"}))
                .with("url", "https://example.com/s1")
                .with("date", "05/01/2024"),
        );
        store.insert_all(
            "edgar_file",
            [
                StoreRecord::new("T1", at(1, 8)).with("file_date", "2024-05-01"),
                StoreRecord::new("T2", at(1, 10)).with("file_url", "https://sec.example/t2"),
            ],
        );
        store.insert("companies", StoreRecord::new("C1", at(1, 0)).with("name", "Acme"));
        store
    }

    #[tokio::test]
    async fn test_reconcile_day_matches_and_keeps_unmatched() {
        let store = seeded_store();
        let merged = PointDataService::reconcile_day(&store, &edgar(), "05/01/2024")
            .await
            .unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].datasource_id, "S1");
        assert_eq!(merged[0].raw_id, "T1");
        assert_eq!(merged[0].company_name, "Acme");
        assert_eq!(merged[0].date, "2024-05-01");
        assert_eq!(merged[1].datasource_id, "");
        assert_eq!(merged[1].raw_id, "T2");
        assert_eq!(merged[1].url, "https://sec.example/t2");
        // no file_date, falls back to created_at
        assert_eq!(merged[1].date, "2024-05-01");
    }

    #[tokio::test]
    async fn test_reverse_lookup_uses_other_days() {
        let store = seeded_store();
        store.insert(
            "datasources",
            active_edgar("S-old", at(20, 9)).with("raw_source_id", "T2"),
        );
        // inactive sources never count
        store.insert(
            "datasources",
            StoreRecord::new("S-inactive", at(2, 9))
                .with("type", "edgar")
                .with("status", "Inactive")
                .with("raw_source_id", "T2"),
        );

        let merged = PointDataService::reconcile_day(&store, &edgar(), "2024-05-01")
            .await
            .unwrap();
        assert_eq!(merged[1].raw_id, "T2");
        assert_eq!(merged[1].datasource_id, "S-old");
    }

    #[tokio::test]
    async fn test_other_days_are_excluded() {
        let store = seeded_store();
        let merged = PointDataService::reconcile_day(&store, &edgar(), "05/02/2024")
            .await
            .unwrap();
        assert!(merged.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_day() {
        let store = seeded_store();
        let result = PointDataService::reconcile_day(&store, &edgar(), "not-a-date").await;
        assert!(matches!(result, Err(AppError::InvalidDate(_))));
    }

    #[tokio::test]
    async fn test_unreachable_store_returns_no_rows() {
        let store = seeded_store();
        store.set_unavailable("companies");
        let result = PointDataService::reconcile_day(&store, &edgar(), "05/01/2024").await;
        assert!(matches!(result, Err(AppError::DataSource(_))));
    }

    #[tokio::test]
    async fn test_report_wraps_rows() {
        let store = seeded_store();
        let report = PointDataService::report(&store, &edgar(), "05/01/2024")
            .await
            .unwrap();
        assert_eq!(report.date, "2024-05-01");
        assert_eq!(report.total, 2);
        assert_eq!(report.slug, "edgar");
    }
}
