//! In-memory record store
//!
//! Deterministic fake used by tests and by callers that already hold a
//! snapshot in memory.

use super::{AttributeFilter, RecordId, RecordStore, StoreRecord, TimeRange};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// Collections of records held in memory
#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Vec<StoreRecord>>>,
    unavailable: RwLock<HashSet<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any record with the same id
    pub fn insert(&self, collection: &str, record: StoreRecord) {
        let mut collections = self.collections.write();
        let records = collections.entry(collection.to_string()).or_default();
        records.retain(|r| r.id != record.id);
        records.push(record);
    }

    pub fn insert_all(&self, collection: &str, records: impl IntoIterator<Item = StoreRecord>) {
        for record in records {
            self.insert(collection, record);
        }
    }

    /// Make every call against `collection` fail as unreachable
    pub fn set_unavailable(&self, collection: &str) {
        self.unavailable.write().insert(collection.to_string());
    }

    fn select(
        &self,
        collection: &str,
        predicate: impl Fn(&StoreRecord) -> bool,
    ) -> Result<Vec<StoreRecord>> {
        if self.unavailable.read().contains(collection) {
            return Err(AppError::DataSource(format!(
                "collection '{}' is unreachable",
                collection
            )));
        }

        let collections = self.collections.read();
        let mut records: Vec<StoreRecord> = collections
            .get(collection)
            .map(|records| records.iter().filter(|r| predicate(r)).cloned().collect())
            .unwrap_or_default();

        records.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(records)
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn query(
        &self,
        collection: &str,
        filter: &AttributeFilter,
        range: &TimeRange,
    ) -> Result<Vec<StoreRecord>> {
        self.select(collection, |r| range.contains(&r.created_at) && filter.matches(r))
    }

    async fn find_by_ids(&self, collection: &str, ids: &[RecordId]) -> Result<Vec<StoreRecord>> {
        let wanted: HashSet<&RecordId> = ids.iter().collect();
        self.select(collection, |r| wanted.contains(&r.id))
    }

    async fn find_by_field_in(
        &self,
        collection: &str,
        field: &str,
        values: &[RecordId],
    ) -> Result<Vec<StoreRecord>> {
        let wanted: HashSet<&RecordId> = values.iter().collect();
        self.select(collection, |r| {
            r.attribute_id(field).is_some_and(|id| wanted.contains(&id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[tokio::test]
    async fn test_query_orders_by_created_at_then_id() {
        let store = InMemoryStore::new();
        let late = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        store.insert("c", StoreRecord::new("b", late));
        store.insert("c", StoreRecord::new("z", early));
        store.insert("c", StoreRecord::new("a", late));

        let ids: Vec<String> = store
            .query("c", &AttributeFilter::new(), &TimeRange::all())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id.to_string())
            .collect();
        assert_eq!(ids, vec!["z", "a", "b"]);
    }

    #[tokio::test]
    async fn test_find_by_field_in_normalizes_ids() {
        let store = InMemoryStore::new();
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        store.insert("s", StoreRecord::new("S1", at).with("raw_source_id", json!({"$oid": "T1"})));
        store.insert("s", StoreRecord::new("S2", at).with("raw_source_id", "T2"));
        store.insert("s", StoreRecord::new("S3", at));

        let found = store
            .find_by_field_in("s", "raw_source_id", &[RecordId::new("T1"), RecordId::new("T2")])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_collection_fails() {
        let store = InMemoryStore::new();
        store.set_unavailable("edgar_file");
        let result = store.find_by_ids("edgar_file", &[]).await;
        assert!(matches!(result, Err(AppError::DataSource(_))));
    }

    #[tokio::test]
    async fn test_missing_collection_is_empty() {
        let store = InMemoryStore::new();
        let found = store
            .query("nothing", &AttributeFilter::new(), &TimeRange::all())
            .await
            .unwrap();
        assert!(found.is_empty());
    }
}
