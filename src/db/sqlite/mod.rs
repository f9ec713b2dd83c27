//! SQLite record store

mod migrations;
mod records;

use crate::db::{AttributeFilter, RecordId, RecordStore, StoreRecord, TimeRange};
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// SQLite database wrapper
///
/// Queries run on the blocking pool so concurrent fetches do not stall the
/// async runtime.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the store at `path`
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::from_connection(conn)
    }

    /// Private in-memory store, mainly for tests
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert or replace a record
    pub fn insert(&self, collection: &str, record: &StoreRecord) -> Result<()> {
        let conn = self.conn.lock();
        records::upsert_record(&conn, collection, record)
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn)
        })
        .await?
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn query(
        &self,
        collection: &str,
        filter: &AttributeFilter,
        range: &TimeRange,
    ) -> Result<Vec<StoreRecord>> {
        let collection = collection.to_string();
        let filter = filter.clone();
        let range = *range;
        self.with_conn(move |conn| {
            let mut found = records::query_records(conn, &collection, &range)?;
            found.retain(|r| filter.matches(r));
            Ok(found)
        })
        .await
    }

    async fn find_by_ids(&self, collection: &str, ids: &[RecordId]) -> Result<Vec<StoreRecord>> {
        let collection = collection.to_string();
        let ids = ids.to_vec();
        self.with_conn(move |conn| records::find_records_by_ids(conn, &collection, &ids))
            .await
    }

    async fn find_by_field_in(
        &self,
        collection: &str,
        field: &str,
        values: &[RecordId],
    ) -> Result<Vec<StoreRecord>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }

        let collection = collection.to_string();
        let field = field.to_string();
        let values = values.to_vec();
        let wanted: HashSet<RecordId> = values.iter().cloned().collect();
        self.with_conn(move |conn| {
            let mut found = records::find_records_by_field(conn, &collection, &field, &values)?;
            found.retain(|r| r.attribute_id(&field).is_some_and(|id| wanted.contains(&id)));
            Ok(found)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_query_applies_filter_after_range() {
        let store = SqliteStore::open_in_memory().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        store
            .insert("datasources", &StoreRecord::new("S1", at).with("type", "edgar"))
            .unwrap();
        store
            .insert("datasources", &StoreRecord::new("S2", at).with("type", "scrapper"))
            .unwrap();

        let filter = AttributeFilter::new().with("type", "edgar");
        let found = store
            .query("datasources", &filter, &TimeRange::all())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, RecordId::new("S1"));
    }

    #[tokio::test]
    async fn test_find_by_field_in_matches_opaque_ids() {
        let store = SqliteStore::open_in_memory().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap();
        store
            .insert(
                "datasources",
                &StoreRecord::new("S9", at).with("raw_source_id", json!({"$oid": "T7"})),
            )
            .unwrap();

        let found = store
            .find_by_field_in("datasources", "raw_source_id", &[RecordId::new("T7")])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, RecordId::new("S9"));
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("monitor.db");
        let at = Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap();

        {
            let store = SqliteStore::new(&path).unwrap();
            store.insert("companies", &StoreRecord::new("C1", at).with("name", "Acme")).unwrap();
        }

        let store = SqliteStore::new(&path).unwrap();
        let found = store.find_by_ids("companies", &[RecordId::new("C1")]).await.unwrap();
        assert_eq!(found[0].attribute_str("name"), Some("Acme"));
    }
}
