//! Record store module
//!
//! The reporting core never talks to a concrete database. It receives a
//! `&dyn RecordStore` per call, which keeps every computation testable
//! against [`memory::InMemoryStore`].

pub mod memory;
pub mod models;
pub mod sqlite;

use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

pub use models::{AttributeFilter, RecordId, StoreRecord, TimeRange};

/// Read-only query capability over named collections
///
/// Implementations return records ordered by `(created_at, id)`; callers
/// rely on that order as the fetch order.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Records in `collection` matching `filter` whose `created_at` is in `range`
    async fn query(
        &self,
        collection: &str,
        filter: &AttributeFilter,
        range: &TimeRange,
    ) -> Result<Vec<StoreRecord>>;

    /// Records in `collection` whose id is one of `ids`
    async fn find_by_ids(&self, collection: &str, ids: &[RecordId]) -> Result<Vec<StoreRecord>>;

    /// Records in `collection` whose `field` normalizes to one of `values`
    async fn find_by_field_in(
        &self,
        collection: &str,
        field: &str,
        values: &[RecordId],
    ) -> Result<Vec<StoreRecord>>;
}

/// Applies a fetch deadline to every call of the wrapped store
///
/// An expired deadline surfaces as [`AppError::DataSource`].
pub struct TimeoutStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S: RecordStore> TimeoutStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn bounded<T>(&self, what: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!("Store fetch '{}' timed out after {:?}", what, self.timeout);
                Err(AppError::DataSource(format!(
                    "fetch from '{}' timed out after {:?}",
                    what, self.timeout
                )))
            }
        }
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for TimeoutStore<S> {
    async fn query(
        &self,
        collection: &str,
        filter: &AttributeFilter,
        range: &TimeRange,
    ) -> Result<Vec<StoreRecord>> {
        self.bounded(collection, self.inner.query(collection, filter, range))
            .await
    }

    async fn find_by_ids(&self, collection: &str, ids: &[RecordId]) -> Result<Vec<StoreRecord>> {
        self.bounded(collection, self.inner.find_by_ids(collection, ids))
            .await
    }

    async fn find_by_field_in(
        &self,
        collection: &str,
        field: &str,
        values: &[RecordId],
    ) -> Result<Vec<StoreRecord>> {
        self.bounded(collection, self.inner.find_by_field_in(collection, field, values))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowStore;

    #[async_trait]
    impl RecordStore for SlowStore {
        async fn query(
            &self,
            _collection: &str,
            _filter: &AttributeFilter,
            _range: &TimeRange,
        ) -> Result<Vec<StoreRecord>> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(vec![])
        }

        async fn find_by_ids(&self, _collection: &str, _ids: &[RecordId]) -> Result<Vec<StoreRecord>> {
            Ok(vec![])
        }

        async fn find_by_field_in(
            &self,
            _collection: &str,
            _field: &str,
            _values: &[RecordId],
        ) -> Result<Vec<StoreRecord>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_timeout_maps_to_data_source_error() {
        let store = TimeoutStore::new(SlowStore, Duration::from_millis(20));
        let err = store
            .query("datasources", &AttributeFilter::new(), &TimeRange::all())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DataSource(_)));
        assert!(err.to_string().contains("datasources"));
    }

    #[tokio::test]
    async fn test_fast_calls_pass_through() {
        let store = TimeoutStore::new(SlowStore, Duration::from_millis(20));
        let found = store.find_by_ids("companies", &[RecordId::new("C1")]).await.unwrap();
        assert!(found.is_empty());
    }
}
