use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::info;

use super::{BlobStore, IndexEntry, OrderedIndex, StoreError};

/// Store that prints every write through `tracing` and keeps nothing.
///
/// Used when pretending to be deployed outside production, so the whole
/// pipeline runs without touching the real datastore.
#[derive(Debug, Default)]
pub struct DebugPrintStore {
    writes: AtomicU64,
}

impl DebugPrintStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of writes printed so far
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl BlobStore for DebugPrintStore {
    async fn set_blob(
        &self,
        collection: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        info!(target: "placelog::pretend", "{}[{}] = {}", collection, key, value);
        Ok(())
    }

    async fn get_blob(
        &self,
        _collection: &str,
        _key: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(None)
    }
}

#[async_trait]
impl OrderedIndex for DebugPrintStore {
    async fn set_entry(&self, collection: &str, key: &str, value: i64) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        info!(target: "placelog::pretend", "{}[{}] = {}", collection, key, value);
        Ok(())
    }

    async fn range(
        &self,
        _collection: &str,
        _min: i64,
        _max: i64,
        _limit: usize,
    ) -> Result<Vec<IndexEntry>, StoreError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_writes_are_counted_not_kept() {
        let store = DebugPrintStore::new();
        store.set_blob("Logging", "1.abcd", json!([1])).await.unwrap();
        store.set_entry("LoggingIndex", "1.abcd", 1).await.unwrap();

        assert_eq!(store.writes(), 2);
        assert_eq!(store.get_blob("Logging", "1.abcd").await.unwrap(), None);
        assert!(store.range("LoggingIndex", 0, 10, 10).await.unwrap().is_empty());
    }
}
