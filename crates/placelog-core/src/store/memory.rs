use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{BlobStore, IndexEntry, OrderedIndex, StoreError};

#[derive(Default)]
struct MemoryState {
    blobs: HashMap<String, BTreeMap<String, serde_json::Value>>,
    index: HashMap<String, BTreeMap<String, i64>>,
    failing_blob_writes: u32,
    failing_index_writes: u32,
    blob_write_attempts: u64,
    index_write_attempts: u64,
    value_limit: Option<usize>,
}

/// In-process store with failure injection, for tests and the simulator
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject blob values whose JSON encoding exceeds `bytes`
    pub fn with_value_limit(self, bytes: usize) -> Self {
        self.lock().value_limit = Some(bytes);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `count` blob writes fail
    pub fn fail_next_blob_writes(&self, count: u32) {
        self.lock().failing_blob_writes = count;
    }

    /// Make the next `count` index writes fail
    pub fn fail_next_index_writes(&self, count: u32) {
        self.lock().failing_index_writes = count;
    }

    pub fn blob(&self, collection: &str, key: &str) -> Option<serde_json::Value> {
        self.lock()
            .blobs
            .get(collection)
            .and_then(|c| c.get(key))
            .cloned()
    }

    pub fn blob_keys(&self, collection: &str) -> Vec<String> {
        self.lock()
            .blobs
            .get(collection)
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// All index entries of a collection in ascending value order
    pub fn index_entries(&self, collection: &str) -> Vec<IndexEntry> {
        let state = self.lock();
        state
            .index
            .get(collection)
            .map(|c| sorted_entries(c, i64::MIN, i64::MAX, usize::MAX))
            .unwrap_or_default()
    }

    pub fn blob_write_attempts(&self) -> u64 {
        self.lock().blob_write_attempts
    }

    pub fn index_write_attempts(&self) -> u64 {
        self.lock().index_write_attempts
    }
}

fn sorted_entries(
    collection: &BTreeMap<String, i64>,
    min: i64,
    max: i64,
    limit: usize,
) -> Vec<IndexEntry> {
    let mut entries: Vec<IndexEntry> = collection
        .iter()
        .filter(|(_, value)| (min..=max).contains(*value))
        .map(|(key, value)| IndexEntry {
            key: key.clone(),
            value: *value,
        })
        .collect();
    entries.sort_by(|a, b| a.value.cmp(&b.value).then_with(|| a.key.cmp(&b.key)));
    entries.truncate(limit);
    entries
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn set_blob(
        &self,
        collection: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.blob_write_attempts += 1;

        if state.failing_blob_writes > 0 {
            state.failing_blob_writes -= 1;
            return Err(StoreError::backend(collection, "simulated write failure"));
        }

        if let Some(limit) = state.value_limit {
            let size = value.to_string().len();
            if size > limit {
                return Err(StoreError::TooLarge {
                    collection: collection.to_string(),
                    size,
                    limit,
                });
            }
        }

        state
            .blobs
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get_blob(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.blob(collection, key))
    }
}

#[async_trait]
impl OrderedIndex for MemoryStore {
    async fn set_entry(&self, collection: &str, key: &str, value: i64) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.index_write_attempts += 1;

        if state.failing_index_writes > 0 {
            state.failing_index_writes -= 1;
            return Err(StoreError::backend(collection, "simulated write failure"));
        }

        state
            .index
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn range(
        &self,
        collection: &str,
        min: i64,
        max: i64,
        limit: usize,
    ) -> Result<Vec<IndexEntry>, StoreError> {
        let state = self.lock();
        Ok(state
            .index
            .get(collection)
            .map(|c| sorted_entries(c, min, max, limit))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_blob_roundtrip() {
        let store = MemoryStore::new();
        store.set_blob("Logging", "1.abcd", json!([1])).await.unwrap();
        assert_eq!(
            store.get_blob("Logging", "1.abcd").await.unwrap(),
            Some(json!([1]))
        );
        assert_eq!(store.get_blob("Logging", "2.abcd").await.unwrap(), None);
        assert_eq!(store.blob_keys("Logging"), vec!["1.abcd".to_string()]);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let store = MemoryStore::new();
        store.fail_next_blob_writes(1);

        assert!(store.set_blob("Logging", "k", json!(1)).await.is_err());
        assert!(store.set_blob("Logging", "k", json!(1)).await.is_ok());
        assert_eq!(store.blob_write_attempts(), 2);
    }

    #[tokio::test]
    async fn test_value_limit() {
        let store = MemoryStore::new().with_value_limit(8);
        let err = store
            .set_blob("Logging", "k", json!("a long string value"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TooLarge { .. }));
        assert!(store.blob("Logging", "k").is_none());
    }

    #[tokio::test]
    async fn test_range_is_ordered_and_bounded() {
        let store = MemoryStore::new();
        for (key, value) in [("c", 30), ("a", 10), ("b", 20), ("d", 40)] {
            store.set_entry("LoggingIndex", key, value).await.unwrap();
        }

        let entries = store.range("LoggingIndex", 15, 40, 2).await.unwrap();
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "c"]);

        assert!(store.range("Other", 0, 100, 10).await.unwrap().is_empty());
    }
}
