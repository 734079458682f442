use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use placelog_core::store::MemoryStore;
use placelog_core::{BlobStore, IndexEntry, OrderedIndex, StoreError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Wraps a [`MemoryStore`] and rejects writes at random, the way a throttled
/// datastore would. Reads always succeed.
pub struct FlakyStore {
    inner: Arc<MemoryStore>,
    fail_rate: f64,
    rng: Mutex<StdRng>,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryStore>, fail_rate: f64) -> Self {
        Self::with_rng(inner, fail_rate, StdRng::from_entropy())
    }

    /// Deterministic failures for a given seed
    pub fn seeded(inner: Arc<MemoryStore>, fail_rate: f64, seed: u64) -> Self {
        Self::with_rng(inner, fail_rate, StdRng::seed_from_u64(seed))
    }

    fn with_rng(inner: Arc<MemoryStore>, fail_rate: f64, rng: StdRng) -> Self {
        Self {
            inner,
            fail_rate: fail_rate.clamp(0.0, 1.0),
            rng: Mutex::new(rng),
        }
    }

    pub fn inner(&self) -> &Arc<MemoryStore> {
        &self.inner
    }

    fn throttle(&self, collection: &str) -> Result<(), StoreError> {
        let fail = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_bool(self.fail_rate);
        if fail {
            Err(StoreError::Throttled {
                collection: collection.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BlobStore for FlakyStore {
    async fn set_blob(
        &self,
        collection: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), StoreError> {
        self.throttle(collection)?;
        self.inner.set_blob(collection, key, value).await
    }

    async fn get_blob(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        self.inner.get_blob(collection, key).await
    }
}

#[async_trait]
impl OrderedIndex for FlakyStore {
    async fn set_entry(&self, collection: &str, key: &str, value: i64) -> Result<(), StoreError> {
        self.throttle(collection)?;
        self.inner.set_entry(collection, key, value).await
    }

    async fn range(
        &self,
        collection: &str,
        min: i64,
        max: i64,
        limit: usize,
    ) -> Result<Vec<IndexEntry>, StoreError> {
        self.inner.range(collection, min, max, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_zero_rate_never_fails() {
        let store = FlakyStore::seeded(Arc::new(MemoryStore::new()), 0.0, 7);
        for i in 0..50 {
            store
                .set_blob("Logging", &i.to_string(), json!(i))
                .await
                .unwrap();
        }
        assert_eq!(store.inner().blob_keys("Logging").len(), 50);
    }

    #[tokio::test]
    async fn test_full_rate_always_throttles() {
        let store = FlakyStore::seeded(Arc::new(MemoryStore::new()), 1.0, 7);
        let err = store.set_entry("LoggingIndex", "1.abcd", 1).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Throttled {
                collection: "LoggingIndex".to_string()
            }
        );
        assert!(store.inner().index_entries("LoggingIndex").is_empty());
    }
}
