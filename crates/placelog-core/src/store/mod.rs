//! Remote key-value store abstractions
//!
//! The managed datastore is a host service. The pipeline only needs two
//! collections from it: a blob collection holding batches and an ordered
//! index mapping each batch key to its timestamp.

pub mod debug_print;
pub mod memory;

use async_trait::async_trait;

pub use debug_print::DebugPrintStore;
pub use memory::MemoryStore;

/// Errors reported by a store backend
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("request to {collection} was throttled")]
    Throttled { collection: String },
    #[error("value for {collection} is too large ({size} bytes, limit {limit})")]
    TooLarge {
        collection: String,
        size: usize,
        limit: usize,
    },
    #[error("{collection}: {message}")]
    Backend { collection: String, message: String },
}

impl StoreError {
    pub fn backend(collection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            collection: collection.into(),
            message: message.into(),
        }
    }
}

/// One entry of an ordered index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: String,
    pub value: i64,
}

/// Collection of arbitrary JSON values addressed by string keys
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn set_blob(
        &self,
        collection: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), StoreError>;

    async fn get_blob(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, StoreError>;
}

/// Collection of integer values that can be scanned in ascending value order
#[async_trait]
pub trait OrderedIndex: Send + Sync {
    async fn set_entry(&self, collection: &str, key: &str, value: i64) -> Result<(), StoreError>;

    /// Entries with `min <= value <= max`, ascending, at most `limit` of them
    async fn range(
        &self,
        collection: &str,
        min: i64,
        max: i64,
        limit: usize,
    ) -> Result<Vec<IndexEntry>, StoreError>;
}
