//! Chronological retrieval of written batches
//!
//! The ordered index maps each batch key to its timestamp, so an offline
//! process can walk a time window in order and fetch the matching blobs.
//! Blobs whose index write failed are not reachable from here.

use std::sync::Arc;

use placelog_core::{BlobStore, OrderedIndex, StoreError};
use placelog_events::Batch;
use tracing::warn;

/// One index entry resolved against the blob collection
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    Batch {
        key: String,
        timestamp_ms: i64,
        batch: Batch,
    },
    /// Indexed, but the blob is gone
    Missing { key: String, timestamp_ms: i64 },
    /// Blob exists but does not decode as a batch
    Corrupt {
        key: String,
        timestamp_ms: i64,
        reason: String,
    },
}

impl ReadOutcome {
    pub fn key(&self) -> &str {
        match self {
            ReadOutcome::Batch { key, .. }
            | ReadOutcome::Missing { key, .. }
            | ReadOutcome::Corrupt { key, .. } => key,
        }
    }

    pub fn batch(&self) -> Option<&Batch> {
        match self {
            ReadOutcome::Batch { batch, .. } => Some(batch),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("store read failed: {0}")]
    Store(#[from] StoreError),
}

pub struct BatchReader {
    blobs: Arc<dyn BlobStore>,
    index: Arc<dyn OrderedIndex>,
    blob_collection: String,
    index_collection: String,
}

impl BatchReader {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        index: Arc<dyn OrderedIndex>,
        blob_collection: impl Into<String>,
        index_collection: impl Into<String>,
    ) -> Self {
        Self {
            blobs,
            index,
            blob_collection: blob_collection.into(),
            index_collection: index_collection.into(),
        }
    }

    /// Batches written between `from_ms` and `to_ms` inclusive, oldest first.
    ///
    /// A failed index scan or blob fetch aborts the read. Entries whose blob is
    /// missing or malformed are returned as such instead.
    pub async fn read_range(
        &self,
        from_ms: i64,
        to_ms: i64,
        limit: usize,
    ) -> Result<Vec<ReadOutcome>, ReadError> {
        let entries = self
            .index
            .range(&self.index_collection, from_ms, to_ms, limit)
            .await?;

        let mut outcomes = Vec::with_capacity(entries.len());
        for entry in entries {
            let blob = self.blobs.get_blob(&self.blob_collection, &entry.key).await?;
            let outcome = match blob {
                None => {
                    warn!(target: "reader", "Index entry {} has no blob", entry.key);
                    ReadOutcome::Missing {
                        key: entry.key,
                        timestamp_ms: entry.value,
                    }
                }
                Some(value) => match Batch::from_json(value) {
                    Ok(batch) => ReadOutcome::Batch {
                        key: entry.key,
                        timestamp_ms: entry.value,
                        batch,
                    },
                    Err(e) => {
                        warn!(target: "reader", "Blob {} is not a batch: {}", entry.key, e);
                        ReadOutcome::Corrupt {
                            key: entry.key,
                            timestamp_ms: entry.value,
                            reason: e.to_string(),
                        }
                    }
                },
            };
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }
}
