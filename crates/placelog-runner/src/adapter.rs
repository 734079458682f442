use std::sync::Arc;

use placelog_core::{BlobStore, LogQueue, OrderedIndex, StoreError};
use placelog_events::{kinds, log_entry, Batch, StoreKey};
use tracing::{debug, warn};

/// Result of one attempt to persist a batch
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// Blob and index entry were both written
    Written,
    /// Blob write failed; no index write was attempted
    BlobFailed(StoreError),
    /// Blob was written but its index entry was not
    IndexFailed(StoreError),
}

/// Writes batches to the blob collection and their keys to the ordered index.
///
/// Failures are never returned to the caller. Each one is turned into an
/// `["error", <collection>, <message>]` record and queued for a later batch;
/// the failed batch itself is dropped.
pub struct StoreAdapter {
    blobs: Arc<dyn BlobStore>,
    index: Arc<dyn OrderedIndex>,
    blob_collection: String,
    index_collection: String,
    queue: LogQueue,
}

impl StoreAdapter {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        index: Arc<dyn OrderedIndex>,
        blob_collection: impl Into<String>,
        index_collection: impl Into<String>,
        queue: LogQueue,
    ) -> Self {
        Self {
            blobs,
            index,
            blob_collection: blob_collection.into(),
            index_collection: index_collection.into(),
            queue,
        }
    }

    pub fn blob_collection(&self) -> &str {
        &self.blob_collection
    }

    pub fn index_collection(&self) -> &str {
        &self.index_collection
    }

    /// Write the batch, then its index entry if the batch made it
    pub async fn write(&self, key: &StoreKey, batch: &Batch) -> WriteOutcome {
        if let Err(e) = self.write_batch(key, batch).await {
            return WriteOutcome::BlobFailed(e);
        }
        match self.write_index_entry(key).await {
            Ok(()) => WriteOutcome::Written,
            Err(e) => WriteOutcome::IndexFailed(e),
        }
    }

    /// Single attempt at the blob collection
    pub async fn write_batch(&self, key: &StoreKey, batch: &Batch) -> Result<(), StoreError> {
        let result = match batch.to_json() {
            Ok(value) => {
                self.blobs
                    .set_blob(&self.blob_collection, &key.to_string(), value)
                    .await
            }
            Err(e) => Err(StoreError::backend(&self.blob_collection, e.to_string())),
        };

        match &result {
            Ok(()) => {
                debug!(target: "adapter", "Wrote {} records to {}[{}]", batch.len(), self.blob_collection, key);
            }
            Err(e) => self.report_failure(&self.blob_collection, e),
        }
        result
    }

    /// Single attempt at the ordered index; the value is the key's timestamp
    pub async fn write_index_entry(&self, key: &StoreKey) -> Result<(), StoreError> {
        let result = self
            .index
            .set_entry(&self.index_collection, &key.to_string(), key.timestamp_ms())
            .await;

        if let Err(e) = &result {
            self.report_failure(&self.index_collection, e);
        }
        result
    }

    fn report_failure(&self, collection: &str, error: &StoreError) {
        warn!(target: "adapter", "Write to {} failed: {}", collection, error);
        self.queue
            .enqueue(log_entry!(kinds::ERROR, collection, error.to_string()));
    }
}
