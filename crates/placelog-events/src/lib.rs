//! Core event types for placelog
//!
//! This crate holds the data model shared by every other crate: the loggable
//! [`Value`] tree, the [`EventRecord`] produced when a [`LogEntry`] is queued,
//! and the [`Batch`] / [`StoreKey`] pair written to the remote store.

mod batch;
mod record;
mod value;

pub use batch::{Batch, BatchMetadata, StoreKey, RUN_SUFFIX_LEN};
pub use record::{kinds, EventRecord, LogEntry};
pub use value::{MapKey, Value};

// ============================================================================
// Errors
// ============================================================================

/// Errors decoding records, batches or keys read back from the store
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("malformed batch: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid store key: {0}")]
    InvalidKey(String),
}
