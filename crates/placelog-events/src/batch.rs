use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::record::EventRecord;
use crate::RecordError;

/// Number of trailing run-id characters used in a store key
pub const RUN_SUFFIX_LEN: usize = 4;

/// Static place/run metadata leading every batch. Wire shape: `[world_id, run_id]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchMetadata {
    pub world_id: String,
    pub run_id: String,
}

impl BatchMetadata {
    pub fn new(world_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            world_id: world_id.into(),
            run_id: run_id.into(),
        }
    }
}

impl Serialize for BatchMetadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.world_id, &self.run_id).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BatchMetadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (world_id, run_id) = <(String, String)>::deserialize(deserializer)?;
        Ok(Self { world_id, run_id })
    }
}

/// One write unit for the blob collection: metadata followed by the records
/// drained at a single flush.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    metadata: BatchMetadata,
    records: Vec<EventRecord>,
}

impl Batch {
    /// Returns `None` when nothing was drained; an empty queue never produces a batch.
    pub fn from_drained(metadata: BatchMetadata, records: Vec<EventRecord>) -> Option<Self> {
        if records.is_empty() {
            None
        } else {
            Some(Self { metadata, records })
        }
    }

    pub fn metadata(&self) -> &BatchMetadata {
        &self.metadata
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_json(&self) -> Result<serde_json::Value, RecordError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, RecordError> {
        Ok(serde_json::from_value(value)?)
    }
}

impl Serialize for Batch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(1 + self.records.len()))?;
        seq.serialize_element(&self.metadata)?;
        for record in &self.records {
            seq.serialize_element(record)?;
        }
        seq.end()
    }
}

struct BatchVisitor;

impl<'de> Visitor<'de> for BatchVisitor {
    type Value = Batch;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of [[world_id, run_id], ...records]")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Batch, A::Error> {
        let metadata: BatchMetadata = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let mut records = Vec::new();
        while let Some(record) = seq.next_element::<EventRecord>()? {
            records.push(record);
        }
        Ok(Batch { metadata, records })
    }
}

impl<'de> Deserialize<'de> for Batch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(BatchVisitor)
    }
}

/// Key of a batch in both collections: `"{timestamp_ms}.{run_suffix}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    timestamp_ms: i64,
    suffix: String,
}

impl StoreKey {
    pub fn new(timestamp_ms: i64, run_id: &str) -> Self {
        let char_count = run_id.chars().count();
        let suffix = run_id
            .chars()
            .skip(char_count.saturating_sub(RUN_SUFFIX_LEN))
            .collect();
        Self {
            timestamp_ms,
            suffix,
        }
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.timestamp_ms, self.suffix)
    }
}

impl FromStr for StoreKey {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (timestamp, suffix) = s
            .split_once('.')
            .ok_or_else(|| RecordError::InvalidKey(s.to_string()))?;
        let timestamp_ms = timestamp
            .parse::<i64>()
            .map_err(|_| RecordError::InvalidKey(s.to_string()))?;
        Ok(Self {
            timestamp_ms,
            suffix: suffix.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_entry;
    use serde_json::json;

    fn metadata() -> BatchMetadata {
        BatchMetadata::new("4711", "a1b2c3d4-e5f6")
    }

    #[test]
    fn test_empty_drain_builds_no_batch() {
        assert!(Batch::from_drained(metadata(), Vec::new()).is_none());
    }

    #[test]
    fn test_batch_wire_shape() {
        let records = vec![
            log_entry!("joined", "Alice").stamp(1),
            log_entry!("chat", "Alice", "hi").stamp(2),
        ];
        let batch = Batch::from_drained(metadata(), records).unwrap();
        assert_eq!(
            batch.to_json().unwrap(),
            json!([
                ["4711", "a1b2c3d4-e5f6"],
                [1, "joined", "Alice"],
                [2, "chat", "Alice", "hi"]
            ])
        );
    }

    #[test]
    fn test_batch_decodes_from_store_value() {
        let batch = Batch::from_json(json!([["w", "r"], [3, "left", "Bob"]])).unwrap();
        assert_eq!(batch.metadata().world_id, "w");
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.records()[0].kind(), "left");
    }

    #[test]
    fn test_batch_without_metadata_is_rejected() {
        assert!(Batch::from_json(json!([])).is_err());
        assert!(Batch::from_json(json!({"a": 1})).is_err());
    }

    #[test]
    fn test_store_key_uses_last_four_run_chars() {
        let key = StoreKey::new(1_700_000_000_000, "a1b2c3d4-e5f6");
        assert_eq!(key.to_string(), "1700000000000.e5f6");
    }

    #[test]
    fn test_store_key_short_run_id() {
        assert_eq!(StoreKey::new(9, "ab").to_string(), "9.ab");
    }

    #[test]
    fn test_store_key_parse() {
        let key: StoreKey = "1700000000000.e5f6".parse().unwrap();
        assert_eq!(key.timestamp_ms(), 1_700_000_000_000);
        assert_eq!(key.suffix(), "e5f6");
        assert!("nodot".parse::<StoreKey>().is_err());
        assert!("abc.e5f6".parse::<StoreKey>().is_err());
    }
}
