use std::fmt;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Kind tags emitted by the built-in event sources
pub mod kinds {
    pub const JOINED: &str = "joined";
    pub const LEFT: &str = "left";
    pub const FRIENDS: &str = "friends";
    pub const CHAT: &str = "chat";
    pub const POSITIONS: &str = "positions";
    pub const ERROR: &str = "error";
}

/// A log call before it reaches the queue: a kind tag plus free-form payload.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    kind: String,
    payload: Vec<Value>,
}

impl LogEntry {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Vec::new(),
        }
    }

    /// Append a payload element
    pub fn with(mut self, value: impl Into<Value>) -> Self {
        self.payload.push(value.into());
        self
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.payload.push(value.into());
    }

    /// Put `identity` in front of the payload, right after the kind tag
    pub fn with_identity(mut self, identity: impl Into<Value>) -> Self {
        self.payload.insert(0, identity.into());
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn payload(&self) -> &[Value] {
        &self.payload
    }

    /// Fix the entry in time. The result is immutable.
    pub fn stamp(self, timestamp_ms: i64) -> EventRecord {
        EventRecord {
            timestamp_ms,
            kind: self.kind,
            payload: self.payload,
        }
    }
}

/// Build a [`LogEntry`] from a kind and any number of payload values.
///
/// ```
/// use placelog_events::log_entry;
/// let entry = log_entry!("chat", "Alice", "hi");
/// assert_eq!(entry.payload().len(), 2);
/// ```
#[macro_export]
macro_rules! log_entry {
    ($kind:expr $(, $value:expr)* $(,)?) => {
        $crate::LogEntry::new($kind)$(.with($value))*
    };
}

/// One loggable occurrence, stamped with the millisecond time it was queued.
///
/// On the wire this is a flat array: `[timestamp_ms, kind, ...payload]`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    timestamp_ms: i64,
    kind: String,
    payload: Vec<Value>,
}

impl EventRecord {
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn payload(&self) -> &[Value] {
        &self.payload
    }
}

impl Serialize for EventRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2 + self.payload.len()))?;
        seq.serialize_element(&self.timestamp_ms)?;
        seq.serialize_element(&self.kind)?;
        for value in &self.payload {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

struct EventRecordVisitor;

impl<'de> Visitor<'de> for EventRecordVisitor {
    type Value = EventRecord;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of [timestamp_ms, kind, ...payload]")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<EventRecord, A::Error> {
        let timestamp_ms: i64 = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let kind: String = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(1, &self))?;
        let mut payload = Vec::new();
        while let Some(value) = seq.next_element::<Value>()? {
            payload.push(value);
        }
        Ok(EventRecord {
            timestamp_ms,
            kind,
            payload,
        })
    }
}

impl<'de> Deserialize<'de> for EventRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(EventRecordVisitor)
    }
}
