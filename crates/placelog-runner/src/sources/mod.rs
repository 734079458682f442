//! Event sources feeding the queue
//!
//! Every source logs through a [`LogSink`](crate::sink::LogSink) and runs as
//! its own task until the shutdown signal fires.

pub mod chat;
pub mod errors;
pub mod inbound;
pub mod position;
pub mod sessions;

pub use chat::{ChatMessage, ChatRelay};
pub use errors::{panic_entry, ErrorRelay, PANIC_SOURCE};
pub use inbound::InboundRelay;
pub use position::PositionSampler;
pub use sessions::{SessionEvent, SessionRelay, UNKNOWN_REGION};
