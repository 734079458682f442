pub mod adapter;
pub mod flusher;
pub mod logging;
pub mod reader;
mod runtime;
pub mod sink;
pub mod sources;

pub use adapter::{StoreAdapter, WriteOutcome};
pub use flusher::{BatchFlusher, FlushOutcome, FlushStats, FlusherState};
pub use reader::{BatchReader, ReadError, ReadOutcome};
pub use runtime::{BuildError, LoggerRuntime, LoggerRuntimeBuilder};
pub use sink::{ClientLogger, InboundChannel, InboundEvent, LogSink, ServerLogger};
pub use sources::{
    ChatMessage, ChatRelay, ErrorRelay, InboundRelay, PositionSampler, SessionEvent, SessionRelay,
};
