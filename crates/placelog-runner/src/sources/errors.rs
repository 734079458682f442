use std::fmt::Display;
use std::panic::PanicHookInfo;
use std::sync::Arc;

use placelog_events::{kinds, log_entry, LogEntry};

use crate::sink::LogSink;

/// Source tag used for errors captured by the panic hook
pub const PANIC_SOURCE: &str = "panic";

/// Routes uncaught and reported errors into the log as `"error"` records
#[derive(Clone)]
pub struct ErrorRelay {
    sink: Arc<dyn LogSink>,
}

impl ErrorRelay {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    /// Log a script error that was caught by the caller
    pub fn report(&self, source: &str, message: impl Display) {
        self.sink
            .log(log_entry!(kinds::ERROR, source, message.to_string()));
    }

    /// Install a process-wide panic hook that logs every panic.
    ///
    /// The previously installed hook still runs afterwards.
    pub fn install_panic_hook(&self) {
        let sink = self.sink.clone();
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            sink.log(panic_entry(info));
            previous(info);
        }));
    }
}

/// `["error", "panic", message, location]`
pub fn panic_entry(info: &PanicHookInfo<'_>) -> LogEntry {
    let payload = info.payload();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    let location = info
        .location()
        .map(|l| format!("{}:{}", l.file(), l.line()))
        .unwrap_or_default();

    log_entry!(kinds::ERROR, PANIC_SOURCE, message, location)
}
