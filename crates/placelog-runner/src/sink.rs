//! The public logging call
//!
//! Anything that wants to log goes through [`LogSink`]. On the server the
//! sink is a [`ServerLogger`] that enqueues directly; a client process holds a
//! [`ClientLogger`] that forwards over the named [`InboundChannel`] and lets
//! the server add the sender's identity.

use std::sync::Arc;

use placelog_core::{LogQueue, SessionId};
use placelog_events::{LogEntry, Value};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Destination of log calls
pub trait LogSink: Send + Sync {
    fn log(&self, entry: LogEntry);
}

/// Server-side logger. Enqueues when live, prints locally otherwise.
#[derive(Clone)]
pub struct ServerLogger {
    queue: LogQueue,
    live: bool,
}

impl ServerLogger {
    pub fn new(queue: LogQueue, live: bool) -> Self {
        Self { queue, live }
    }

    /// Log with `identity` placed first in the payload
    pub fn log_as(&self, identity: impl Into<Value>, entry: LogEntry) {
        self.log(entry.with_identity(identity));
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn queue(&self) -> &LogQueue {
        &self.queue
    }
}

impl LogSink for ServerLogger {
    fn log(&self, entry: LogEntry) {
        if self.live {
            self.queue.enqueue(entry);
        } else {
            info!(target: "placelog::local", "{} {:?}", entry.kind(), entry.payload());
        }
    }
}

/// A log call forwarded by a client process
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub session: SessionId,
    pub entry: LogEntry,
}

/// Named client-to-server event channel
#[derive(Clone)]
pub struct InboundChannel {
    name: Arc<str>,
    tx: mpsc::UnboundedSender<InboundEvent>,
}

impl InboundChannel {
    pub fn new(name: &str) -> (Self, mpsc::UnboundedReceiver<InboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                name: Arc::from(name),
                tx,
            },
            rx,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send an entry on behalf of `session`. Returns false once the server side is gone.
    pub fn fire(&self, session: SessionId, entry: LogEntry) -> bool {
        self.tx.send(InboundEvent { session, entry }).is_ok()
    }

    /// Logger handle for a client process connected as `session`
    pub fn client(&self, session: SessionId) -> ClientLogger {
        ClientLogger {
            session,
            channel: self.clone(),
        }
    }
}

/// Client-side logger. Forwards every call over the inbound channel.
#[derive(Clone)]
pub struct ClientLogger {
    session: SessionId,
    channel: InboundChannel,
}

impl ClientLogger {
    pub fn session(&self) -> SessionId {
        self.session
    }
}

impl LogSink for ClientLogger {
    fn log(&self, entry: LogEntry) {
        if !self.channel.fire(self.session, entry) {
            warn!(target: "placelog::client", "{} closed, dropping log entry", self.channel.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use placelog_core::ManualClock;
    use placelog_events::log_entry;

    fn queue() -> LogQueue {
        LogQueue::new(Arc::new(ManualClock::new(0)))
    }

    #[test]
    fn test_live_server_logger_enqueues() {
        let logger = ServerLogger::new(queue(), true);
        logger.log(log_entry!("chat", "Alice", "hi"));
        assert_eq!(logger.queue().len(), 1);
    }

    #[test]
    fn test_local_server_logger_never_enqueues() {
        let logger = ServerLogger::new(queue(), false);
        logger.log(log_entry!("chat", "Alice", "hi"));
        assert!(logger.queue().is_empty());
    }

    #[test]
    fn test_log_as_puts_identity_first() {
        let logger = ServerLogger::new(queue(), true);
        logger.log_as("Alice", log_entry!("joined"));
        let record = logger.queue().dequeue().unwrap();
        assert_eq!(record.payload(), &[Value::from("Alice")]);
    }

    #[test]
    fn test_client_logger_forwards_with_session() {
        let (channel, mut rx) = InboundChannel::new("LogEvent");
        let client = channel.client(42);
        client.log(log_entry!("clicked", "button"));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.session, 42);
        assert_eq!(event.entry.kind(), "clicked");
    }

    #[test]
    fn test_fire_after_server_gone() {
        let (channel, rx) = InboundChannel::new("LogEvent");
        drop(rx);
        assert!(!channel.fire(1, log_entry!("x")));
    }
}
