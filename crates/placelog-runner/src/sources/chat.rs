use std::sync::Arc;

use placelog_core::host::SessionDirectory;
use placelog_core::SessionId;
use placelog_events::{kinds, log_entry};
use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::sink::LogSink;

/// A chat line as reported by the host
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub session: SessionId,
    pub text: String,
}

impl ChatMessage {
    pub fn new(session: SessionId, text: impl Into<String>) -> Self {
        Self {
            session,
            text: text.into(),
        }
    }
}

/// Logs `["chat", name, text]` for every message. Only attached on live processes.
pub struct ChatRelay {
    directory: Arc<dyn SessionDirectory>,
    sink: Arc<dyn LogSink>,
}

impl ChatRelay {
    pub fn new(directory: Arc<dyn SessionDirectory>, sink: Arc<dyn LogSink>) -> Self {
        Self { directory, sink }
    }

    pub fn handle(&self, message: ChatMessage) {
        let name = display_name(self.directory.as_ref(), message.session);
        self.sink.log(log_entry!(kinds::CHAT, name, message.text));
    }

    pub async fn run(
        self,
        mut messages: mpsc::UnboundedReceiver<ChatMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(target: "sources", "Chat relay started");

        loop {
            tokio::select! {
                message = messages.recv() => match message {
                    Some(message) => self.handle(message),
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        while let Ok(message) = messages.try_recv() {
            self.handle(message);
        }

        info!(target: "sources", "Chat relay stopped");
    }
}

/// Display name of a session, or its numeric id if it already left
pub(crate) fn display_name(directory: &dyn SessionDirectory, session: SessionId) -> String {
    directory
        .session(session)
        .map(|s| s.display_name)
        .unwrap_or_else(|| session.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ServerLogger;
    use placelog_core::host::MemoryHost;
    use placelog_core::{LogQueue, ManualClock, SessionInfo};
    use placelog_events::Value;

    #[test]
    fn test_chat_record_uses_display_name() {
        let host = Arc::new(MemoryHost::new());
        host.connect(SessionInfo {
            id: 7,
            user_id: 70,
            display_name: "Alice".to_string(),
        });
        let queue = LogQueue::new(Arc::new(ManualClock::new(0)));
        let relay = ChatRelay::new(host, Arc::new(ServerLogger::new(queue.clone(), true)));

        relay.handle(ChatMessage::new(7, "hi"));
        relay.handle(ChatMessage::new(8, "who am i"));

        let records = queue.drain_all();
        assert_eq!(
            records[0].payload(),
            &[Value::from("Alice"), Value::from("hi")]
        );
        assert_eq!(records[1].payload()[0], Value::from("8"));
    }
}
