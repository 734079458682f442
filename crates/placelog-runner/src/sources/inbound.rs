use std::sync::Arc;

use placelog_core::host::SessionDirectory;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::sink::{InboundEvent, LogSink};
use crate::sources::chat::display_name;

/// Server end of the inbound channel: stamps each forwarded entry with the
/// sender's display name, giving `[kind, name, ...payload]`.
pub struct InboundRelay {
    directory: Arc<dyn SessionDirectory>,
    sink: Arc<dyn LogSink>,
}

impl InboundRelay {
    pub fn new(directory: Arc<dyn SessionDirectory>, sink: Arc<dyn LogSink>) -> Self {
        Self { directory, sink }
    }

    pub fn handle(&self, event: InboundEvent) {
        let name = display_name(self.directory.as_ref(), event.session);
        debug!(target: "sources", "Inbound {} from {}", event.entry.kind(), name);
        self.sink.log(event.entry.with_identity(name));
    }

    pub async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<InboundEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(target: "sources", "Inbound relay started");

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        // Anything the clients managed to send before shutdown still counts
        while let Ok(event) = events.try_recv() {
            self.handle(event);
        }

        info!(target: "sources", "Inbound relay stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{InboundChannel, ServerLogger};
    use placelog_core::host::MemoryHost;
    use placelog_core::{LogQueue, ManualClock, SessionInfo};
    use placelog_events::{log_entry, Value};

    #[test]
    fn test_inbound_entry_is_stamped_with_sender() {
        let host = Arc::new(MemoryHost::new());
        host.connect(SessionInfo {
            id: 3,
            user_id: 30,
            display_name: "Bob".to_string(),
        });
        let queue = LogQueue::new(Arc::new(ManualClock::new(0)));
        let relay = InboundRelay::new(host, Arc::new(ServerLogger::new(queue.clone(), true)));

        let (channel, mut rx) = InboundChannel::new("LogEvent");
        channel.client(3).log(log_entry!("shop", "bought", 25));
        relay.handle(rx.try_recv().unwrap());

        let record = queue.dequeue().unwrap();
        assert_eq!(record.kind(), "shop");
        assert_eq!(
            record.payload(),
            &[Value::from("Bob"), Value::from("bought"), Value::from(25)]
        );
    }
}
