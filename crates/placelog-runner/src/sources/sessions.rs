use std::collections::HashSet;
use std::sync::Arc;

use placelog_core::host::{FriendsLookup, RegionLookup, SessionDirectory};
use placelog_core::SessionInfo;
use placelog_events::{kinds, log_entry, Value};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::sink::LogSink;

/// Region code logged when the lookup fails
pub const UNKNOWN_REGION: &str = "??";

/// Session lifecycle notifications from the host
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Joined(SessionInfo),
    Left(SessionInfo),
}

/// Turns joins and leaves into `joined`, `friends` and `left` records
pub struct SessionRelay {
    directory: Arc<dyn SessionDirectory>,
    regions: Arc<dyn RegionLookup>,
    friends: Arc<dyn FriendsLookup>,
    sink: Arc<dyn LogSink>,
}

impl SessionRelay {
    pub fn new(
        directory: Arc<dyn SessionDirectory>,
        regions: Arc<dyn RegionLookup>,
        friends: Arc<dyn FriendsLookup>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            directory,
            regions,
            friends,
            sink,
        }
    }

    pub async fn handle(&self, event: SessionEvent) {
        match event {
            SessionEvent::Joined(session) => self.joined(&session).await,
            SessionEvent::Left(session) => {
                self.sink
                    .log(log_entry!(kinds::LEFT, session.display_name.as_str()));
            }
        }
    }

    async fn joined(&self, session: &SessionInfo) {
        let region = match self.regions.region_for(session).await {
            Ok(region) => region,
            Err(e) => {
                warn!(target: "sources", "Region lookup for {} failed: {}", session.display_name, e);
                UNKNOWN_REGION.to_string()
            }
        };
        self.sink.log(log_entry!(
            kinds::JOINED,
            session.display_name.as_str(),
            region
        ));

        let online = self.online_friends(session).await;
        if !online.is_empty() {
            self.sink.log(log_entry!(
                kinds::FRIENDS,
                session.display_name.as_str(),
                Value::from(online)
            ));
        }
    }

    /// Display names of the session's contacts that are connected right now
    async fn online_friends(&self, session: &SessionInfo) -> Vec<String> {
        let friend_ids: HashSet<u64> = match self.friends.friend_user_ids(session).await {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                warn!(target: "sources", "Friends lookup for {} failed: {}", session.display_name, e);
                return Vec::new();
            }
        };

        self.directory
            .sessions()
            .into_iter()
            .filter(|other| other.id != session.id && friend_ids.contains(&other.user_id))
            .map(|other| other.display_name)
            .collect()
    }

    pub async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(target: "sources", "Session relay started");

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        while let Ok(event) = events.try_recv() {
            self.handle(event).await;
        }

        info!(target: "sources", "Session relay stopped");
    }
}
