use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use placelog_core::host::SessionDirectory;
use placelog_events::{kinds, LogEntry, MapKey, Value};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::sink::LogSink;

/// Samples every anchored session's position once per period
pub struct PositionSampler {
    directory: Arc<dyn SessionDirectory>,
    sink: Arc<dyn LogSink>,
    period: Duration,
}

impl PositionSampler {
    pub fn new(
        directory: Arc<dyn SessionDirectory>,
        sink: Arc<dyn LogSink>,
        period: Duration,
    ) -> Self {
        Self {
            directory,
            sink,
            period,
        }
    }

    /// `["positions", {session_id: [x, y, z]}]`, or `None` if no session has an anchor
    pub fn sample(&self) -> Option<LogEntry> {
        let positions: BTreeMap<MapKey, Value> = self
            .directory
            .sessions()
            .into_iter()
            .filter_map(|session| {
                let position = self.directory.anchor_position(session.id)?;
                let [x, y, z] = position.rounded();
                Some((MapKey::from(session.id), Value::from(vec![x, y, z])))
            })
            .collect();

        if positions.is_empty() {
            None
        } else {
            Some(LogEntry::new(kinds::POSITIONS).with(Value::Map(positions)))
        }
    }

    /// Take one sample and log it. Returns whether anything was logged.
    pub fn tick(&self) -> bool {
        match self.sample() {
            Some(entry) => {
                self.sink.log(entry);
                true
            }
            None => false,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(target: "sources", "Position sampler started, period {:?}", self.period);

        let mut ticker = tokio::time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.tick() {
                        debug!(target: "sources", "No anchored sessions, skipping position sample");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(target: "sources", "Position sampler stopped");
    }
}
