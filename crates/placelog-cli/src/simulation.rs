//! Drives the full pipeline against an in-memory host and store.
//!
//! Simulated players join, wander, chat, click things and leave. Everything
//! they do goes through a production [`LoggerRuntime`] backed by a
//! [`FlakyStore`]; afterwards the batches are read back through the index.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use placelog_core::host::MemoryHost;
use placelog_core::store::MemoryStore;
use placelog_core::{
    Clock, ConfigError, HostEnvironment, PlacelogConfig, Position, SessionId, SessionInfo,
    SystemClock,
};
use placelog_events::log_entry;
use placelog_runner::{
    BatchReader, BuildError, ChatMessage, FlushStats, LogSink, LoggerRuntime, ReadError,
    ReadOutcome, SessionEvent,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::flaky_store::FlakyStore;

const REGIONS: [&str; 5] = ["US", "DE", "GB", "BR", "JP"];
const CHAT_LINES: [&str; 4] = ["hi", "gg", "anyone want to trade?", "brb"];
const BUTTONS: [&str; 3] = ["shop", "inventory", "settings"];

const CHAT_CHANCE: f64 = 0.1;
const CLICK_CHANCE: f64 = 0.05;
const SCRIPT_ERROR_CHANCE: f64 = 0.01;
const LEAVE_CHANCE: f64 = 0.02;

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to start logger: {0}")]
    Build(#[from] BuildError),
    #[error("Failed to read batches back: {0}")]
    Read(#[from] ReadError),
}

/// Wall-clock milliseconds that follow tokio's clock, so paused or
/// accelerated time still yields distinct batch keys.
pub struct SimulatedClock {
    epoch_ms: i64,
    started: Instant,
}

impl SimulatedClock {
    pub fn starting_now() -> Self {
        Self {
            epoch_ms: SystemClock.now_millis(),
            started: Instant::now(),
        }
    }
}

impl Clock for SimulatedClock {
    fn now_millis(&self) -> i64 {
        self.epoch_ms + self.started.elapsed().as_millis() as i64
    }
}

/// What a simulation run wrote and what could be read back
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub run_id: String,
    pub stats: FlushStats,
    pub batches_read: usize,
    pub records_by_kind: BTreeMap<String, usize>,
    pub missing: usize,
    pub corrupt: usize,
    /// Blobs with no index entry, unreachable through the reader
    pub orphaned_blobs: usize,
}

impl SimulationReport {
    pub fn records_read(&self) -> usize {
        self.records_by_kind.values().sum()
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {}", self.run_id)?;
        writeln!(
            f,
            "  flushes: {}, batches written: {}, records written: {}, records dropped: {}",
            self.stats.flushes,
            self.stats.batches_written,
            self.stats.records_written,
            self.stats.records_dropped
        )?;
        writeln!(
            f,
            "  blob failures: {}, index failures: {}",
            self.stats.blob_failures, self.stats.index_failures
        )?;
        writeln!(
            f,
            "  read back: {} batches ({} records), {} missing, {} corrupt, {} orphaned blobs",
            self.batches_read,
            self.records_read(),
            self.missing,
            self.corrupt,
            self.orphaned_blobs
        )?;
        for (kind, count) in &self.records_by_kind {
            writeln!(f, "    {:<12} {}", kind, count)?;
        }
        Ok(())
    }
}

pub struct Simulation {
    config: PlacelogConfig,
    seed: Option<u64>,
}

impl Simulation {
    pub fn new(config: PlacelogConfig) -> Self {
        Self { config, seed: None }
    }

    /// Make player behaviour and store failures reproducible
    pub fn seeded(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub async fn run(
        self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<SimulationReport, SimulationError> {
        self.config.validate()?;
        let sim = &self.config.simulation;
        let logger = &self.config.logger;

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let store = Arc::new(MemoryStore::new());
        let flaky = Arc::new(FlakyStore::seeded(store.clone(), sim.fail_rate, rng.gen()));
        let host = Arc::new(MemoryHost::new());

        let runtime = LoggerRuntime::builder()
            .with_config(logger.clone())
            .environment(HostEnvironment::production())
            .with_store(flaky)
            .with_host(host.clone())
            .with_clock(Arc::new(SimulatedClock::starting_now()))
            .build()?;

        info!(
            "Simulating {} sessions for {}s (fail rate {})",
            sim.sessions, sim.duration_secs, sim.fail_rate
        );

        let mut world = World::new(host, &runtime, rng);
        for _ in 0..sim.sessions {
            world.join();
        }

        let mut ticker = tokio::time::interval(Duration::from_millis(sim.tick_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let deadline = tokio::time::sleep(Duration::from_secs(sim.duration_secs));
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = ticker.tick() => world.tick(&runtime),
                _ = &mut deadline => break,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Simulation interrupted");
                        break;
                    }
                }
            }
        }

        world.leave_all();
        drop(world);

        let run_id = runtime.run_id().to_string();
        let stats = runtime.shutdown().await;

        let reader = BatchReader::new(
            store.clone(),
            store.clone(),
            logger.blob_collection.clone(),
            logger.index_collection.clone(),
        );
        let outcomes = reader.read_range(i64::MIN, i64::MAX, usize::MAX).await?;

        let mut report = SimulationReport {
            run_id,
            stats,
            batches_read: 0,
            records_by_kind: BTreeMap::new(),
            missing: 0,
            corrupt: 0,
            orphaned_blobs: 0,
        };
        for outcome in &outcomes {
            match outcome {
                ReadOutcome::Batch { batch, .. } => {
                    report.batches_read += 1;
                    for record in batch.records() {
                        *report
                            .records_by_kind
                            .entry(record.kind().to_string())
                            .or_default() += 1;
                    }
                }
                ReadOutcome::Missing { .. } => report.missing += 1,
                ReadOutcome::Corrupt { .. } => report.corrupt += 1,
            }
        }
        let blobs = store.blob_keys(&logger.blob_collection).len();
        report.orphaned_blobs = blobs.saturating_sub(report.batches_read + report.corrupt);

        Ok(report)
    }
}

/// Simulated players and the host-side channels they report through
struct World {
    host: Arc<MemoryHost>,
    rng: StdRng,
    next_id: SessionId,
    connected: Vec<SessionInfo>,
    sessions: mpsc::UnboundedSender<SessionEvent>,
    chat: Option<mpsc::UnboundedSender<ChatMessage>>,
}

impl World {
    fn new(host: Arc<MemoryHost>, runtime: &LoggerRuntime, rng: StdRng) -> Self {
        Self {
            host,
            rng,
            next_id: 1,
            connected: Vec::new(),
            sessions: runtime.sessions(),
            chat: runtime.chat(),
        }
    }

    fn join(&mut self) {
        let id = self.next_id;
        self.next_id += 1;
        let session = SessionInfo {
            id,
            user_id: 1000 + id,
            display_name: format!("Player{}", id),
        };

        let friends: Vec<u64> = self
            .connected
            .iter()
            .filter(|_| self.rng.gen_bool(0.5))
            .map(|other| other.user_id)
            .collect();
        let region = REGIONS.choose(&mut self.rng).copied().unwrap_or("US");

        self.host.connect(session.clone());
        self.host.set_region(id, region);
        self.host.set_friends(session.user_id, friends);
        let position = self.random_position();
        self.host.set_position(id, Some(position));

        debug!("{} joined from {}", session.display_name, region);
        let _ = self.sessions.send(SessionEvent::Joined(session.clone()));
        self.connected.push(session);
    }

    fn leave(&mut self, index: usize) {
        let session = self.connected.swap_remove(index);
        self.host.disconnect(session.id);
        debug!("{} left", session.display_name);
        let _ = self.sessions.send(SessionEvent::Left(session));
    }

    fn leave_all(&mut self) {
        while !self.connected.is_empty() {
            self.leave(self.connected.len() - 1);
        }
    }

    fn tick(&mut self, runtime: &LoggerRuntime) {
        for index in (0..self.connected.len()).rev() {
            let id = self.connected[index].id;
            let position = self.random_position();
            self.host.set_position(id, Some(position));

            if self.rng.gen_bool(CHAT_CHANCE) {
                if let (Some(chat), Some(line)) = (&self.chat, CHAT_LINES.choose(&mut self.rng)) {
                    let _ = chat.send(ChatMessage::new(id, *line));
                }
            }
            if self.rng.gen_bool(CLICK_CHANCE) {
                if let Some(button) = BUTTONS.choose(&mut self.rng) {
                    runtime.client(id).log(log_entry!("clicked", *button));
                }
            }
            if self.rng.gen_bool(SCRIPT_ERROR_CHANCE) {
                runtime
                    .errors()
                    .report("InventoryScript", "attempt to index nil with 'Count'");
            }
            if self.rng.gen_bool(LEAVE_CHANCE) {
                self.leave(index);
                self.join();
            }
        }
    }

    fn random_position(&mut self) -> Position {
        Position::new(
            self.rng.gen_range(-500.0..500.0),
            self.rng.gen_range(0.0..50.0),
            self.rng.gen_range(-500.0..500.0),
        )
    }
}
