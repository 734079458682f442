use std::time::Duration;

use placelog_core::LogQueue;
use placelog_events::{Batch, BatchMetadata, StoreKey};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::adapter::{StoreAdapter, WriteOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlusherState {
    /// Waiting out the flush interval
    Idle,
    /// Draining the queue and writing a batch
    Flushing,
}

/// What a single flush did
#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
    /// Queue was empty; nothing was written
    Empty,
    Written { key: StoreKey, records: usize },
    /// Blob written, index entry not
    IndexFailed { key: StoreKey, records: usize },
    /// Batch lost; an error record was queued in its place
    BlobFailed { key: StoreKey, records: usize },
}

/// Running totals over the flusher's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub flushes: u64,
    pub batches_written: u64,
    pub records_written: u64,
    pub records_dropped: u64,
    pub blob_failures: u64,
    pub index_failures: u64,
}

/// Periodically drains the queue into one batch per interval
pub struct BatchFlusher {
    queue: LogQueue,
    adapter: StoreAdapter,
    metadata: BatchMetadata,
    interval: Duration,
    state: FlusherState,
    stats: FlushStats,
    /// Timestamp of the last key handed out; keys never repeat within a run
    last_key_ms: Option<i64>,
}

impl BatchFlusher {
    pub fn new(
        queue: LogQueue,
        adapter: StoreAdapter,
        metadata: BatchMetadata,
        interval: Duration,
    ) -> Self {
        Self {
            queue,
            adapter,
            metadata,
            interval,
            state: FlusherState::Idle,
            stats: FlushStats::default(),
            last_key_ms: None,
        }
    }

    pub fn state(&self) -> FlusherState {
        self.state
    }

    pub fn stats(&self) -> FlushStats {
        self.stats
    }

    pub fn metadata(&self) -> &BatchMetadata {
        &self.metadata
    }

    /// Drain the queue and, if anything was queued, write it as one batch
    pub async fn flush_once(&mut self) -> FlushOutcome {
        self.state = FlusherState::Flushing;
        self.stats.flushes += 1;

        let drained = self.queue.drain_all();
        let Some(batch) = Batch::from_drained(self.metadata.clone(), drained) else {
            self.state = FlusherState::Idle;
            return FlushOutcome::Empty;
        };

        let key = StoreKey::new(self.next_key_ms(), &self.metadata.run_id);
        let records = batch.len();

        let outcome = match self.adapter.write(&key, &batch).await {
            WriteOutcome::Written => {
                self.stats.batches_written += 1;
                self.stats.records_written += records as u64;
                FlushOutcome::Written { key, records }
            }
            WriteOutcome::IndexFailed(_) => {
                self.stats.batches_written += 1;
                self.stats.records_written += records as u64;
                self.stats.index_failures += 1;
                FlushOutcome::IndexFailed { key, records }
            }
            WriteOutcome::BlobFailed(_) => {
                self.stats.records_dropped += records as u64;
                self.stats.blob_failures += 1;
                FlushOutcome::BlobFailed { key, records }
            }
        };

        debug!(target: "flusher", "Flush #{}: {:?}", self.stats.flushes, outcome);
        self.state = FlusherState::Idle;
        outcome
    }

    /// Current time, bumped past the previous key if the clock has not moved on
    fn next_key_ms(&mut self) -> i64 {
        let now = self.queue.clock().now_millis();
        let key_ms = match self.last_key_ms {
            Some(last) => now.max(last + 1),
            None => now,
        };
        self.last_key_ms = Some(key_ms);
        key_ms
    }

    /// Flush every interval until `shutdown` fires, then flush once more.
    ///
    /// Writes already in flight when shutdown arrives are allowed to finish.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> FlushStats {
        info!(target: "flusher", "Batch flusher started, interval {:?}", self.interval);

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(target: "flusher", "Batch flusher stopping, flushing remaining records");
        self.flush_once().await;
        info!(target: "flusher", "Batch flusher stopped: {:?}", self.stats);
        self.stats
    }
}
