use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use placelog_events::{EventRecord, LogEntry};
use tracing::warn;

use crate::clock::Clock;

/// Shared FIFO of event records waiting for the next flush.
///
/// Cloning the handle shares the same queue. Every critical section is a
/// short synchronous push or swap, so `drain_all` can never observe a
/// half-finished `enqueue` even on a multi-threaded runtime.
#[derive(Clone)]
pub struct LogQueue {
    records: Arc<Mutex<VecDeque<EventRecord>>>,
    clock: Arc<dyn Clock>,
    warn_len: usize,
}

impl LogQueue {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Arc::new(Mutex::new(VecDeque::new())),
            clock,
            warn_len: 0,
        }
    }

    /// Warn every time the queue grows by another `len` records. 0 disables.
    pub fn with_warn_len(mut self, len: usize) -> Self {
        self.warn_len = len;
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<EventRecord>> {
        // A panicking producer must not take telemetry down with it
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stamp `entry` with the current time and append it to the tail
    pub fn enqueue(&self, entry: LogEntry) {
        let record = entry.stamp(self.clock.now_millis());
        let len = {
            let mut records = self.lock();
            records.push_back(record);
            records.len()
        };

        if self.should_warn_at(len) {
            warn!(target: "queue", "Log queue holds {} records; the store may be unavailable", len);
        }
    }

    fn should_warn_at(&self, len: usize) -> bool {
        self.warn_len > 0 && len % self.warn_len == 0
    }

    /// Remove and return the head
    pub fn dequeue(&self) -> Option<EventRecord> {
        self.lock().pop_front()
    }

    /// Remove every queued record, oldest first
    pub fn drain_all(&self) -> Vec<EventRecord> {
        let drained = std::mem::take(&mut *self.lock());
        Vec::from(drained)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

impl std::fmt::Debug for LogQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogQueue")
            .field("len", &self.len())
            .field("warn_len", &self.warn_len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use placelog_events::log_entry;

    fn queue_at(start: i64) -> (LogQueue, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start));
        (LogQueue::new(clock.clone()), clock)
    }

    #[test]
    fn test_enqueue_stamps_current_time() {
        let (queue, clock) = queue_at(1_000);
        queue.enqueue(log_entry!("joined", "Alice"));
        clock.advance(25);
        queue.enqueue(log_entry!("chat", "Alice", "hi"));

        let records = queue.drain_all();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp_ms(), 1_000);
        assert_eq!(records[1].timestamp_ms(), 1_025);
    }

    #[test]
    fn test_warns_at_each_multiple_of_warn_len() {
        let (queue, _) = queue_at(0);
        let queue = queue.with_warn_len(3);
        let warned: Vec<usize> = (1..=9).filter(|len| queue.should_warn_at(*len)).collect();
        assert_eq!(warned, vec![3, 6, 9]);

        for _ in 0..4 {
            queue.enqueue(log_entry!("a"));
        }
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn test_zero_warn_len_never_warns() {
        let (queue, _) = queue_at(0);
        assert!((0..100).all(|len| !queue.should_warn_at(len)));

        let queue = queue.with_warn_len(0);
        assert!(!queue.should_warn_at(0));
        assert!(!queue.should_warn_at(10_000));
    }

    #[test]
    fn test_dequeue_is_fifo() {
        let (queue, _) = queue_at(0);
        queue.enqueue(log_entry!("a"));
        queue.enqueue(log_entry!("b"));

        assert_eq!(queue.dequeue().unwrap().kind(), "a");
        assert_eq!(queue.dequeue().unwrap().kind(), "b");
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn test_drain_leaves_queue_empty() {
        let (queue, _) = queue_at(0);
        queue.enqueue(log_entry!("a"));
        assert!(!queue.is_empty());

        assert_eq!(queue.drain_all().len(), 1);
        assert!(queue.is_empty());
        assert!(queue.drain_all().is_empty());
    }

    #[test]
    fn test_interleaved_drains_see_every_record_once_in_order() {
        let (queue, _) = queue_at(0);
        let mut seen = Vec::new();
        let mut next = 0i64;

        for round in 0..10 {
            for _ in 0..round {
                queue.enqueue(log_entry!("n", next));
                next += 1;
            }
            seen.extend(queue.drain_all());
        }

        let values: Vec<i64> = seen
            .iter()
            .map(|r| r.payload()[0].as_i64().unwrap())
            .collect();
        assert_eq!(values, (0..next).collect::<Vec<_>>());
    }

    #[test]
    fn test_clones_share_storage() {
        let (queue, _) = queue_at(0);
        let producer = queue.clone();
        producer.enqueue(log_entry!("x"));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_concurrent_producers_lose_nothing() {
        let (queue, _) = queue_at(0);
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let q = queue.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        q.enqueue(log_entry!("n", t * 1000 + i));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.drain_all().len(), 1000);
    }
}
