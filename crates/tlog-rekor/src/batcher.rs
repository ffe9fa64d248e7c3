//! Event batcher
//!
//! Fills the host's writer slots for one poll cycle. Each slot gets one fetch
//! attempt at the cursor position. A failed fetch is logged and the next
//! attempt retries the same index, so a stalled index never causes a gap and
//! never blocks the loop for longer than one fetch timeout per attempt.

use crate::client::LogClient;
use crate::cursor::LogCursor;
use crate::error::BatchError;
use chrono::Utc;
use tlog_core::EventWriters;
use tracing::{debug, warn};

/// Batcher statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Batch fill calls with non-zero capacity
    pub batches: u64,
    /// Events written to host slots
    pub events_produced: u64,
    /// Fetch attempts that failed and were left for retry
    pub fetch_failures: u64,
    /// Payload bytes written
    pub bytes_produced: u64,
}

/// Drives a [`LogCursor`] to fill batches of events
pub struct EventBatcher<C> {
    cursor: LogCursor<C>,
    stats: BatchStats,
}

impl<C: LogClient> EventBatcher<C> {
    pub fn new(cursor: LogCursor<C>) -> Self {
        Self {
            cursor,
            stats: BatchStats::default(),
        }
    }

    /// Attempt one fetch per slot in `events` and return how many were filled.
    ///
    /// Filled slots are always `events[0..produced]`. Only a failure to encode
    /// or store a fetched entry aborts the batch; the cursor is not advanced
    /// past an entry that was not delivered.
    pub async fn fill_batch(&mut self, events: &mut EventWriters) -> Result<usize, BatchError> {
        let capacity = events.len();
        if capacity == 0 {
            return Ok(0);
        }
        self.stats.batches += 1;

        let mut produced = 0;
        for _ in 0..capacity {
            let index = self.cursor.position();
            let entry = match self.cursor.fetch(index).await {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("got error while getting log entry at index={}: {}", index, e);
                    self.stats.fetch_failures += 1;
                    continue;
                }
            };

            let payload = serde_json::to_vec(&entry)
                .map_err(|source| BatchError::Serialize { index, source })?;

            let Some(slot) = events.get_mut(produced) else {
                break;
            };
            slot.set_timestamp(now_ns());
            slot.write(&payload)
                .map_err(|source| BatchError::Write { index, source })?;

            self.cursor.advance();
            produced += 1;
            self.stats.events_produced += 1;
            self.stats.bytes_produced += payload.len() as u64;
        }

        debug!(
            "batch filled {}/{} slots, next index={}",
            produced,
            capacity,
            self.cursor.position()
        );
        Ok(produced)
    }

    pub fn cursor(&self) -> &LogCursor<C> {
        &self.cursor
    }

    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }
}

fn now_ns() -> u64 {
    Utc::now()
        .timestamp_nanos_opt()
        .and_then(|ns| u64::try_from(ns).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLog;
    use crate::types::LogEntry;
    use std::sync::Arc;

    async fn batcher_over(log: &Arc<MemoryLog>) -> EventBatcher<Arc<MemoryLog>> {
        let (cursor, _) = LogCursor::open(log.clone()).await.unwrap();
        EventBatcher::new(cursor)
    }

    fn fill_log(log: &MemoryLog, count: u64) {
        for _ in 0..count {
            let index = log.tree_size();
            log.append_signed(&format!("entry-{index}"), None);
        }
    }

    fn produced_uuids(events: &EventWriters, produced: usize) -> Vec<String> {
        events
            .iter()
            .take(produced)
            .map(|slot| {
                let entry: LogEntry = serde_json::from_slice(slot.data()).unwrap();
                entry.first().unwrap().0.to_string()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_capacity_respected() {
        let log = Arc::new(MemoryLog::with_history(100));
        let mut batcher = batcher_over(&log).await;
        fill_log(&log, 50);

        let mut events = EventWriters::new(5);
        let produced = batcher.fill_batch(&mut events).await.unwrap();

        assert_eq!(produced, 5);
        assert_eq!(batcher.cursor().position(), 105);
        assert_eq!(
            produced_uuids(&events, produced),
            vec!["entry-100", "entry-101", "entry-102", "entry-103", "entry-104"]
        );
        assert!(events.iter().all(|slot| slot.timestamp() > 0));
        assert_eq!(batcher.stats().events_produced, 5);
        assert_eq!(batcher.stats().fetch_failures, 0);
    }

    #[tokio::test]
    async fn test_zero_capacity() {
        let log = Arc::new(MemoryLog::with_history(3));
        let mut batcher = batcher_over(&log).await;
        fill_log(&log, 3);

        let mut events = EventWriters::new(0);
        assert_eq!(batcher.fill_batch(&mut events).await.unwrap(), 0);
        assert!(log.requested().is_empty());
        assert_eq!(batcher.stats().batches, 0);
    }

    #[tokio::test]
    async fn test_first_fetch_targets_tree_size() {
        let log = Arc::new(MemoryLog::with_history(1000));
        let mut batcher = batcher_over(&log).await;
        fill_log(&log, 2);

        let mut events = EventWriters::new(4);
        let produced = batcher.fill_batch(&mut events).await.unwrap();
        assert_eq!(produced, 2);

        let requested = log.requested();
        assert_eq!(requested[0], 1000);
        assert!(requested.iter().all(|&index| index >= 1000));
    }

    #[tokio::test]
    async fn test_caught_up_log_does_not_advance() {
        let log = Arc::new(MemoryLog::with_history(10));
        let mut batcher = batcher_over(&log).await;

        let mut events = EventWriters::new(3);
        assert_eq!(batcher.fill_batch(&mut events).await.unwrap(), 0);
        assert_eq!(batcher.cursor().position(), 10);
        assert_eq!(log.requested(), vec![10, 10, 10]);
        assert_eq!(batcher.stats().fetch_failures, 3);
    }

    #[tokio::test]
    async fn test_stalled_index_is_retried_not_skipped() {
        let log = Arc::new(MemoryLog::with_history(20));
        let mut batcher = batcher_over(&log).await;
        fill_log(&log, 5);
        log.fail_at(20, 3);

        let mut events = EventWriters::new(2);
        assert_eq!(batcher.fill_batch(&mut events).await.unwrap(), 0);
        assert_eq!(batcher.cursor().position(), 20);

        events.reset();
        let produced = batcher.fill_batch(&mut events).await.unwrap();
        assert_eq!(produced, 1);
        assert_eq!(produced_uuids(&events, produced), vec!["entry-20"]);
        assert_eq!(batcher.cursor().position(), 21);
        assert_eq!(log.requested(), vec![20, 20, 20, 20]);
    }

    #[tokio::test]
    async fn test_gap_free_under_interspersed_failures() {
        let log = Arc::new(MemoryLog::with_history(500));
        let mut batcher = batcher_over(&log).await;
        fill_log(&log, 40);
        log.fail_at(502, 2);
        log.fail_at(507, 1);
        log.fail_at(515, 4);

        let mut seen = Vec::new();
        let mut events = EventWriters::new(4);
        for round in 0..12 {
            if round == 5 {
                log.fail_next(3);
            }
            events.reset();
            let produced = batcher.fill_batch(&mut events).await.unwrap();
            seen.extend(produced_uuids(&events, produced));
        }

        let expected: Vec<String> = (500..500 + seen.len() as u64)
            .map(|i| format!("entry-{i}"))
            .collect();
        assert_eq!(seen, expected);
        assert_eq!(batcher.cursor().position(), 500 + seen.len() as u64);
        assert_eq!(batcher.stats().fetch_failures, 10);
        assert_eq!(seen.len(), 38);
    }

    #[tokio::test]
    async fn test_filled_slots_are_a_prefix() {
        let log = Arc::new(MemoryLog::with_history(0));
        let mut batcher = batcher_over(&log).await;
        fill_log(&log, 3);
        log.fail_next(1);

        let mut events = EventWriters::new(4);
        let produced = batcher.fill_batch(&mut events).await.unwrap();
        assert_eq!(produced, 3);
        assert_eq!(
            produced_uuids(&events, produced),
            vec!["entry-0", "entry-1", "entry-2"]
        );
        assert!(events.get(3).unwrap().data().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_event_is_fatal_and_not_consumed() {
        let log = Arc::new(MemoryLog::with_history(7));
        let mut batcher = batcher_over(&log).await;
        fill_log(&log, 1);

        let mut events = EventWriters::with_event_size(2, 16);
        let err = batcher.fill_batch(&mut events).await.unwrap_err();
        assert!(matches!(err, BatchError::Write { index: 7, .. }));
        assert_eq!(batcher.cursor().position(), 7);
    }
}
