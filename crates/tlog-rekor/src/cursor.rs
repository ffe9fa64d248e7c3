//! Sequential log cursor
//!
//! Holds the single position an opened source reads from. The position
//! starts at the tree size observed at open, so only entries appended after
//! the source started are ever read. It moves forward by one per
//! successfully consumed entry and never moves back.

use crate::client::LogClient;
use crate::config::FETCH_TIMEOUT;
use crate::error::RekorResult;
use crate::types::LogEntry;
use std::time::Duration;
use tracing::{debug, info};

/// Cursor over an index-addressable log
pub struct LogCursor<C> {
    client: C,
    start_index: u64,
    position: u64,
    timeout: Duration,
}

impl<C: LogClient> LogCursor<C> {
    /// Query the log size and position a new cursor at it.
    ///
    /// Returns the cursor together with its start index.
    pub async fn open(client: C) -> RekorResult<(Self, u64)> {
        let info = client.log_info().await?;
        let start_index = info.tree_size;
        info!("Tailing log from tree size {}", start_index);

        let cursor = Self {
            client,
            start_index,
            position: start_index,
            timeout: FETCH_TIMEOUT,
        };
        Ok((cursor, start_index))
    }

    /// Fetch the entry at `index`.
    ///
    /// Does not move the cursor. Every error is retryable from the cursor's
    /// point of view.
    pub async fn fetch(&self, index: u64) -> RekorResult<LogEntry> {
        debug!("getting log entry with index={}", index);
        self.client.entry_by_index(index, self.timeout).await
    }

    /// Fetch the entry at the current position
    pub async fn fetch_current(&self) -> RekorResult<LogEntry> {
        self.fetch(self.position).await
    }

    /// Move to the next index after a successful fetch
    pub fn advance(&mut self) {
        self.position += 1;
        debug!("currentIndex incremented to: {}", self.position);
    }

    /// Next index to fetch
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Tree size observed at open
    pub fn start_index(&self) -> u64 {
        self.start_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLog;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_open_starts_at_tree_size() {
        let log = Arc::new(MemoryLog::with_history(1000));
        let (cursor, start) = LogCursor::open(log.clone()).await.unwrap();

        assert_eq!(start, 1000);
        assert_eq!(cursor.position(), 1000);
        assert_eq!(cursor.start_index(), 1000);
        assert!(log.requested().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_does_not_advance() {
        let log = Arc::new(MemoryLog::with_history(3));
        log.append_signed("u3", None);
        let (mut cursor, _) = LogCursor::open(log.clone()).await.unwrap();
        assert_eq!(cursor.position(), 4);

        // Not yet written: error, position unchanged
        assert!(cursor.fetch_current().await.is_err());
        assert_eq!(cursor.position(), 4);

        log.append_signed("u4", None);
        let entry = cursor.fetch_current().await.unwrap();
        assert_eq!(entry.first().unwrap().0, "u4");
        assert_eq!(cursor.position(), 4);

        cursor.advance();
        assert_eq!(cursor.position(), 5);
        assert_eq!(log.requested(), vec![4, 4]);
    }

    #[tokio::test]
    async fn test_cursors_are_independent() {
        let log = Arc::new(MemoryLog::with_history(5));
        let (mut a, _) = LogCursor::open(log.clone()).await.unwrap();
        let (b, _) = LogCursor::open(log.clone()).await.unwrap();

        a.advance();
        a.advance();
        assert_eq!(a.position(), 7);
        assert_eq!(b.position(), 5);
    }
}
