//! Log client module
//!
//! [`LogClient`] is the transport boundary of the source. The cursor is
//! written against the trait; [`RekorClient`] talks to a real Rekor server
//! and [`crate::memory::MemoryLog`] serves entries from memory.

mod http;

pub use http::RekorClient;

use crate::error::RekorResult;
use crate::types::{LogEntry, LogInfo};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Read access to an append-only, index-addressable transparency log
#[async_trait]
pub trait LogClient: Send + Sync {
    /// Current log state, including the committed tree size
    async fn log_info(&self) -> RekorResult<LogInfo>;

    /// Fetch the entry at `index`, giving up after `timeout`.
    ///
    /// An index at or beyond the tree size yields `RekorError::NotFound`.
    async fn entry_by_index(&self, index: u64, timeout: Duration) -> RekorResult<LogEntry>;
}

#[async_trait]
impl<T: LogClient + ?Sized> LogClient for Arc<T> {
    async fn log_info(&self) -> RekorResult<LogInfo> {
        (**self).log_info().await
    }

    async fn entry_by_index(&self, index: u64, timeout: Duration) -> RekorResult<LogEntry> {
        (**self).entry_by_index(index, timeout).await
    }
}

#[async_trait]
impl<T: LogClient + ?Sized> LogClient for Box<T> {
    async fn log_info(&self) -> RekorResult<LogInfo> {
        (**self).log_info().await
    }

    async fn entry_by_index(&self, index: u64, timeout: Duration) -> RekorResult<LogEntry> {
        (**self).entry_by_index(index, timeout).await
    }
}
