//! In-memory transparency log
//!
//! Serves entries from memory with the same index semantics as a Rekor
//! server: indices below the tree size resolve, anything beyond is
//! "not found". Failures can be injected to exercise the batcher's retry
//! behaviour, and every requested index is recorded. This is also the
//! backing log of the CLI demo mode, where no network access is needed.

use crate::client::LogClient;
use crate::error::{RekorError, RekorResult};
use crate::types::{LogEntry, LogEntryAnon, LogInfo};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;
use serde_json::Map;
use std::collections::HashMap;
use std::time::Duration;

/// Certificate with an `alice@example.com` RFC 822 SAN, used by demo entries
pub const DEMO_EMAIL_CERT_PEM: &str = include_str!("../testdata/signer-email.pem");

/// Certificate with only a URI SAN, used by demo entries
pub const DEMO_URI_CERT_PEM: &str = include_str!("../testdata/signer-uri.pem");

#[derive(Default)]
struct MemoryLogState {
    /// Entries before this index exist but are not materialized
    history: u64,
    entries: Vec<LogEntry>,
    fail_next: u32,
    fail_at: HashMap<u64, u32>,
    requested: Vec<u64>,
}

/// An append-only log held in memory
#[derive(Default)]
pub struct MemoryLog {
    state: Mutex<MemoryLogState>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log that already holds `history` entries
    pub fn with_history(history: u64) -> Self {
        let log = Self::new();
        log.state.lock().history = history;
        log
    }

    /// Append an entry and return its index
    pub fn append(&self, entry: LogEntry) -> u64 {
        let mut state = self.state.lock();
        state.entries.push(entry);
        state.history + state.entries.len() as u64 - 1
    }

    /// Append a hashedrekord entry signed with the given PEM certificate
    pub fn append_signed(&self, uuid: &str, cert_pem: Option<&str>) -> u64 {
        let mut anon = LogEntryAnon::with_body(hashedrekord_body(cert_pem));
        anon.integrated_time = Some(chrono::Utc::now().timestamp());
        let index = self.tree_size();
        anon.log_index = i64::try_from(index).ok();
        self.append(LogEntry::single(uuid, anon))
    }

    pub fn tree_size(&self) -> u64 {
        let state = self.state.lock();
        state.history + state.entries.len() as u64
    }

    /// Fail the next `count` fetches regardless of index
    pub fn fail_next(&self, count: u32) {
        self.state.lock().fail_next = count;
    }

    /// Fail the next `count` fetches of `index`
    pub fn fail_at(&self, index: u64, count: u32) {
        self.state.lock().fail_at.insert(index, count);
    }

    /// Every index requested so far, in request order
    pub fn requested(&self) -> Vec<u64> {
        self.state.lock().requested.clone()
    }
}

#[async_trait]
impl LogClient for MemoryLog {
    async fn log_info(&self) -> RekorResult<LogInfo> {
        Ok(LogInfo {
            tree_size: self.tree_size(),
            root_hash: None,
            signed_tree_head: None,
            tree_id: Some("memory".to_string()),
            extra: Map::new(),
        })
    }

    async fn entry_by_index(&self, index: u64, _timeout: Duration) -> RekorResult<LogEntry> {
        let mut state = self.state.lock();
        state.requested.push(index);

        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(RekorError::Timeout);
        }
        if let Some(remaining) = state.fail_at.get_mut(&index) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RekorError::server(503, "injected failure"));
            }
        }

        if index < state.history {
            return Ok(LogEntry::single(
                format!("history-{index}"),
                LogEntryAnon::with_body(hashedrekord_body(None)),
            ));
        }

        let offset = usize::try_from(index - state.history)
            .map_err(|_| RekorError::NotFound { index })?;
        state
            .entries
            .get(offset)
            .cloned()
            .ok_or(RekorError::NotFound { index })
    }
}

/// Base64 body of a hashedrekord entry.
///
/// When `cert_pem` is given it becomes `spec.signature.publicKey.content`.
pub fn hashedrekord_body(cert_pem: Option<&str>) -> String {
    let mut signature = serde_json::json!({
        "content": "MEUCIQDqJ0PR6q0KJpA6dPxbWc5vQzVJ0n8u5vXv7w==",
    });
    if let Some(pem) = cert_pem {
        signature["publicKey"] = serde_json::json!({ "content": STANDARD.encode(pem) });
    }

    let doc = serde_json::json!({
        "apiVersion": "0.0.1",
        "kind": "hashedrekord",
        "spec": {
            "data": {
                "hash": {
                    "algorithm": "sha256",
                    "value": "a0cfc71271d6e278e57cd332ff957c3f7043fdda354c4cbb190a30d56efa01bf"
                }
            },
            "signature": signature
        }
    });
    STANDARD.encode(doc.to_string())
}
