//! Rekor API types
//!
//! Only the fields this crate reads are typed. Everything else the server
//! sends is kept in `extra` so that re-serializing an entry into an event
//! payload does not drop data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Response of `GET /api/v1/log`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogInfo {
    /// Number of entries currently committed to the active shard
    pub tree_size: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_tree_head: Option<String>,

    #[serde(rename = "treeID", default, skip_serializing_if = "Option::is_none")]
    pub tree_id: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry body as returned by the log, without its UUID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntryAnon {
    /// Base64-encoded canonicalized entry document
    #[serde(default)]
    pub body: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrated_time: Option<i64>,

    #[serde(rename = "logID", default, skip_serializing_if = "Option::is_none")]
    pub log_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LogEntryAnon {
    /// Entry with only a body, as used by tests and the demo log
    pub fn with_body(body: impl Into<String>) -> Self {
        Self {
            body: Value::String(body.into()),
            integrated_time: None,
            log_id: None,
            log_index: None,
            verification: None,
            attestation: None,
            extra: Map::new(),
        }
    }
}

/// A log entry keyed by the UUID assigned by the log server
///
/// The server returns a single key per entry. Keys are kept sorted so that
/// serialization and iteration are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogEntry(BTreeMap<String, LogEntryAnon>);

impl LogEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(uuid: impl Into<String>, entry: LogEntryAnon) -> Self {
        let mut map = BTreeMap::new();
        map.insert(uuid.into(), entry);
        Self(map)
    }

    pub fn insert(&mut self, uuid: impl Into<String>, entry: LogEntryAnon) {
        self.0.insert(uuid.into(), entry);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First entry in UUID order
    pub fn first(&self) -> Option<(&str, &LogEntryAnon)> {
        self.0.iter().next().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &LogEntryAnon)> {
        self.0.iter()
    }
}
