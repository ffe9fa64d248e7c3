//! Plugin configuration
//!
//! The host passes configuration as a JSON string at init time. All
//! properties are optional and unrecognized properties are ignored.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tlog_core::{PluginError, PluginResult};

/// Default public Rekor instance
pub const DEFAULT_REKOR_SERVER: &str = "https://rekor.sigstore.dev";

/// Per-request deadline for log fetches
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Rekor source configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RekorConfig {
    /// Rekor server address
    pub rekor_server: String,
}

impl Default for RekorConfig {
    fn default() -> Self {
        Self {
            rekor_server: DEFAULT_REKOR_SERVER.to_string(),
        }
    }
}

impl RekorConfig {
    /// Parse the host-provided configuration string.
    ///
    /// An empty string yields the defaults.
    pub fn from_json(raw: &str) -> PluginResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
            .map_err(|e| PluginError::ConfigurationError(format!("invalid init config: {}", e)))
    }

    /// JSON Schema for the init configuration
    pub fn schema() -> serde_json::Value {
        serde_json::json!({
            "$schema": "http://json-schema.org/draft-04/schema#",
            "$ref": "#/definitions/RekorConfig",
            "definitions": {
                "RekorConfig": {
                    "type": "object",
                    "properties": {
                        "rekor_server": {
                            "type": "string",
                            "description": "Rekor server address (Default: https://rekor.sigstore.dev)"
                        }
                    },
                    "additionalProperties": true
                }
            }
        })
    }
}
