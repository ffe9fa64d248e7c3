//! Plugin traits for the host lifecycle
//!
//! A host runtime drives plugins through a fixed set of calls: init, open,
//! next_batch, close, extract and destroy. Each capability is defined as a
//! trait so the plugin core can be written against the interface and bound
//! to a concrete host by a thin adapter.

use crate::events::{EventReader, EventWriters};
use crate::fields::{ExtractRequest, FieldEntry};
use async_trait::async_trait;
use thiserror::Error;

/// Plugin error type
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Plugin initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Plugin operation failed: {0}")]
    OperationFailed(String),

    #[error("Plugin configuration error: {0}")]
    ConfigurationError(String),

    #[error("No known field: {0}")]
    UnknownField(String),

    #[error("Event buffer overflow: {size} bytes exceeds capacity of {capacity} bytes")]
    BufferOverflow { size: usize, capacity: usize },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type PluginResult<T> = Result<T, PluginError>;

/// Static plugin information reported to the host
pub trait PluginInfo {
    /// Numeric plugin ID registered with the host
    fn id(&self) -> u32;

    /// Plugin name
    fn name(&self) -> &str;

    /// Plugin version
    fn version(&self) -> &str;

    /// Plugin description
    fn description(&self) -> &str {
        ""
    }

    /// Contact information for the plugin authors
    fn contact(&self) -> &str {
        ""
    }

    /// Host API version this plugin was written against
    fn required_api_version(&self) -> &str;

    /// Name of the event source produced or consumed
    fn event_source(&self) -> &str;
}

/// Base plugin trait - all plugins implement this
pub trait Plugin: PluginInfo + Send + Sync {
    /// JSON Schema describing the init configuration, if any
    fn init_schema(&self) -> Option<String> {
        None
    }

    /// Initialize the plugin with a raw configuration string
    fn init(&mut self, config: &str) -> PluginResult<()> {
        let _ = config;
        Ok(())
    }

    /// Release plugin-wide resources
    fn destroy(&mut self) {}
}

// =============================================================================
// SOURCE PLUGINS
// =============================================================================

/// Source plugin - opens instances that produce events
#[async_trait]
pub trait SourcePlugin: Plugin {
    /// Open a new event stream
    async fn open(&self, params: &str) -> PluginResult<Box<dyn SourceInstance>>;

    /// Human-readable representation of an event produced by this source
    fn event_to_string(&self, event: &EventReader<'_>) -> PluginResult<String>;
}

/// An opened event stream
///
/// Instances are single-owner: `next_batch` takes `&mut self`, so a host can
/// never run two batch fills against the same stream position concurrently.
#[async_trait]
pub trait SourceInstance: Send {
    /// Fill as many of the host-provided slots as possible.
    ///
    /// Returns the number of slots written. Written slots always form a
    /// prefix of `events`.
    async fn next_batch(&mut self, events: &mut EventWriters) -> PluginResult<usize>;

    /// Close the stream
    fn close(&mut self) {}
}

// =============================================================================
// EXTRACTOR PLUGINS
// =============================================================================

/// Extractor plugin - derives field values from previously produced events
///
/// Extraction must be re-derivable from the event bytes alone, so
/// implementations take `&self` and can be shared across threads.
pub trait ExtractorPlugin: Plugin {
    /// Fields this extractor supports
    fn fields(&self) -> Vec<FieldEntry>;

    /// Extract the requested field from an event and store it on the request
    fn extract(&self, req: &mut ExtractRequest, event: &EventReader<'_>) -> PluginResult<()>;
}
