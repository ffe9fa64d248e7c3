//! TLog Core - Host lifecycle traits and event buffers
//!
//! This crate provides the abstractions a host runtime uses to drive
//! event-source and field-extraction plugins:
//!
//! - **Plugins**: Trait definitions for the source and extractor lifecycles
//! - **Events**: Host-owned event buffers filled by sources and read by extractors
//! - **Fields**: Field catalog entries and extraction requests

pub mod events;
pub mod fields;
pub mod plugins;

// Re-export commonly used types
pub use events::{EventReader, EventWriter, EventWriters, DEFAULT_BATCH_SIZE, DEFAULT_EVENT_SIZE};
pub use fields::{ExtractRequest, FieldEntry, FieldType};
pub use plugins::{
    ExtractorPlugin, Plugin, PluginError, PluginInfo, PluginResult, SourceInstance, SourcePlugin,
};
