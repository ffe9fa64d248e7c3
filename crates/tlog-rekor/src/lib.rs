//! TLog Rekor - Rekor transparency log source and signer field extractor
//!
//! This crate tails a Rekor transparency log and turns each new entry into a
//! host event, then derives fields from stored events on demand:
//!
//! - **Cursor**: Monotonic position into the log, starting at the tree size
//! - **Batcher**: Fills host event slots, retrying stalled indices in place
//! - **Decoder**: Unwraps entry body, public key PEM and X.509 certificate
//! - **Extractor**: Answers `tlog.email` and `tlog.uuid` queries
//! - **Plugin**: Binds the above to the host lifecycle traits

pub mod batcher;
pub mod client;
pub mod config;
pub mod cursor;
pub mod decoder;
pub mod error;
pub mod extractor;
pub mod memory;
pub mod plugin;
pub mod types;

// Re-exports for convenience
pub use batcher::{BatchStats, EventBatcher};
pub use client::{LogClient, RekorClient};
pub use config::{RekorConfig, DEFAULT_REKOR_SERVER, FETCH_TIMEOUT};
pub use cursor::LogCursor;
pub use decoder::{DecodedCertificateFacts, EntryDecoder};
pub use error::{BatchError, DecodeError, ExtractError, RekorError, RekorResult};
pub use extractor::{field_catalog, Field, FieldExtractor};
pub use memory::MemoryLog;
pub use plugin::{RekorInstance, RekorPlugin};
pub use types::{LogEntry, LogEntryAnon, LogInfo};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
