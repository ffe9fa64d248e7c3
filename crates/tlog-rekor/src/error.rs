//! Error types for tlog-rekor crate

use thiserror::Error;
use tlog_core::PluginError;

/// Errors talking to the transparency log service
#[derive(Debug, Error)]
pub enum RekorError {
    /// Network/HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The log has not grown to this index yet
    #[error("Log entry not found at index {index}")]
    NotFound { index: u64 },

    /// Rate limited by server
    #[error("Rate limited: retry after {0}s")]
    RateLimited(u64),

    /// Server error
    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },

    /// The request did not complete within its deadline
    #[error("Operation timed out")]
    Timeout,

    /// The server answered with a body we could not interpret
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid server URL or request parameters
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RekorError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            RekorError::Network(e) => !e.is_builder(),
            RekorError::NotFound { .. } | RekorError::RateLimited(_) | RekorError::Timeout => true,
            RekorError::Server { status, .. } => *status >= 500,
            RekorError::InvalidResponse(_) | RekorError::Config(_) => false,
        }
    }

    /// Create a server error from status and message
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        RekorError::Server {
            status,
            message: message.into(),
        }
    }
}

/// Result type for log service operations
pub type RekorResult<T> = Result<T, RekorError>;

/// Malformed entry material.
///
/// Absence of the nested public key is not represented here: it is a normal
/// decode outcome.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid entry envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("entry {uuid} body is not a string")]
    BodyNotString { uuid: String },

    #[error("entry {uuid} body is not valid base64: {source}")]
    BodyBase64 {
        uuid: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("entry {uuid} body is not valid JSON: {source}")]
    BodyJson {
        uuid: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("entry {uuid} public key content is not valid base64: {source}")]
    ContentBase64 {
        uuid: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("failed to parse certificate PEM for entry {uuid}: {message}")]
    NoPemBlock { uuid: String, message: String },

    #[error("failed to parse certificate for entry {uuid}: {message}")]
    CertificateParse { uuid: String, message: String },
}

/// Errors returned by field extraction
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("no known field: {0}")]
    UnknownField(String),
}

impl From<ExtractError> for PluginError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::UnknownField(field) => PluginError::UnknownField(field),
            ExtractError::Decode(e) => PluginError::OperationFailed(e.to_string()),
        }
    }
}

/// Fatal batch errors. Fetch failures never surface here.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to serialize log entry at index {index}: {source}")]
    Serialize {
        index: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write event for index {index}: {source}")]
    Write {
        index: u64,
        #[source]
        source: PluginError,
    },
}

impl From<BatchError> for PluginError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::Serialize { source, .. } => PluginError::SerializationError(source),
            BatchError::Write { source, .. } => source,
        }
    }
}

impl From<RekorError> for PluginError {
    fn from(err: RekorError) -> Self {
        PluginError::InitializationFailed(err.to_string())
    }
}
