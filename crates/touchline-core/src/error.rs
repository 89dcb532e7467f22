//! Error types for Touchline.
//!
//! Errors are classified by where they come from (transport, upstream status,
//! payload decoding, cache backend, persistence) so the sync loop can decide
//! whether to log-and-continue or stop.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the Touchline library.
#[derive(Debug, Error)]
pub enum SyncError {
    // Upstream errors
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Upstream returned status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Failed to decode {what}: {message}")]
    Decode { what: String, message: String },

    // Cache errors
    #[error("Cache backend error: {message}")]
    CacheBackend {
        message: String,
        #[source]
        source: Option<redis::RedisError>,
    },

    // Durable storage errors
    #[error("Persistence error for {entity}: {message}")]
    Persistence { entity: String, message: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for Touchline operations.
pub type Result<T> = std::result::Result<T, SyncError>;

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        SyncError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<redis::RedisError> for SyncError {
    fn from(err: redis::RedisError) -> Self {
        SyncError::CacheBackend {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl SyncError {
    /// Create a decode error for a named payload.
    pub fn decode(what: impl Into<String>, err: impl std::fmt::Display) -> Self {
        SyncError::Decode {
            what: what.into(),
            message: err.to_string(),
        }
    }

    /// Create a persistence error for an entity.
    pub fn persistence(entity: impl Into<String>, err: impl std::fmt::Display) -> Self {
        SyncError::Persistence {
            entity: entity.into(),
            message: err.to_string(),
        }
    }

    /// Check if this error is likely to go away on a later attempt.
    ///
    /// Nothing here is retried inline; the scheduler retries on its next tick.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Transport { .. }
            | SyncError::Timeout(_)
            | SyncError::CacheBackend { .. }
            | SyncError::Persistence { .. }
            | SyncError::Database { .. } => true,
            SyncError::UpstreamStatus { status, .. } => {
                matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }

    /// Check if this error will not change without outside intervention.
    pub fn is_permanent(&self) -> bool {
        match self {
            SyncError::UpstreamStatus { status, .. } => matches!(status, 400 | 401 | 403 | 404),
            SyncError::Decode { .. } | SyncError::Config { .. } => true,
            _ => false,
        }
    }
}
