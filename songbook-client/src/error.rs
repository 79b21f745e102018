//! Error types for songbook-client

use songbook_common::RecordError;
use thiserror::Error;

/// Failures talking to the songs API
///
/// The resilience service treats every variant as "remote unavailable".
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network failure or timeout
    #[error("Transport error: {0}")]
    Transport(String),

    /// Song id did not resolve server-side (404)
    #[error("Song not found: {0}")]
    NotFound(String),

    /// Server rejected the submitted fields (400)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Non-2xx status, malformed body, or envelope `success: false`
    #[error("Remote operation failed: {0}")]
    OperationFailed(String),
}

impl RemoteError {
    /// True for network-level failures (no usable response)
    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Transport(_))
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Transport(format!("Request timed out: {}", err))
        } else {
            RemoteError::Transport(err.to_string())
        }
    }
}

impl From<RecordError> for RemoteError {
    fn from(err: RecordError) -> Self {
        RemoteError::OperationFailed(err.to_string())
    }
}

/// Local key-value storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored value exists but cannot be decoded
    #[error("Local storage corrupt: {0}")]
    Corrupt(String),
}

/// Errors surfaced by [`crate::SongService`]
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Local persistence failed while degraded
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// Remote client could not be constructed
    #[error(transparent)]
    Remote(#[from] RemoteError),
}
