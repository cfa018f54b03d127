//! Error types for the SEMLAB host abstraction.

use thiserror::Error;

/// Errors that can occur in the host abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The fetch was rejected by the host (offline, blocked, etc.)
    #[error("Fetch rejected: {0}")]
    FetchRejected(String),

    /// Reading the resource failed midway
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EnvError {
    /// Creates a not-found error.
    pub fn not_found(path: impl std::fmt::Display) -> Self {
        Self::NotFound(path.to_string())
    }

    /// Creates a rejected-fetch error.
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::FetchRejected(msg.into())
    }
}
