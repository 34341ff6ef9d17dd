//! Ledger access error types.

use thiserror::Error;

/// Result type for ledger operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors that can occur talking to the remote ledger.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("API request failed: {0}")]
    Api(String),

    #[error("ledger unreachable: {0}")]
    NetworkUnavailable(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage error: {0}")]
    Storage(#[from] saveit_storage::StorageError),

    #[error("ledger task failed: {0}")]
    Task(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CloudError {
    /// Returns true if the ledger could not be reached at all, as opposed to
    /// answering with an error. Callers fall back to cached values on these.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::NetworkUnavailable(_) => true,
            Self::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }

    pub(crate) fn from_send(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            Self::NetworkUnavailable(e.to_string())
        } else {
            Self::Http(e)
        }
    }
}
