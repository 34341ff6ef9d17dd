//! Error types for capture and sync.

use saveit_cloud::CloudError;
use saveit_storage::StorageError;
use std::time::Duration;
use thiserror::Error;

/// Result type for capture and sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while capturing or syncing items.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("selection is empty")]
    EmptySelection,

    #[error("lifetime limit reached: {count} of {cap} items saved, upgrade required")]
    LimitReached { count: u64, cap: u64 },

    #[error("no account linked")]
    NotLinked,

    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("login required on the sync page ({pending} items held)")]
    AuthRequired { pending: usize },

    #[error("sync stopped after {written} items ({remaining} not written): {reason}")]
    PartialSyncFailure {
        written: usize,
        remaining: usize,
        reason: String,
    },

    #[error("sync page not ready after {0:?}")]
    PageTimeout(Duration),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("channel closed")]
    ChannelClosed,

    #[error("a sync is already in progress")]
    SyncInProgress,

    #[error("ledger error: {0}")]
    Cloud(#[from] CloudError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// True if retrying the same operation later may succeed without user action.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NetworkUnavailable(_)
            | Self::PageTimeout(_)
            | Self::ChannelClosed
            | Self::SyncInProgress
            | Self::PartialSyncFailure { .. } => true,
            Self::Cloud(e) => e.is_unreachable(),
            _ => false,
        }
    }
}
