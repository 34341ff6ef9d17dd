use crate::ids::{AccountId, LocalId, RemoteId};
use crate::usage::AccountUsage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An item as held by the remote ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteItem {
    #[serde(rename = "id")]
    pub remote_id: RemoteId,
    #[serde(rename = "userId")]
    pub account_id: AccountId,
    #[serde(rename = "localId")]
    pub local_id: LocalId,
    pub text: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    pub synced_at: DateTime<Utc>,
}

/// Result of committing one item to the ledger.
///
/// The item insert and the usage increment happen together, so `usage`
/// always reflects the committed state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommitOutcome {
    /// Item written; usage incremented by one.
    Created { remote_id: RemoteId, usage: AccountUsage },
    /// An item with the same local id was already written for this account.
    Duplicate { remote_id: RemoteId, usage: AccountUsage },
    /// Free cap reached; nothing written.
    LimitReached { usage: AccountUsage },
}

impl CommitOutcome {
    /// Remote id of the written (or previously written) item.
    #[must_use]
    pub fn remote_id(&self) -> Option<&RemoteId> {
        match self {
            Self::Created { remote_id, .. } | Self::Duplicate { remote_id, .. } => Some(remote_id),
            Self::LimitReached { .. } => None,
        }
    }

    #[must_use]
    pub fn usage(&self) -> &AccountUsage {
        match self {
            Self::Created { usage, .. }
            | Self::Duplicate { usage, .. }
            | Self::LimitReached { usage } => usage,
        }
    }
}
