use crate::ids::{AccountId, LocalId, RemoteId};
use crate::item::Item;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from local id to the remote id the ledger assigned.
pub type SyncedItems = BTreeMap<LocalId, RemoteId>;

/// Outcome of the page-side batch write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Every item in the batch was written.
    Complete,
    /// The free cap stopped the batch; the caller should prompt an upgrade.
    UpgradeRequired,
    /// A ledger write failed after a prefix of the batch was committed.
    PartialFailure,
}

/// Messages carried over the untyped extension ⇄ page channel.
///
/// The channel itself transports `serde_json::Value`; these are decoded at
/// each end. The `type` tag values match what the sync page listens for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeMessage {
    /// Page → extension: scripts initialized, ready to receive data.
    SyncPageReady,
    /// Extension → page: the batch to write.
    SyncData { items: Vec<Item> },
    /// Page → extension: no active session on the page.
    SyncAuthRequired,
    /// Page → extension: nothing could be written.
    SyncFailed { error: String },
    /// Page → extension: batch finished (fully or partially).
    #[serde(rename_all = "camelCase")]
    SyncComplete {
        synced_items: SyncedItems,
        user_id: AccountId,
        total_saved_count: u64,
        is_pro: bool,
        status: SyncStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl BridgeMessage {
    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// The wire `type` tag of this message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SyncPageReady => "SYNC_PAGE_READY",
            Self::SyncData { .. } => "SYNC_DATA",
            Self::SyncAuthRequired => "SYNC_AUTH_REQUIRED",
            Self::SyncFailed { .. } => "SYNC_FAILED",
            Self::SyncComplete { .. } => "SYNC_COMPLETE",
        }
    }
}
