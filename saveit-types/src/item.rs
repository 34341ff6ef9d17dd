use crate::ids::{LocalId, RemoteId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A captured text selection.
///
/// Serialized as an entry of the `savedItems` list with the fields `id`,
/// `text`, `remoteId`, `url`, `title` and `timestamp`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "id")]
    pub local_id: LocalId,
    #[serde(rename = "remoteId", default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<RemoteId>,
    pub text: String,
    #[serde(rename = "url")]
    pub source_url: String,
    #[serde(rename = "title", default)]
    pub source_title: Option<String>,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Input for a capture: what the user selected and where.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewItem {
    pub text: String,
    pub source_url: String,
    pub source_title: Option<String>,
}

impl NewItem {
    pub fn new(
        text: impl Into<String>,
        source_url: impl Into<String>,
        source_title: Option<String>,
    ) -> Self {
        Self {
            text: text.into(),
            source_url: source_url.into(),
            source_title,
        }
    }
}

impl Item {
    /// Creates an unsynced item with a fresh local id.
    #[must_use]
    pub fn new(input: NewItem) -> Self {
        Self {
            local_id: LocalId::generate(),
            remote_id: None,
            text: input.text,
            source_url: input.source_url,
            source_title: input.source_title,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.remote_id.is_some()
    }

    /// Attaches the ledger-assigned id. A remote id is immutable once set,
    /// so this returns false and leaves the item untouched if one exists.
    pub fn attach_remote_id(&mut self, remote_id: RemoteId) -> bool {
        if self.remote_id.is_some() {
            return false;
        }
        self.remote_id = Some(remote_id);
        true
    }

    /// Title for display, falling back when the page had none.
    #[must_use]
    pub fn display_title(&self) -> &str {
        self.source_title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or("Untitled Page")
    }
}
