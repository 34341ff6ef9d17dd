//! Deletion from the popup.
//!
//! The local copy goes first and always; the remote delete is best-effort.
//! A failed remote delete leaves an orphan in the ledger, which the
//! dashboard still shows.

use crate::error::SyncResult;
use saveit_cloud::RemoteLedger;
use saveit_storage::LocalStore;
use saveit_types::{Item, LocalId};
use std::sync::Arc;
use tracing::{debug, warn};

/// What happened to the remote copy of a deleted item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteDeletion {
    /// Item was never synced.
    NotSynced,
    Deleted,
    /// The ledger had no such item.
    AlreadyGone,
    /// The ledger delete failed; the remote copy may remain.
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PopupDeletion {
    pub item: Item,
    pub remote: RemoteDeletion,
}

#[derive(Clone)]
pub struct DeletionService {
    store: LocalStore,
    ledger: Arc<dyn RemoteLedger>,
}

impl DeletionService {
    pub fn new(store: LocalStore, ledger: Arc<dyn RemoteLedger>) -> Self {
        Self { store, ledger }
    }

    /// Deletes an item by local id. Returns `None` if no such item exists.
    pub async fn delete_from_popup(&self, local_id: &LocalId) -> SyncResult<Option<PopupDeletion>> {
        let Some(item) = self.store.remove_item(local_id)? else {
            return Ok(None);
        };

        let remote = match &item.remote_id {
            None => RemoteDeletion::NotSynced,
            Some(remote_id) => match self.ledger.delete_item(remote_id).await {
                Ok(true) => RemoteDeletion::Deleted,
                Ok(false) => {
                    debug!("{remote_id} was already gone from the ledger");
                    RemoteDeletion::AlreadyGone
                }
                Err(e) => {
                    warn!("remote delete of {remote_id} failed, local copy removed: {e}");
                    RemoteDeletion::Failed(e.to_string())
                }
            },
        };

        Ok(Some(PopupDeletion { item, remote }))
    }
}
