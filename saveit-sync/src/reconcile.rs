//! Reconciliation: drop local items whose remote copy was deleted.

use crate::error::{SyncError, SyncResult};
use saveit_cloud::RemoteLedger;
use saveit_storage::LocalStore;
use saveit_types::{Item, LocalId, RemoteId};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct Reconciler {
    ledger: Arc<dyn RemoteLedger>,
    batch_size: usize,
}

impl Reconciler {
    pub fn new(ledger: Arc<dyn RemoteLedger>, batch_size: usize) -> Self {
        Self {
            ledger,
            batch_size: batch_size.max(1),
        }
    }

    /// Returns the items that should stay: every unsynced item, plus
    /// synced items whose remote id still exists. Order is preserved.
    pub async fn reconcile(&self, items: Vec<Item>) -> SyncResult<Vec<Item>> {
        let remote_ids: Vec<RemoteId> = items
            .iter()
            .filter_map(|item| item.remote_id.clone())
            .collect();
        if remote_ids.is_empty() {
            return Ok(items);
        }

        let mut existing: HashSet<RemoteId> = HashSet::with_capacity(remote_ids.len());
        for chunk in remote_ids.chunks(self.batch_size) {
            existing.extend(self.ledger.existing_ids(chunk).await?);
        }
        debug!("{} of {} synced items still exist", existing.len(), remote_ids.len());

        Ok(items
            .into_iter()
            .filter(|item| item.remote_id.as_ref().is_none_or(|id| existing.contains(id)))
            .collect())
    }

    /// Reconciles the store in place and returns how many items were
    /// removed. If the ledger cannot be reached, nothing is removed.
    pub async fn reconcile_store(&self, store: &LocalStore) -> SyncResult<usize> {
        let items = store.items()?;
        let all: Vec<LocalId> = items.iter().map(|item| item.local_id.clone()).collect();

        let kept = match self.reconcile(items).await {
            Ok(kept) => kept,
            Err(SyncError::Cloud(e)) => {
                warn!("reconciliation skipped, keeping all items: {e}");
                return Ok(0);
            }
            Err(e) => return Err(e),
        };

        let kept: HashSet<LocalId> = kept.into_iter().map(|item| item.local_id).collect();
        let gone: Vec<LocalId> = all.into_iter().filter(|id| !kept.contains(id)).collect();
        let removed = store.remove_items(&gone)?;
        if removed > 0 {
            info!("reconciliation removed {removed} items deleted remotely");
        }
        Ok(removed)
    }
}
