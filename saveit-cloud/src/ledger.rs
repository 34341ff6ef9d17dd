//! The remote ledger seam.
//!
//! Extension services talk to the ledger over HTTP ([`crate::LedgerApiClient`]);
//! the sync page talks to it directly ([`LocalLedger`]). Both implement
//! [`RemoteLedger`], so services are constructed with an
//! `Arc<dyn RemoteLedger>` and never reach for a global handle.

use crate::error::{CloudError, CloudResult};
use async_trait::async_trait;
use saveit_storage::LedgerStore;
use saveit_types::{AccountId, AccountUsage, CommitOutcome, Item, RemoteId, RemoteItem};

/// Server-side store of items and per-account usage.
#[async_trait]
pub trait RemoteLedger: Send + Sync {
    /// Authoritative usage for an account.
    async fn get_usage(&self, account_id: &AccountId) -> CloudResult<AccountUsage>;

    /// Writes one item for an account and bumps its usage in the same step.
    /// With `cap` set, free accounts at the cap get `LimitReached`.
    async fn commit_item(
        &self,
        account_id: &AccountId,
        item: &Item,
        cap: Option<u64>,
    ) -> CloudResult<CommitOutcome>;

    /// Deletes an item. Returns false if it was already gone.
    async fn delete_item(&self, remote_id: &RemoteId) -> CloudResult<bool>;

    /// Returns the subset of `ids` that still exist.
    async fn existing_ids(&self, ids: &[RemoteId]) -> CloudResult<Vec<RemoteId>>;

    /// All items for an account, newest first.
    async fn list_items(&self, account_id: &AccountId) -> CloudResult<Vec<RemoteItem>>;
}

/// In-process ledger over a [`LedgerStore`].
///
/// Store calls run on the blocking pool; they are the suspension points a
/// network round-trip would otherwise be.
#[derive(Clone)]
pub struct LocalLedger {
    store: LedgerStore,
    dedup_local_ids: bool,
}

impl LocalLedger {
    pub fn new(store: LedgerStore, dedup_local_ids: bool) -> Self {
        Self {
            store,
            dedup_local_ids,
        }
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    async fn blocking<T, F>(&self, f: F) -> CloudResult<T>
    where
        T: Send + 'static,
        F: FnOnce(LedgerStore) -> saveit_storage::StorageResult<T> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(store))
            .await
            .map_err(|e| CloudError::Task(e.to_string()))?
            .map_err(CloudError::from)
    }
}

#[async_trait]
impl RemoteLedger for LocalLedger {
    async fn get_usage(&self, account_id: &AccountId) -> CloudResult<AccountUsage> {
        let account_id = account_id.clone();
        self.blocking(move |store| store.get_usage(&account_id)).await
    }

    async fn commit_item(
        &self,
        account_id: &AccountId,
        item: &Item,
        cap: Option<u64>,
    ) -> CloudResult<CommitOutcome> {
        let account_id = account_id.clone();
        let item = item.clone();
        let dedup = self.dedup_local_ids;
        self.blocking(move |store| store.commit_item(&account_id, &item, cap, dedup))
            .await
    }

    async fn delete_item(&self, remote_id: &RemoteId) -> CloudResult<bool> {
        let remote_id = remote_id.clone();
        self.blocking(move |store| store.delete_item(&remote_id)).await
    }

    async fn existing_ids(&self, ids: &[RemoteId]) -> CloudResult<Vec<RemoteId>> {
        let ids = ids.to_vec();
        self.blocking(move |store| store.existing_ids(&ids)).await
    }

    async fn list_items(&self, account_id: &AccountId) -> CloudResult<Vec<RemoteItem>> {
        let account_id = account_id.clone();
        self.blocking(move |store| store.list_items(&account_id)).await
    }
}
