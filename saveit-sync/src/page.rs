//! The sync page: the trusted, logged-in context that writes to the ledger.
//!
//! On start it announces readiness, then answers each `SYNC_DATA` batch
//! with exactly one reply. Usage is read once per batch to size the free
//! allowance; each item is then committed on its own, and the ledger
//! enforces the cap in the same step as the write.

use crate::port::Port;
use saveit_cloud::{CloudResult, RemoteLedger};
use saveit_types::{
    AccountId, AccountUsage, BridgeMessage, CommitOutcome, Item, SyncStatus, SyncedItems,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// The page's login session.
#[derive(Clone, Default)]
pub struct PageSession {
    account: Arc<RwLock<Option<AccountId>>>,
}

impl PageSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logged_in(account_id: AccountId) -> Self {
        Self {
            account: Arc::new(RwLock::new(Some(account_id))),
        }
    }

    pub async fn login(&self, account_id: AccountId) {
        info!("page session logged in as {account_id}");
        *self.account.write().await = Some(account_id);
    }

    pub async fn logout(&self) {
        *self.account.write().await = None;
    }

    pub async fn account(&self) -> Option<AccountId> {
        self.account.read().await.clone()
    }
}

/// Result of writing one batch to the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchWrite {
    pub synced: SyncedItems,
    /// Items newly created by this batch. Deduplicated retries are in
    /// `synced` but not counted here.
    pub written: usize,
    pub usage: AccountUsage,
    pub status: SyncStatus,
    pub error: Option<String>,
}

impl BatchWrite {
    fn into_message(self) -> BridgeMessage {
        BridgeMessage::SyncComplete {
            synced_items: self.synced,
            user_id: self.usage.account_id,
            total_saved_count: self.usage.lifetime_saved_count,
            is_pro: self.usage.is_pro,
            status: self.status,
            error: self.error,
        }
    }
}

pub struct SyncPage {
    ledger: Arc<dyn RemoteLedger>,
    session: PageSession,
    cap: u64,
}

impl SyncPage {
    pub fn new(ledger: Arc<dyn RemoteLedger>, session: PageSession, cap: u64) -> Self {
        Self {
            ledger,
            session,
            cap,
        }
    }

    /// Runs the page against its side of the channel until it closes.
    pub async fn run(self, mut port: Port) {
        if port.post(&BridgeMessage::SyncPageReady).await.is_err() {
            return;
        }
        debug!("sync page ready");

        while let Ok(message) = port.recv().await {
            let items = match message {
                BridgeMessage::SyncData { items } => items,
                other => {
                    debug!("sync page ignoring {}", other.kind());
                    continue;
                }
            };
            let reply = self.handle_batch(&items).await;
            if port.post(&reply).await.is_err() {
                break;
            }
        }
    }

    /// Produces the reply for one `SYNC_DATA` batch.
    pub async fn handle_batch(&self, items: &[Item]) -> BridgeMessage {
        let Some(account_id) = self.session.account().await else {
            info!("sync page has no session; asking for login");
            return BridgeMessage::SyncAuthRequired;
        };

        match self.write_batch(&account_id, items).await {
            Ok(batch) => {
                info!(
                    "sync page wrote {} of {} items for {account_id} ({:?})",
                    batch.written,
                    items.len(),
                    batch.status
                );
                batch.into_message()
            }
            Err(e) => {
                warn!("sync page could not read usage for {account_id}: {e}");
                BridgeMessage::SyncFailed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Writes the permitted prefix of `items` for an account.
    ///
    /// Items past the free allowance are still offered to the ledger: new
    /// ones come back `LimitReached` and stay local, while items an earlier
    /// sync already wrote come back `Duplicate` and get their remote id.
    ///
    /// Fails only if the initial usage read fails; a write error after that
    /// ends the batch with `PartialFailure` and whatever was committed.
    pub async fn write_batch(&self, account_id: &AccountId, items: &[Item]) -> CloudResult<BatchWrite> {
        let start = self.ledger.get_usage(account_id).await?;
        let allowance = start.remaining(self.cap);
        debug!(
            "batch of {} for {account_id}, allowance {allowance:?}",
            items.len()
        );
        let mut batch = BatchWrite {
            synced: SyncedItems::new(),
            written: 0,
            usage: start,
            status: SyncStatus::Complete,
            error: None,
        };

        for item in items {
            let past_prefix = allowance.is_some_and(|n| batch.written as u64 >= n);

            match self.ledger.commit_item(account_id, item, Some(self.cap)).await {
                Ok(CommitOutcome::Created { remote_id, usage }) => {
                    batch.synced.insert(item.local_id.clone(), remote_id);
                    batch.written += 1;
                    batch.usage = usage;
                }
                Ok(CommitOutcome::Duplicate { remote_id, usage }) => {
                    debug!("{} already in ledger as {remote_id}", item.local_id);
                    batch.synced.insert(item.local_id.clone(), remote_id);
                    batch.usage = usage;
                }
                Ok(CommitOutcome::LimitReached { usage }) => {
                    if !past_prefix {
                        debug!("allowance for {account_id} used up by another writer");
                    }
                    batch.usage = usage;
                    batch.status = SyncStatus::UpgradeRequired;
                }
                Err(e) => {
                    warn!("ledger write for {} failed: {e}", item.local_id);
                    batch.status = SyncStatus::PartialFailure;
                    batch.error = Some(e.to_string());
                    break;
                }
            }
        }

        Ok(batch)
    }
}
