//! Extension side of the sync bridge.
//!
//! ```text
//! Idle → PageOpening → PageReady → Sending → ServerWriting → CompleteRelay → Idle
//! ```
//!
//! The batch is persisted before the page is opened. It is cleared once the
//! exchange ends, except when the page asks for a login: then it stays so
//! [`SyncBridge::resume_pending`] can send it after the user signs in.

use crate::config::BridgeConfig;
use crate::error::{SyncError, SyncResult};
use crate::events::{EventSink, ExtensionEvent};
use crate::launcher::SyncPageLauncher;
use crate::port::Port;
use saveit_storage::LocalStore;
use saveit_types::{AccountUsage, BridgeMessage, Item, LocalId, SyncStatus, SyncedItems, UsageCache};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// Where the bridge is in its exchange with the page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    PageOpening,
    PageReady,
    Sending,
    ServerWriting,
    CompleteRelay,
}

/// What a completed exchange produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncReport {
    /// Items sent to the page.
    pub sent: usize,
    pub synced: SyncedItems,
    /// Local items that received a remote id.
    pub attached: usize,
    pub usage: AccountUsage,
    pub status: SyncStatus,
    pub error: Option<String>,
}

impl SyncReport {
    /// Sent items the page did not confirm; they stay local-only.
    #[must_use]
    pub fn not_synced(&self) -> usize {
        self.sent.saturating_sub(self.synced.len())
    }

    /// Status line for the popup.
    #[must_use]
    pub fn status_message(&self) -> String {
        match self.status {
            SyncStatus::Complete if self.sent == 0 => "Nothing to sync".to_string(),
            SyncStatus::Complete => format!("Synced {} items", self.synced.len()),
            SyncStatus::UpgradeRequired => format!(
                "Synced {} items; {} held back by the free limit. Upgrade to sync the rest",
                self.synced.len(),
                self.not_synced()
            ),
            SyncStatus::PartialFailure => format!(
                "Synced {} items; {} failed{}",
                self.synced.len(),
                self.not_synced(),
                self.error.as_deref().map(|e| format!(": {e}")).unwrap_or_default()
            ),
        }
    }

    /// Turns a non-complete status into the matching error.
    pub fn into_result(self, cap: u64) -> SyncResult<Self> {
        match self.status {
            SyncStatus::Complete => Ok(self),
            SyncStatus::UpgradeRequired => Err(SyncError::LimitReached {
                count: self.usage.lifetime_saved_count,
                cap,
            }),
            SyncStatus::PartialFailure => Err(SyncError::PartialSyncFailure {
                written: self.synced.len(),
                remaining: self.not_synced(),
                reason: self.error.unwrap_or_default(),
            }),
        }
    }
}

pub struct SyncBridge {
    store: LocalStore,
    launcher: Arc<dyn SyncPageLauncher>,
    sync_page_url: String,
    config: BridgeConfig,
    events: EventSink,
    state: watch::Sender<BridgeState>,
    in_flight: Mutex<()>,
}

impl SyncBridge {
    pub fn new(
        store: LocalStore,
        launcher: Arc<dyn SyncPageLauncher>,
        sync_page_url: impl Into<String>,
        config: BridgeConfig,
        events: EventSink,
    ) -> Self {
        let (state, _rx) = watch::channel(BridgeState::Idle);
        Self {
            store,
            launcher,
            sync_page_url: sync_page_url.into(),
            config,
            events,
            state,
            in_flight: Mutex::new(()),
        }
    }

    pub fn state(&self) -> BridgeState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<BridgeState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: BridgeState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!("bridge {prev:?} -> {next:?}");
        }
    }

    /// Syncs every local item that has no remote id yet.
    pub async fn sync(&self) -> SyncResult<SyncReport> {
        let items = self.store.items()?;
        self.sync_items(items).await
    }

    /// Sends the batch held from an earlier login prompt, if any. Items
    /// deleted or synced since then are left out.
    pub async fn resume_pending(&self) -> SyncResult<Option<SyncReport>> {
        let Some(pending) = self.store.pending_batch()? else {
            return Ok(None);
        };
        let still_local: HashSet<LocalId> = self
            .store
            .items()?
            .into_iter()
            .filter(|item| !item.is_synced())
            .map(|item| item.local_id)
            .collect();
        let batch: Vec<Item> = pending
            .into_iter()
            .filter(|item| still_local.contains(&item.local_id))
            .collect();
        info!("resuming held sync of {} items", batch.len());
        self.sync_items(batch).await.map(Some)
    }

    /// Runs one exchange with the sync page for `items`. Already-synced
    /// items are filtered out. Fails with `SyncInProgress` if another
    /// exchange is running.
    pub async fn sync_items(&self, items: Vec<Item>) -> SyncResult<SyncReport> {
        let _guard = self.in_flight.try_lock().map_err(|_| SyncError::SyncInProgress)?;

        let batch: Vec<Item> = items.into_iter().filter(|item| !item.is_synced()).collect();
        self.store.set_pending_batch(&batch)?;

        let result = self.exchange(&batch).await;
        self.set_state(BridgeState::Idle);

        match &result {
            Err(SyncError::AuthRequired { pending }) => {
                info!("holding {pending} items until the page is logged in");
                self.events.emit(ExtensionEvent::LoginRequired { pending: *pending });
            }
            Err(e) => {
                warn!("sync failed: {e}");
                self.discard_pending_batch();
            }
            Ok(report) => {
                self.discard_pending_batch();
                self.events.emit(ExtensionEvent::SyncCompleted {
                    synced: report.synced.len(),
                    status: report.status,
                });
            }
        }
        result
    }

    /// Drops the held batch. A failure here is logged and never replaces the
    /// exchange result; a stale batch is filtered on the next resume.
    fn discard_pending_batch(&self) {
        if let Err(e) = self.store.clear_pending_batch() {
            warn!("could not clear held sync batch: {e}");
        }
    }

    async fn exchange(&self, batch: &[Item]) -> SyncResult<SyncReport> {
        self.set_state(BridgeState::PageOpening);
        let mut port = self.launcher.open(&self.sync_page_url).await?;
        self.await_ready(&mut port).await?;
        self.set_state(BridgeState::PageReady);

        self.set_state(BridgeState::Sending);
        port.post(&BridgeMessage::SyncData {
            items: batch.to_vec(),
        })
        .await?;
        self.set_state(BridgeState::ServerWriting);

        let reply = tokio::time::timeout(self.config.reply_timeout, Self::await_reply(&mut port))
            .await
            .map_err(|_| {
                SyncError::Protocol(format!(
                    "no reply from sync page within {:?}",
                    self.config.reply_timeout
                ))
            })??;

        match reply {
            BridgeMessage::SyncAuthRequired => Err(SyncError::AuthRequired {
                pending: batch.len(),
            }),
            BridgeMessage::SyncFailed { error } => Err(SyncError::NetworkUnavailable(error)),
            BridgeMessage::SyncComplete {
                synced_items,
                user_id,
                total_saved_count,
                is_pro,
                status,
                error,
            } => {
                self.set_state(BridgeState::CompleteRelay);
                let usage = AccountUsage {
                    account_id: user_id,
                    lifetime_saved_count: total_saved_count,
                    is_pro,
                };
                self.apply_complete(batch.len(), synced_items, usage, status, error)
            }
            other => Err(SyncError::Protocol(format!("unexpected {}", other.kind()))),
        }
    }

    async fn await_ready(&self, port: &mut Port) -> SyncResult<()> {
        tokio::time::timeout(self.config.page_ready_timeout, Self::next_ready(port))
            .await
            .map_err(|_| SyncError::PageTimeout(self.config.page_ready_timeout))?
    }

    async fn next_ready(port: &mut Port) -> SyncResult<()> {
        loop {
            match port.recv().await? {
                BridgeMessage::SyncPageReady => return Ok(()),
                other => debug!("ignoring {} before page ready", other.kind()),
            }
        }
    }

    async fn await_reply(port: &mut Port) -> SyncResult<BridgeMessage> {
        loop {
            let message = port.recv().await?;
            if matches!(message, BridgeMessage::SyncPageReady) {
                continue;
            }
            return Ok(message);
        }
    }

    fn apply_complete(
        &self,
        sent: usize,
        synced: SyncedItems,
        usage: AccountUsage,
        status: SyncStatus,
        error: Option<String>,
    ) -> SyncResult<SyncReport> {
        let attached = self.store.attach_remote_ids(&synced)?;
        self.store.set_usage_cache(&UsageCache::from(usage.clone()))?;
        info!(
            "sync complete for {}: {} of {sent} confirmed, {attached} attached, {} lifetime saves",
            usage.account_id,
            synced.len(),
            usage.lifetime_saved_count
        );
        Ok(SyncReport {
            sent,
            synced,
            attached,
            usage,
            status,
            error,
        })
    }
}
