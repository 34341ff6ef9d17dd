//! The extension, assembled from its services.

use crate::badge::Badge;
use crate::bridge::{BridgeState, SyncBridge, SyncReport};
use crate::capture::{CaptureService, Captured};
use crate::config::BridgeConfig;
use crate::delete::{DeletionService, PopupDeletion};
use crate::error::SyncResult;
use crate::events::{EventSink, ExtensionEvent};
use crate::launcher::SyncPageLauncher;
use crate::reconcile::Reconciler;
use crate::usage::{PlanUsage, UsageTracker};
use saveit_cloud::{CloudConfig, RemoteLedger};
use saveit_storage::LocalStore;
use saveit_types::{Item, LocalId, NewItem};
use std::sync::Arc;
use tokio::sync::broadcast;

/// What the popup shows when opened.
#[derive(Clone, Debug, PartialEq)]
pub struct PopupSnapshot {
    /// Local items after reconciliation, most recent first.
    pub items: Vec<Item>,
    pub usage: PlanUsage,
    /// Items dropped by this reconciliation pass.
    pub pruned: usize,
}

pub struct Extension {
    store: LocalStore,
    badge: Badge,
    events: EventSink,
    usage: UsageTracker,
    capture: CaptureService,
    bridge: SyncBridge,
    reconciler: Reconciler,
    deletion: DeletionService,
}

impl Extension {
    pub fn new(
        store: LocalStore,
        ledger: Arc<dyn RemoteLedger>,
        launcher: Arc<dyn SyncPageLauncher>,
        cloud: &CloudConfig,
        bridge: BridgeConfig,
    ) -> Self {
        let events = EventSink::default();
        let badge = Badge::new(bridge.badge_clear_after);
        let usage = UsageTracker::new(store.clone(), Arc::clone(&ledger), cloud.free_lifetime_cap);
        let capture = CaptureService::new(store.clone(), usage.clone(), badge.clone(), events.clone());
        let sync_bridge = SyncBridge::new(
            store.clone(),
            launcher,
            cloud.sync_page_url.clone(),
            bridge,
            events.clone(),
        );
        let reconciler = Reconciler::new(Arc::clone(&ledger), cloud.existence_check_batch);
        let deletion = DeletionService::new(store.clone(), ledger);

        Self {
            store,
            badge,
            events,
            usage,
            capture,
            bridge: sync_bridge,
            reconciler,
            deletion,
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn badge(&self) -> &Badge {
        &self.badge
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExtensionEvent> {
        self.events.subscribe()
    }

    pub fn bridge_state(&self) -> BridgeState {
        self.bridge.state()
    }

    pub async fn capture(&self, input: NewItem) -> SyncResult<Captured> {
        self.capture.capture(input).await
    }

    pub async fn sync(&self) -> SyncResult<SyncReport> {
        self.bridge.sync().await
    }

    pub async fn resume_pending(&self) -> SyncResult<Option<SyncReport>> {
        self.bridge.resume_pending().await
    }

    pub async fn delete(&self, local_id: &LocalId) -> SyncResult<Option<PopupDeletion>> {
        self.deletion.delete_from_popup(local_id).await
    }

    /// Reconciles against the ledger, refreshes usage, and returns what the
    /// popup should render.
    pub async fn open_popup(&self) -> SyncResult<PopupSnapshot> {
        let pruned = self.reconciler.reconcile_store(&self.store).await?;
        if pruned > 0 {
            self.events.emit(ExtensionEvent::ItemsPruned { removed: pruned });
        }
        let usage = self.usage.plan_usage().await?;
        Ok(PopupSnapshot {
            items: self.store.items()?,
            usage,
            pruned,
        })
    }
}
