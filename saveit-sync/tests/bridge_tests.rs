use async_trait::async_trait;
use pretty_assertions::assert_eq;
use saveit_cloud::{CloudError, CloudResult, LocalLedger, RemoteLedger};
use saveit_storage::{LedgerStore, LocalStore};
use saveit_sync::{
    port_pair, BridgeConfig, BridgeState, EventSink, ExtensionEvent, LocalPageLauncher,
    PageSession, Port, SyncBridge, SyncError, SyncPageLauncher, SyncResult,
};
use saveit_types::{
    AccountId, AccountUsage, BridgeMessage, CommitOutcome, Item, NewItem, RemoteId, RemoteItem,
    SyncStatus,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const SYNC_URL: &str = "http://localhost:3000/sync";

// ── Harness ─────────────────────────────────────────────────────

struct Harness {
    store: LocalStore,
    ledger: LocalLedger,
    session: PageSession,
    bridge: Arc<SyncBridge>,
    events: EventSink,
}

fn harness_with(ledger_impl: Arc<dyn RemoteLedger>, ledger: LocalLedger, session: PageSession) -> Harness {
    let store = LocalStore::open_in_memory().unwrap();
    let launcher = LocalPageLauncher::new(ledger_impl, session.clone(), 10, 16);
    let events = EventSink::default();
    let bridge = SyncBridge::new(
        store.clone(),
        Arc::new(launcher),
        SYNC_URL,
        BridgeConfig::default(),
        events.clone(),
    );
    Harness {
        store,
        ledger,
        session,
        bridge: Arc::new(bridge),
        events,
    }
}

fn harness(dedup: bool, session: PageSession) -> Harness {
    let ledger = LocalLedger::new(LedgerStore::open_in_memory().unwrap(), dedup);
    harness_with(Arc::new(ledger.clone()), ledger, session)
}

fn acct() -> AccountId {
    AccountId::from("acct")
}

fn item(text: &str) -> Item {
    Item::new(NewItem::new(text, "https://example.com", Some("Example".into())))
}

fn capture_locally(store: &LocalStore, texts: &[&str]) -> Vec<Item> {
    texts
        .iter()
        .map(|text| {
            let it = item(text);
            store.prepend_item(it.clone()).unwrap();
            it
        })
        .collect()
}

async fn prefill_ledger(ledger: &LocalLedger, n: usize) {
    for i in 0..n {
        ledger
            .commit_item(&acct(), &item(&format!("old {i}")), Some(10))
            .await
            .unwrap();
    }
}

// ── Happy path ──────────────────────────────────────────────────

#[tokio::test]
async fn sync_writes_items_and_links_account() {
    let h = harness(true, PageSession::logged_in(acct()));
    capture_locally(&h.store, &["one", "two"]);
    let mut rx = h.events.subscribe();

    let report = h.bridge.sync().await.unwrap();
    assert_eq!(report.status, SyncStatus::Complete);
    assert_eq!(report.sent, 2);
    assert_eq!(report.synced.len(), 2);
    assert_eq!(report.attached, 2);
    assert_eq!(report.usage.lifetime_saved_count, 2);
    assert_eq!(report.status_message(), "Synced 2 items");

    let cache = h.store.usage_cache().unwrap();
    assert_eq!(cache.account_id, Some(acct()));
    assert_eq!(cache.lifetime_saved_count, 2);
    assert!(h.store.items().unwrap().iter().all(Item::is_synced));
    assert!(h.store.pending_batch().unwrap().is_none());
    assert_eq!(h.bridge.state(), BridgeState::Idle);

    assert_eq!(
        rx.recv().await.unwrap(),
        ExtensionEvent::SyncCompleted {
            synced: 2,
            status: SyncStatus::Complete
        }
    );
}

#[tokio::test]
async fn synced_item_is_retrievable_by_remote_id() {
    let h = harness(true, PageSession::logged_in(acct()));
    let local = capture_locally(&h.store, &["round trip"]).remove(0);

    h.bridge.sync().await.unwrap();

    let stored = h.store.get_item(&local.local_id).unwrap().unwrap();
    let remote_id = stored.remote_id.clone().unwrap();
    let remote = h.ledger.store().get_item(&remote_id).unwrap().unwrap();
    assert_eq!(remote.text, local.text);
    assert_eq!(remote.url, local.source_url);
    assert_eq!(remote.title, local.source_title);
    assert_eq!(remote.local_id, local.local_id);
    assert_eq!(remote.account_id, acct());
}

#[tokio::test]
async fn already_synced_items_are_not_resent() {
    let h = harness(true, PageSession::logged_in(acct()));
    capture_locally(&h.store, &["a"]);
    h.bridge.sync().await.unwrap();

    capture_locally(&h.store, &["b"]);
    let report = h.bridge.sync().await.unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(report.usage.lifetime_saved_count, 2);
}

#[tokio::test]
async fn empty_sync_still_refreshes_usage() {
    let h = harness(true, PageSession::logged_in(acct()));
    prefill_ledger(&h.ledger, 4).await;

    let report = h.bridge.sync().await.unwrap();
    assert_eq!(report.sent, 0);
    assert_eq!(report.status_message(), "Nothing to sync");
    assert_eq!(h.store.usage_cache().unwrap().lifetime_saved_count, 4);
}

// ── Free cap ────────────────────────────────────────────────────

#[tokio::test]
async fn batch_over_cap_writes_only_permitted_prefix() {
    let h = harness(true, PageSession::logged_in(acct()));
    prefill_ledger(&h.ledger, 9).await;
    capture_locally(&h.store, &["x", "y", "z"]);

    let report = h.bridge.sync().await.unwrap();
    assert_eq!(report.status, SyncStatus::UpgradeRequired);
    assert_eq!(report.synced.len(), 1);
    assert_eq!(report.not_synced(), 2);
    assert_eq!(report.usage.lifetime_saved_count, 10);

    let items = h.store.items().unwrap();
    assert_eq!(items.iter().filter(|i| i.is_synced()).count(), 1);
    assert_eq!(items.iter().filter(|i| !i.is_synced()).count(), 2);
    assert_eq!(h.ledger.get_usage(&acct()).await.unwrap().lifetime_saved_count, 10);

    let err = report.into_result(10).unwrap_err();
    assert!(matches!(err, SyncError::LimitReached { count: 10, cap: 10 }));
}

#[tokio::test]
async fn pro_account_syncs_past_cap() {
    let h = harness(true, PageSession::logged_in(acct()));
    h.ledger.store().set_pro(&acct(), true).unwrap();
    prefill_ledger(&h.ledger, 10).await;
    capture_locally(&h.store, &["p1", "p2"]);

    let report = h.bridge.sync().await.unwrap();
    assert_eq!(report.status, SyncStatus::Complete);
    assert_eq!(report.usage.lifetime_saved_count, 12);
    assert!(h.store.usage_cache().unwrap().is_pro);
}

// ── Idempotence ─────────────────────────────────────────────────

#[tokio::test]
async fn resending_without_dedup_creates_duplicate() {
    let h = harness(false, PageSession::logged_in(acct()));
    let original = capture_locally(&h.store, &["dup"]).remove(0);
    h.bridge.sync().await.unwrap();

    // Reply lost: the same unsynced item is sent again.
    h.bridge.sync_items(vec![original]).await.unwrap();

    assert_eq!(h.ledger.list_items(&acct()).await.unwrap().len(), 2);
    assert_eq!(h.ledger.get_usage(&acct()).await.unwrap().lifetime_saved_count, 2);
}

#[tokio::test]
async fn resending_with_dedup_returns_same_remote_id() {
    let h = harness(true, PageSession::logged_in(acct()));
    let original = capture_locally(&h.store, &["dup"]).remove(0);
    let first = h.bridge.sync().await.unwrap();

    let second = h.bridge.sync_items(vec![original.clone()]).await.unwrap();

    assert_eq!(
        first.synced.get(&original.local_id),
        second.synced.get(&original.local_id)
    );
    assert_eq!(h.ledger.list_items(&acct()).await.unwrap().len(), 1);
    assert_eq!(second.usage.lifetime_saved_count, 1);
}

#[tokio::test]
async fn retry_at_cap_still_links_already_written_item() {
    let h = harness(true, PageSession::logged_in(acct()));
    prefill_ledger(&h.ledger, 9).await;
    let written = capture_locally(&h.store, &["tenth"]).remove(0);

    // Written by an earlier sync whose reply never arrived.
    let outcome = h.ledger.commit_item(&acct(), &written, Some(10)).await.unwrap();
    let remote_id = outcome.remote_id().unwrap().clone();
    assert_eq!(outcome.usage().lifetime_saved_count, 10);

    let report = h.bridge.sync().await.unwrap();
    assert_eq!(report.status, SyncStatus::Complete);
    assert_eq!(report.synced.get(&written.local_id), Some(&remote_id));
    assert_eq!(report.usage.lifetime_saved_count, 10);
    assert_eq!(
        h.store.get_item(&written.local_id).unwrap().unwrap().remote_id,
        Some(remote_id)
    );
    assert_eq!(h.ledger.list_items(&acct()).await.unwrap().len(), 10);
}

#[tokio::test]
async fn retry_at_cap_links_duplicates_behind_refused_items() {
    let h = harness(true, PageSession::logged_in(acct()));
    prefill_ledger(&h.ledger, 9).await;
    let written = capture_locally(&h.store, &["tenth"]).remove(0);
    h.ledger.commit_item(&acct(), &written, Some(10)).await.unwrap();
    // Newer captures sit ahead of the written item in the batch.
    let fresh = capture_locally(&h.store, &["eleventh", "twelfth"]);

    let report = h.bridge.sync().await.unwrap();
    assert_eq!(report.status, SyncStatus::UpgradeRequired);
    assert_eq!(report.synced.len(), 1);
    assert!(report.synced.contains_key(&written.local_id));
    for item in &fresh {
        assert!(!h.store.get_item(&item.local_id).unwrap().unwrap().is_synced());
    }
    assert_eq!(h.ledger.get_usage(&acct()).await.unwrap().lifetime_saved_count, 10);
}

// ── Auth ────────────────────────────────────────────────────────

#[tokio::test]
async fn auth_required_holds_batch_until_login() {
    let h = harness(true, PageSession::new());
    capture_locally(&h.store, &["a", "b"]);
    let mut rx = h.events.subscribe();

    let err = h.bridge.sync().await.unwrap_err();
    assert!(matches!(err, SyncError::AuthRequired { pending: 2 }));
    assert_eq!(h.store.pending_batch().unwrap().map(|b| b.len()), Some(2));
    assert_eq!(rx.recv().await.unwrap(), ExtensionEvent::LoginRequired { pending: 2 });

    h.session.login(acct()).await;
    let report = h.bridge.resume_pending().await.unwrap().unwrap();
    assert_eq!(report.synced.len(), 2);
    assert!(h.store.pending_batch().unwrap().is_none());
    assert!(h.bridge.resume_pending().await.unwrap().is_none());
}

#[tokio::test]
async fn resume_skips_items_deleted_while_waiting() {
    let h = harness(true, PageSession::new());
    let items = capture_locally(&h.store, &["keep", "drop"]);
    h.bridge.sync().await.unwrap_err();

    h.store.remove_item(&items[1].local_id).unwrap();
    h.session.login(acct()).await;

    let report = h.bridge.resume_pending().await.unwrap().unwrap();
    assert_eq!(report.sent, 1);
    assert!(report.synced.contains_key(&items[0].local_id));
}

#[tokio::test]
async fn switching_accounts_relinks_extension() {
    let h = harness(true, PageSession::logged_in(acct()));
    capture_locally(&h.store, &["a"]);
    h.bridge.sync().await.unwrap();

    let other = AccountId::from("other");
    h.session.login(other.clone()).await;
    capture_locally(&h.store, &["b"]);
    let report = h.bridge.sync().await.unwrap();

    assert_eq!(report.usage.account_id, other);
    assert_eq!(h.store.linked_account().unwrap(), Some(other));
    assert_eq!(report.usage.lifetime_saved_count, 1);
}

// ── Failures ────────────────────────────────────────────────────

/// Wraps a ledger and fails commits after `allow` successes, or every
/// usage read when `offline`.
struct FlakyLedger {
    inner: LocalLedger,
    allow: usize,
    commits: AtomicUsize,
    offline: bool,
}

#[async_trait]
impl RemoteLedger for FlakyLedger {
    async fn get_usage(&self, account_id: &AccountId) -> CloudResult<AccountUsage> {
        if self.offline {
            return Err(CloudError::NetworkUnavailable("connection refused".into()));
        }
        self.inner.get_usage(account_id).await
    }

    async fn commit_item(
        &self,
        account_id: &AccountId,
        item: &Item,
        cap: Option<u64>,
    ) -> CloudResult<CommitOutcome> {
        if self.commits.fetch_add(1, Ordering::SeqCst) >= self.allow {
            return Err(CloudError::Api("500 Internal Server Error".into()));
        }
        self.inner.commit_item(account_id, item, cap).await
    }

    async fn delete_item(&self, remote_id: &RemoteId) -> CloudResult<bool> {
        self.inner.delete_item(remote_id).await
    }

    async fn existing_ids(&self, ids: &[RemoteId]) -> CloudResult<Vec<RemoteId>> {
        self.inner.existing_ids(ids).await
    }

    async fn list_items(&self, account_id: &AccountId) -> CloudResult<Vec<RemoteItem>> {
        self.inner.list_items(account_id).await
    }
}

fn flaky(allow: usize, offline: bool) -> Harness {
    let ledger = LocalLedger::new(LedgerStore::open_in_memory().unwrap(), true);
    let wrapped = FlakyLedger {
        inner: ledger.clone(),
        allow,
        commits: AtomicUsize::new(0),
        offline,
    };
    harness_with(Arc::new(wrapped), ledger, PageSession::logged_in(acct()))
}

#[tokio::test]
async fn write_failure_mid_batch_reports_partial() {
    let h = flaky(1, false);
    capture_locally(&h.store, &["a", "b", "c"]);

    let report = h.bridge.sync().await.unwrap();
    assert_eq!(report.status, SyncStatus::PartialFailure);
    assert_eq!(report.synced.len(), 1);
    assert!(report.error.as_deref().unwrap().contains("500"));
    assert_eq!(h.store.items().unwrap().iter().filter(|i| i.is_synced()).count(), 1);
    assert!(report.status_message().starts_with("Synced 1 items; 2 failed"));

    let err = report.into_result(10).unwrap_err();
    assert!(matches!(
        err,
        SyncError::PartialSyncFailure {
            written: 1,
            remaining: 2,
            ..
        }
    ));
}

#[tokio::test]
async fn unreachable_ledger_fails_without_writes() {
    let h = flaky(usize::MAX, true);
    capture_locally(&h.store, &["a"]);

    let err = h.bridge.sync().await.unwrap_err();
    assert!(matches!(err, SyncError::NetworkUnavailable(_)));
    assert!(err.is_transient());
    assert!(h.store.pending_batch().unwrap().is_none());
    assert!(!h.store.items().unwrap()[0].is_synced());
    assert!(h.store.linked_account().unwrap().is_none());
}

/// Opens a page that announces readiness and then goes away.
struct VanishingLauncher;

#[async_trait]
impl SyncPageLauncher for VanishingLauncher {
    async fn open(&self, _url: &str) -> SyncResult<Port> {
        let (extension_end, page_end) = port_pair(4);
        page_end
            .post(&BridgeMessage::SyncPageReady)
            .await?;
        Ok(extension_end)
    }
}

#[tokio::test]
async fn page_closing_mid_exchange_keeps_channel_error() {
    let store = LocalStore::open_in_memory().unwrap();
    capture_locally(&store, &["a"]);
    let events = EventSink::default();
    let mut rx = events.subscribe();
    let bridge = SyncBridge::new(
        store.clone(),
        Arc::new(VanishingLauncher),
        SYNC_URL,
        BridgeConfig::default(),
        events,
    );

    let err = bridge.sync().await.unwrap_err();
    assert!(matches!(err, SyncError::ChannelClosed));
    assert_eq!(bridge.state(), BridgeState::Idle);
    assert!(store.pending_batch().unwrap().is_none());
    assert!(rx.try_recv().is_err());
}

// ── Readiness and concurrency ───────────────────────────────────

/// Opens a page that never announces readiness.
#[derive(Default)]
struct SilentLauncher {
    held: Mutex<Vec<Port>>,
}

#[async_trait]
impl SyncPageLauncher for SilentLauncher {
    async fn open(&self, _url: &str) -> SyncResult<Port> {
        let (extension_end, page_end) = port_pair(4);
        self.held.lock().await.push(page_end);
        Ok(extension_end)
    }
}

fn silent_bridge(store: &LocalStore) -> Arc<SyncBridge> {
    Arc::new(SyncBridge::new(
        store.clone(),
        Arc::new(SilentLauncher::default()),
        SYNC_URL,
        BridgeConfig::default(),
        EventSink::default(),
    ))
}

#[tokio::test(start_paused = true)]
async fn page_that_never_becomes_ready_times_out() {
    let store = LocalStore::open_in_memory().unwrap();
    capture_locally(&store, &["a"]);
    let bridge = silent_bridge(&store);

    let err = bridge.sync().await.unwrap_err();
    assert!(matches!(err, SyncError::PageTimeout(d) if d == Duration::from_secs(10)));
    assert_eq!(bridge.state(), BridgeState::Idle);
    assert!(store.pending_batch().unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn concurrent_sync_is_rejected() {
    let store = LocalStore::open_in_memory().unwrap();
    capture_locally(&store, &["a"]);
    let bridge = silent_bridge(&store);
    let mut state = bridge.subscribe_state();

    let first = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move { bridge.sync().await }
    });
    state.wait_for(|s| *s != BridgeState::Idle).await.unwrap();

    let err = bridge.sync().await.unwrap_err();
    assert!(matches!(err, SyncError::SyncInProgress));

    assert!(matches!(first.await.unwrap(), Err(SyncError::PageTimeout(_))));
}

#[tokio::test]
async fn state_passes_through_every_phase() {
    let h = harness(true, PageSession::logged_in(acct()));
    capture_locally(&h.store, &["a"]);
    let mut state = h.bridge.subscribe_state();

    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while state.changed().await.is_ok() {
            let current = *state.borrow_and_update();
            seen.push(current);
            if current == BridgeState::Idle {
                break;
            }
        }
        seen
    });

    h.bridge.sync().await.unwrap();
    let seen = watcher.await.unwrap();
    assert_eq!(seen.first(), Some(&BridgeState::PageOpening));
    assert_eq!(seen.last(), Some(&BridgeState::Idle));
}
