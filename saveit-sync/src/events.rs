use saveit_types::{LocalId, SyncStatus};
use tokio::sync::broadcast;

/// Events emitted by extension services for the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionEvent {
    /// An item was stored locally.
    Captured { local_id: LocalId },
    /// A capture was stored, but no account is linked yet.
    NotLinked,
    /// A capture was refused at the free cap.
    LimitReached { count: u64, cap: u64 },
    /// The sync page needs a login before the held batch can be written.
    LoginRequired { pending: usize },
    /// A sync finished and its results were applied locally.
    SyncCompleted { synced: usize, status: SyncStatus },
    /// Reconciliation dropped items that no longer exist remotely.
    ItemsPruned { removed: usize },
}

/// Broadcasts [`ExtensionEvent`]s. Emitting with no listeners is fine.
#[derive(Clone)]
pub struct EventSink {
    tx: broadcast::Sender<ExtensionEvent>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExtensionEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: ExtensionEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(64)
    }
}
