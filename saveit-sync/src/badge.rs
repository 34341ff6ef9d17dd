//! Toolbar badge feedback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Text shown on the extension's toolbar badge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BadgeText {
    #[default]
    Clear,
    /// Capture succeeded.
    Ok,
    /// Capture refused at the free cap.
    Max,
}

impl BadgeText {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "",
            Self::Ok => "OK",
            Self::Max => "MAX",
        }
    }
}

/// Badge that shows a status briefly, then clears itself.
///
/// A later flash supersedes the pending clear of an earlier one.
#[derive(Clone)]
pub struct Badge {
    tx: Arc<watch::Sender<BadgeText>>,
    generation: Arc<AtomicU64>,
    clear_after: Duration,
}

impl Badge {
    pub fn new(clear_after: Duration) -> Self {
        let (tx, _rx) = watch::channel(BadgeText::Clear);
        Self {
            tx: Arc::new(tx),
            generation: Arc::new(AtomicU64::new(0)),
            clear_after,
        }
    }

    pub fn current(&self) -> BadgeText {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<BadgeText> {
        self.tx.subscribe()
    }

    /// Shows `text` and schedules the clear. Must be called within a Tokio runtime.
    pub fn flash(&self, text: BadgeText) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.tx.send_replace(text);

        let tx = Arc::clone(&self.tx);
        let current = Arc::clone(&self.generation);
        let clear_after = self.clear_after;
        tokio::spawn(async move {
            tokio::time::sleep(clear_after).await;
            if current.load(Ordering::SeqCst) == generation {
                tx.send_replace(BadgeText::Clear);
            }
        });
    }
}
