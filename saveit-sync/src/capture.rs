//! Capture service: turns a selection into a locally stored item.
//!
//! Unlinked extensions always store. Linked free accounts are refused once
//! their lifetime count reaches the cap; the count only moves on sync, so
//! captures between syncs are not counted here.

use crate::badge::{Badge, BadgeText};
use crate::error::{SyncError, SyncResult};
use crate::events::{EventSink, ExtensionEvent};
use crate::usage::{UsageSource, UsageTracker};
use saveit_storage::LocalStore;
use saveit_types::{within_free_cap, Item, NewItem};
use tracing::info;

/// Result of a successful capture.
#[derive(Clone, Debug, PartialEq)]
pub struct Captured {
    pub item: Item,
    /// False means the item was stored with a not-linked advisory.
    pub linked: bool,
    /// Item count after the insert.
    pub item_count: usize,
    pub usage_source: UsageSource,
}

impl Captured {
    /// `NotLinked` when the item was stored without a linked account.
    #[must_use]
    pub fn advisory(&self) -> Option<SyncError> {
        (!self.linked).then_some(SyncError::NotLinked)
    }
}

#[derive(Clone)]
pub struct CaptureService {
    store: LocalStore,
    usage: UsageTracker,
    badge: Badge,
    events: EventSink,
}

impl CaptureService {
    pub fn new(store: LocalStore, usage: UsageTracker, badge: Badge, events: EventSink) -> Self {
        Self {
            store,
            usage,
            badge,
            events,
        }
    }

    /// Captures selected text from a page.
    pub async fn capture(&self, input: NewItem) -> SyncResult<Captured> {
        if input.text.trim().is_empty() {
            return Err(SyncError::EmptySelection);
        }

        let (cache, source) = self.usage.current().await?;
        let cap = self.usage.cap();
        if cache.is_linked() && !within_free_cap(cache.is_pro, cache.lifetime_saved_count, cap) {
            info!(
                "capture refused: {} of {cap} lifetime saves used",
                cache.lifetime_saved_count
            );
            self.badge.flash(BadgeText::Max);
            self.events.emit(ExtensionEvent::LimitReached {
                count: cache.lifetime_saved_count,
                cap,
            });
            return Err(SyncError::LimitReached {
                count: cache.lifetime_saved_count,
                cap,
            });
        }

        let item = Item::new(input);
        let item_count = self.store.prepend_item(item.clone())?;
        self.badge.flash(BadgeText::Ok);

        let linked = cache.is_linked();
        if !linked {
            self.events.emit(ExtensionEvent::NotLinked);
        }
        self.events.emit(ExtensionEvent::Captured {
            local_id: item.local_id.clone(),
        });
        info!("captured {} ({item_count} stored)", item.local_id);

        Ok(Captured {
            item,
            linked,
            item_count,
            usage_source: source,
        })
    }
}
