//! Shared types for SaveIt.
//!
//! Everything that crosses a crate or context boundary lives here:
//! - Identifiers (`LocalId`, `RemoteId`, `AccountId`)
//! - Captured `Item`s as persisted in the extension's local store
//! - Usage records (authoritative and cached) and ledger commit outcomes
//! - Messages exchanged over the extension ⇄ page channel

mod ids;
mod item;
mod ledger;
mod message;
mod usage;

pub use ids::{AccountId, LocalId, RemoteId};
pub use item::{Item, NewItem};
pub use ledger::{CommitOutcome, RemoteItem};
pub use message::{BridgeMessage, SyncStatus, SyncedItems};
pub use usage::{AccountUsage, UsageCache};

/// Lifetime number of items a free account may sync.
pub const FREE_LIFETIME_CAP: u64 = 10;

/// Returns true if an account at `count` lifetime saves may write one more item.
#[must_use]
pub fn within_free_cap(is_pro: bool, count: u64, cap: u64) -> bool {
    is_pro || count < cap
}
