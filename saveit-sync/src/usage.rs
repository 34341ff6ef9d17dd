//! Usage lookups for the extension.
//!
//! The ledger is authoritative; the local cache is a read-through copy used
//! when the ledger cannot be reached.

use crate::error::SyncResult;
use saveit_cloud::RemoteLedger;
use saveit_storage::LocalStore;
use saveit_types::UsageCache;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a usage reading came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UsageSource {
    /// Fresh from the ledger; the cache was updated.
    Ledger,
    /// Ledger unreachable; cached counters used.
    Cache,
    /// No account linked; nothing to look up.
    Unlinked,
}

/// Plan and usage summary shown in the popup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanUsage {
    /// Items currently held in the local store.
    pub current_items: usize,
    pub lifetime_saved_count: u64,
    pub cap: u64,
    pub is_pro: bool,
    pub linked: bool,
    pub source: UsageSource,
}

impl PlanUsage {
    /// True if a free, linked account has used up its lifetime allowance.
    #[must_use]
    pub fn is_limited(&self) -> bool {
        self.linked && !self.is_pro && self.lifetime_saved_count >= self.cap
    }

    /// Percentage of the free allowance used, capped at 100. Pro accounts read 0.
    #[must_use]
    pub fn percent_used(&self) -> u8 {
        if self.is_pro || self.cap == 0 {
            return 0;
        }
        let pct = self.lifetime_saved_count.saturating_mul(100) / self.cap;
        pct.min(100) as u8
    }

    /// Short hint line for the popup footer.
    #[must_use]
    pub fn hint(&self) -> String {
        if !self.linked {
            "Sync to link your account".to_string()
        } else if self.is_pro {
            "Pro plan: unlimited saves".to_string()
        } else if self.is_limited() {
            format!(
                "Free limit reached ({}/{}). Upgrade to keep saving",
                self.lifetime_saved_count, self.cap
            )
        } else {
            format!("{}/{} free saves used", self.lifetime_saved_count, self.cap)
        }
    }
}

/// Reads usage through the local cache.
#[derive(Clone)]
pub struct UsageTracker {
    store: LocalStore,
    ledger: Arc<dyn RemoteLedger>,
    cap: u64,
}

impl UsageTracker {
    pub fn new(store: LocalStore, ledger: Arc<dyn RemoteLedger>, cap: u64) -> Self {
        Self { store, ledger, cap }
    }

    pub fn cap(&self) -> u64 {
        self.cap
    }

    /// Current usage for the linked account.
    ///
    /// On success the cached counters are overwritten with the ledger's
    /// values. Any ledger failure falls back to the cache unchanged.
    pub async fn current(&self) -> SyncResult<(UsageCache, UsageSource)> {
        let mut cache = self.store.usage_cache()?;
        let Some(account_id) = cache.account_id.clone() else {
            return Ok((cache, UsageSource::Unlinked));
        };

        match self.ledger.get_usage(&account_id).await {
            Ok(usage) => {
                cache.refresh_from(&usage);
                self.store.set_usage_cache(&cache)?;
                debug!(
                    "usage for {account_id}: {} saved, pro={}",
                    cache.lifetime_saved_count, cache.is_pro
                );
                Ok((cache, UsageSource::Ledger))
            }
            Err(e) => {
                warn!("usage lookup for {account_id} failed, using cached counters: {e}");
                Ok((cache, UsageSource::Cache))
            }
        }
    }

    /// Refreshes usage and combines it with the local item count.
    pub async fn plan_usage(&self) -> SyncResult<PlanUsage> {
        let (cache, source) = self.current().await?;
        Ok(PlanUsage {
            current_items: self.store.item_count()?,
            lifetime_saved_count: cache.lifetime_saved_count,
            cap: self.cap,
            is_pro: cache.is_pro,
            linked: cache.is_linked(),
            source,
        })
    }
}
