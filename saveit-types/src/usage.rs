use crate::ids::AccountId;
use serde::{Deserialize, Serialize};

/// Authoritative per-account usage, owned by the remote ledger.
///
/// `lifetime_saved_count` only ever grows; deleting items does not lower it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUsage {
    #[serde(rename = "userId")]
    pub account_id: AccountId,
    #[serde(rename = "totalSavedCount", default)]
    pub lifetime_saved_count: u64,
    #[serde(default)]
    pub is_pro: bool,
}

impl AccountUsage {
    /// Usage for an account the ledger has never seen.
    pub fn fresh(account_id: AccountId) -> Self {
        Self {
            account_id,
            lifetime_saved_count: 0,
            is_pro: false,
        }
    }

    /// Number of additional items this account may write under `cap`.
    /// `None` means unlimited.
    #[must_use]
    pub fn remaining(&self, cap: u64) -> Option<u64> {
        if self.is_pro {
            None
        } else {
            Some(cap.saturating_sub(self.lifetime_saved_count))
        }
    }

    #[must_use]
    pub fn is_limited(&self, cap: u64) -> bool {
        !self.is_pro && self.lifetime_saved_count >= cap
    }
}

/// Extension-side read-through cache of [`AccountUsage`].
///
/// Values are advisory; `account_id` is absent until the first sync links
/// the extension to an account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCache {
    pub account_id: Option<AccountId>,
    pub lifetime_saved_count: u64,
    pub is_pro: bool,
}

impl UsageCache {
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.account_id.is_some()
    }

    /// Overwrites counters with authoritative values, keeping the linkage.
    pub fn refresh_from(&mut self, usage: &AccountUsage) {
        self.lifetime_saved_count = usage.lifetime_saved_count;
        self.is_pro = usage.is_pro;
    }
}

impl From<AccountUsage> for UsageCache {
    fn from(usage: AccountUsage) -> Self {
        Self {
            account_id: Some(usage.account_id),
            lifetime_saved_count: usage.lifetime_saved_count,
            is_pro: usage.is_pro,
        }
    }
}
