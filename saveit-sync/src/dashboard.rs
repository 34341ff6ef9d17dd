//! Dashboard view over the ledger.
//!
//! Deleting here touches only the ledger. The extension notices on its next
//! reconciliation.

use crate::error::SyncResult;
use saveit_cloud::RemoteLedger;
use saveit_types::{AccountId, AccountUsage, RemoteId, RemoteItem};
use std::sync::Arc;
use tracing::info;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DashboardView {
    /// Matching items, newest first.
    pub items: Vec<RemoteItem>,
    /// Items before filtering.
    pub total_items: usize,
    pub usage: AccountUsage,
    pub upgrade_prompt: bool,
}

#[derive(Clone)]
pub struct Dashboard {
    ledger: Arc<dyn RemoteLedger>,
    cap: u64,
}

impl Dashboard {
    pub fn new(ledger: Arc<dyn RemoteLedger>, cap: u64) -> Self {
        Self { ledger, cap }
    }

    pub async fn view(&self, account_id: &AccountId, query: &str) -> SyncResult<DashboardView> {
        let items = self.ledger.list_items(account_id).await?;
        let usage = self.ledger.get_usage(account_id).await?;
        let total_items = items.len();
        let upgrade_prompt = !usage.is_pro && total_items as u64 >= self.cap;
        Ok(DashboardView {
            items: search(items, query),
            total_items,
            usage,
            upgrade_prompt,
        })
    }

    pub async fn delete(&self, remote_id: &RemoteId) -> SyncResult<bool> {
        let deleted = self.ledger.delete_item(remote_id).await?;
        if deleted {
            info!("dashboard deleted {remote_id}");
        }
        Ok(deleted)
    }
}

/// Case-insensitive match on text or source URL. An empty query keeps all.
pub fn search(items: Vec<RemoteItem>, query: &str) -> Vec<RemoteItem> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| {
            item.text.to_lowercase().contains(&query) || item.url.to_lowercase().contains(&query)
        })
        .collect()
}
