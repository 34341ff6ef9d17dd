//! Ledger and plan configuration.

use crate::error::{CloudError, CloudResult};
use saveit_types::FREE_LIFETIME_CAP;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration shared by the extension and sync page.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Base URL for the dashboard API (e.g., "https://saveit.example").
    pub api_base_url: String,

    /// Trusted page the sync bridge opens to write items.
    pub sync_page_url: String,

    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,

    /// Lifetime items a free account may sync.
    pub free_lifetime_cap: u64,

    /// Max remote ids per existence check.
    pub existence_check_batch: usize,

    /// Whether the ledger treats `(account, local_id)` as a dedup key.
    pub dedup_local_ids: bool,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".to_string(),
            sync_page_url: "http://localhost:3000/sync".to_string(),
            request_timeout_secs: 30,
            free_lifetime_cap: FREE_LIFETIME_CAP,
            existence_check_batch: 10,
            dedup_local_ids: true,
        }
    }
}

impl CloudConfig {
    /// Loads a JSON config file. Absent fields keep their defaults.
    pub fn load(path: &Path) -> CloudResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CloudError::Config(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CloudResult<()> {
        if self.api_base_url.is_empty() {
            return Err(CloudError::Config("missing api_base_url".into()));
        }
        if self.sync_page_url.is_empty() {
            return Err(CloudError::Config("missing sync_page_url".into()));
        }
        if self.existence_check_batch == 0 {
            return Err(CloudError::Config("existence_check_batch must be positive".into()));
        }
        Ok(())
    }
}
