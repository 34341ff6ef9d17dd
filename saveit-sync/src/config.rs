use std::time::Duration;

/// Timing for the extension side of the sync bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// How long to wait for `SYNC_PAGE_READY` after opening the page.
    pub page_ready_timeout: Duration,
    /// How long to wait for the page's reply once data is sent. Covers the
    /// server writes and, if the page asks for it, nothing more: a login
    /// prompt ends the exchange with `SYNC_AUTH_REQUIRED`.
    pub reply_timeout: Duration,
    /// Badge text auto-clears after this long.
    pub badge_clear_after: Duration,
    /// Buffer size of each hop of the message channel.
    pub channel_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            page_ready_timeout: Duration::from_secs(10),
            reply_timeout: Duration::from_secs(60),
            badge_clear_after: Duration::from_secs(2),
            channel_capacity: 16,
        }
    }
}
