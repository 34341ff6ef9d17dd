//! Opening the sync page.

use crate::error::SyncResult;
use crate::page::{PageSession, SyncPage};
use crate::port::{port_pair, Port};
use crate::relay::ContentRelay;
use async_trait::async_trait;
use saveit_cloud::RemoteLedger;
use std::sync::Arc;
use tracing::debug;

/// Opens the sync page and hands back the extension's end of the channel.
///
/// The returned port is connected once the page has loaded; readiness of
/// the page's own scripts is signalled separately by `SYNC_PAGE_READY`.
#[async_trait]
pub trait SyncPageLauncher: Send + Sync {
    async fn open(&self, url: &str) -> SyncResult<Port>;
}

/// Runs the content relay and the sync page as in-process tasks.
pub struct LocalPageLauncher {
    ledger: Arc<dyn RemoteLedger>,
    session: PageSession,
    cap: u64,
    capacity: usize,
}

impl LocalPageLauncher {
    pub fn new(ledger: Arc<dyn RemoteLedger>, session: PageSession, cap: u64, capacity: usize) -> Self {
        Self {
            ledger,
            session,
            cap,
            capacity,
        }
    }

    pub fn session(&self) -> &PageSession {
        &self.session
    }
}

#[async_trait]
impl SyncPageLauncher for LocalPageLauncher {
    async fn open(&self, url: &str) -> SyncResult<Port> {
        debug!("opening sync page at {url}");
        let (extension_end, relay_extension) = port_pair(self.capacity);
        let (relay_page, page_end) = port_pair(self.capacity);

        ContentRelay::spawn(relay_extension, relay_page);
        let page = SyncPage::new(Arc::clone(&self.ledger), self.session.clone(), self.cap);
        tokio::spawn(page.run(page_end));

        Ok(extension_end)
    }
}
