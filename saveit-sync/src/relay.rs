//! Content relay: the hop injected into the sync page.
//!
//! Forwards messages between the extension and the page window. Only known
//! shapes pass: `SYNC_DATA` with an item array going down, and the four
//! page replies going up. Everything else is dropped.

use crate::port::Port;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Counts kept by a relay over its lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub forwarded_down: usize,
    pub forwarded_up: usize,
    pub dropped: usize,
}

pub struct ContentRelay;

impl ContentRelay {
    /// Spawns a relay between the extension-facing and page-facing ports.
    /// It ends when either side closes.
    pub fn spawn(extension: Port, page: Port) -> JoinHandle<RelayStats> {
        tokio::spawn(Self::run(extension, page))
    }

    pub async fn run(extension: Port, page: Port) -> RelayStats {
        let (to_extension, mut from_extension) = extension.into_parts();
        let (to_page, mut from_page) = page.into_parts();
        let mut stats = RelayStats::default();

        loop {
            tokio::select! {
                value = from_extension.recv() => {
                    let Some(value) = value else { break };
                    if !is_downward(&value) {
                        warn!("relay dropped message from extension: {}", kind_of(&value));
                        stats.dropped += 1;
                        continue;
                    }
                    if to_page.send(value).await.is_err() {
                        break;
                    }
                    stats.forwarded_down += 1;
                }
                value = from_page.recv() => {
                    let Some(value) = value else { break };
                    if !is_upward(&value) {
                        debug!("relay ignored page message: {}", kind_of(&value));
                        stats.dropped += 1;
                        continue;
                    }
                    if to_extension.send(value).await.is_err() {
                        break;
                    }
                    stats.forwarded_up += 1;
                }
            }
        }

        debug!(
            "relay closed: {} down, {} up, {} dropped",
            stats.forwarded_down, stats.forwarded_up, stats.dropped
        );
        stats
    }
}

fn kind_of(value: &Value) -> &str {
    value.get("type").and_then(Value::as_str).unwrap_or("<untyped>")
}

/// Extension → page: only a data batch carrying an item array.
pub fn is_downward(value: &Value) -> bool {
    kind_of(value) == "SYNC_DATA" && value.get("items").is_some_and(Value::is_array)
}

/// Page → extension: readiness, auth prompt, failure, or a completion
/// carrying its id mapping.
pub fn is_upward(value: &Value) -> bool {
    match kind_of(value) {
        "SYNC_PAGE_READY" | "SYNC_AUTH_REQUIRED" => true,
        "SYNC_FAILED" => value.get("error").is_some_and(Value::is_string),
        "SYNC_COMPLETE" => value.get("syncedItems").is_some_and(Value::is_object),
        _ => false,
    }
}
