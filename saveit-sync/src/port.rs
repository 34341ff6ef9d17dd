//! Untyped duplex message channel between contexts.
//!
//! Each hop of the bridge carries raw JSON values, as a browser message
//! port would. [`BridgeMessage`] is decoded at the ends; anything that does
//! not decode is skipped, since a page window receives unrelated messages too.

use crate::error::{SyncError, SyncResult};
use saveit_types::BridgeMessage;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

/// One end of a duplex channel.
pub struct Port {
    tx: mpsc::Sender<Value>,
    rx: mpsc::Receiver<Value>,
}

/// Creates two connected ports.
pub fn port_pair(capacity: usize) -> (Port, Port) {
    let (a_tx, b_rx) = mpsc::channel(capacity);
    let (b_tx, a_rx) = mpsc::channel(capacity);
    (
        Port { tx: a_tx, rx: a_rx },
        Port { tx: b_tx, rx: b_rx },
    )
}

impl Port {
    pub async fn post(&self, message: &BridgeMessage) -> SyncResult<()> {
        self.post_raw(message.to_value()?).await
    }

    pub async fn post_raw(&self, value: Value) -> SyncResult<()> {
        self.tx.send(value).await.map_err(|_| SyncError::ChannelClosed)
    }

    /// Next raw value, or `None` once the other end is gone.
    pub async fn recv_raw(&mut self) -> Option<Value> {
        self.rx.recv().await
    }

    /// Next decodable message, skipping anything else.
    pub async fn recv(&mut self) -> SyncResult<BridgeMessage> {
        loop {
            let value = self.recv_raw().await.ok_or(SyncError::ChannelClosed)?;
            match BridgeMessage::from_value(value) {
                Ok(message) => return Ok(message),
                Err(e) => debug!("skipping undecodable message: {e}"),
            }
        }
    }

    pub(crate) fn into_parts(self) -> (mpsc::Sender<Value>, mpsc::Receiver<Value>) {
        (self.tx, self.rx)
    }
}
