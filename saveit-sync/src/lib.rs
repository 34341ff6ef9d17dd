//! Capture and sync for SaveIt.
//!
//! Three contexts take part in a sync, each modelled as its own task:
//!
//! ```text
//! Extension (SyncBridge) ⇄ ContentRelay ⇄ SyncPage → RemoteLedger
//! ```
//!
//! The extension never writes to the ledger; only the logged-in sync page
//! does. The extension reads from it for usage, reconciliation and
//! best-effort deletes.

pub mod badge;
pub mod bridge;
pub mod capture;
pub mod config;
pub mod dashboard;
pub mod delete;
pub mod error;
pub mod events;
pub mod extension;
pub mod launcher;
pub mod page;
pub mod port;
pub mod reconcile;
pub mod relay;
pub mod usage;

pub use badge::{Badge, BadgeText};
pub use bridge::{BridgeState, SyncBridge, SyncReport};
pub use capture::{CaptureService, Captured};
pub use config::BridgeConfig;
pub use dashboard::{Dashboard, DashboardView};
pub use delete::{DeletionService, PopupDeletion, RemoteDeletion};
pub use error::{SyncError, SyncResult};
pub use events::{EventSink, ExtensionEvent};
pub use extension::{Extension, PopupSnapshot};
pub use launcher::{LocalPageLauncher, SyncPageLauncher};
pub use page::{BatchWrite, PageSession, SyncPage};
pub use port::{port_pair, Port};
pub use reconcile::Reconciler;
pub use relay::{ContentRelay, RelayStats};
pub use usage::{PlanUsage, UsageSource, UsageTracker};
