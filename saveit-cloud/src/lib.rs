//! Remote ledger access for SaveIt.
//!
//! Provides:
//! - The [`RemoteLedger`] trait every extension/page service depends on
//! - An HTTP client for the dashboard's ledger API
//! - An in-process ledger over [`saveit_storage::LedgerStore`]

pub mod api_client;
pub mod config;
pub mod error;
pub mod ledger;

pub use api_client::LedgerApiClient;
pub use config::CloudConfig;
pub use error::{CloudError, CloudResult};
pub use ledger::{LocalLedger, RemoteLedger};
