//! DuckDB storage layer for SaveIt.
//!
//! Two stores live here:
//!
//! - [`LocalStore`]: the extension's key-value store (`savedItems`, `userId`,
//!   `totalSavedCount`, `isPro`, `pendingSync`). Values are JSON documents.
//! - [`LedgerStore`]: the server-side ledger of synced items and per-account
//!   usage counters. It is the source of truth for the lifetime cap.

mod error;
mod ledger_store;
mod local_store;

pub use error::{StorageError, StorageResult};
pub use ledger_store::LedgerStore;
pub use local_store::{keys, LocalStore};

use std::path::Path;

/// Opens a file-backed DuckDB database capped at `memory_limit` and
/// `threads` worker threads.
pub(crate) fn open_limited(
    path: &Path,
    memory_limit: &str,
    threads: u32,
) -> StorageResult<duckdb::Connection> {
    let conn = duckdb::Connection::open(path)?;
    conn.execute_batch(&format!(
        "SET memory_limit = '{memory_limit}'; SET threads = {threads};"
    ))?;
    Ok(conn)
}
