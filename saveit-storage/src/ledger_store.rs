//! Server-side ledger: synced items plus per-account usage counters.
//!
//! Item writes go through [`LedgerStore::commit_item`], which checks the
//! free cap, inserts the item and bumps `lifetime_saved_count` inside one
//! transaction. Two devices syncing the same account cannot both slip past
//! the cap, and the counter always equals the number of items committed.

use crate::error::{StorageError, StorageResult};
use chrono::{DateTime, SecondsFormat, Utc};
use duckdb::{params, params_from_iter, Connection};
use saveit_types::{AccountId, AccountUsage, CommitOutcome, Item, LocalId, RemoteId, RemoteItem};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Ledger of synced items backed by DuckDB.
#[derive(Clone)]
pub struct LedgerStore {
    conn: Arc<Mutex<Connection>>,
}

impl LedgerStore {
    /// Opens or creates a ledger at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = crate::open_limited(path, "256MB", 2)?;
        initialize_ledger_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory ledger (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_ledger_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    // ── Usage ──

    /// Returns usage for an account. Unknown accounts report zero usage.
    pub fn get_usage(&self, account_id: &AccountId) -> StorageResult<AccountUsage> {
        let conn = self.lock()?;
        read_usage(&conn, account_id)
    }

    /// Sets the subscription tier flag, creating the account row if needed.
    pub fn set_pro(&self, account_id: &AccountId, is_pro: bool) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO accounts (account_id) VALUES (?)",
            params![account_id.as_str()],
        )?;
        conn.execute(
            "UPDATE accounts SET is_pro = ? WHERE account_id = ?",
            params![is_pro, account_id.as_str()],
        )?;
        Ok(())
    }

    // ── Items ──

    /// Commits one item for an account.
    ///
    /// With `cap` set, a free account at or above the cap gets
    /// [`CommitOutcome::LimitReached`] and nothing is written. With `dedup`
    /// set, an item whose local id was already committed for this account
    /// returns the existing remote id without counting again.
    pub fn commit_item(
        &self,
        account_id: &AccountId,
        item: &Item,
        cap: Option<u64>,
        dedup: bool,
    ) -> StorageResult<CommitOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO accounts (account_id) VALUES (?)",
            params![account_id.as_str()],
        )?;
        let usage = read_usage(&tx, account_id)?;

        if dedup {
            if let Some(existing) = find_by_local_id(&tx, account_id, &item.local_id)? {
                tx.commit()?;
                debug!("ledger: local id {} already committed as {existing}", item.local_id);
                return Ok(CommitOutcome::Duplicate {
                    remote_id: existing,
                    usage,
                });
            }
        }

        if let Some(cap) = cap {
            if usage.is_limited(cap) {
                tx.commit()?;
                return Ok(CommitOutcome::LimitReached { usage });
            }
        }

        let remote_id = RemoteId::generate();
        tx.execute(
            r#"
            INSERT INTO ledger_items (
                remote_id, account_id, local_id, text, url, title, created_at, synced_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                remote_id.as_str(),
                account_id.as_str(),
                item.local_id.as_str(),
                item.text,
                item.source_url,
                item.source_title.as_deref(),
                format_ts(&item.created_at),
                format_ts(&Utc::now()),
            ],
        )?;
        tx.execute(
            "UPDATE accounts SET lifetime_saved_count = lifetime_saved_count + 1 WHERE account_id = ?",
            params![account_id.as_str()],
        )?;
        tx.commit()?;

        Ok(CommitOutcome::Created {
            remote_id,
            usage: AccountUsage {
                lifetime_saved_count: usage.lifetime_saved_count + 1,
                ..usage
            },
        })
    }

    /// Deletes an item. Usage counters are left alone. Returns true if the
    /// item existed.
    pub fn delete_item(&self, remote_id: &RemoteId) -> StorageResult<bool> {
        let conn = self.lock()?;
        let n = conn.execute(
            "DELETE FROM ledger_items WHERE remote_id = ?",
            params![remote_id.as_str()],
        )?;
        Ok(n > 0)
    }

    pub fn get_item(&self, remote_id: &RemoteId) -> StorageResult<Option<RemoteItem>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            &format!("{SELECT_ITEM} WHERE remote_id = ?"),
            params![remote_id.as_str()],
            row_to_raw,
        );

        match result {
            Ok(raw) => Ok(Some(raw.into_item()?)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Items for an account, newest first.
    pub fn list_items(&self, account_id: &AccountId) -> StorageResult<Vec<RemoteItem>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_ITEM} WHERE account_id = ? ORDER BY created_at DESC, synced_at DESC"
        ))?;
        let rows = stmt
            .query_map(params![account_id.as_str()], row_to_raw)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawItem::into_item).collect()
    }

    /// Number of items currently held for an account.
    pub fn item_count(&self, account_id: &AccountId) -> StorageResult<u64> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM ledger_items WHERE account_id = ?",
            params![account_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    /// Returns the subset of `ids` that still exist.
    pub fn existing_ids(&self, ids: &[RemoteId]) -> StorageResult<Vec<RemoteId>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let placeholders = vec!["?"; ids.len()].join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT remote_id FROM ledger_items WHERE remote_id IN ({placeholders})"
        ))?;
        let found = stmt
            .query_map(params_from_iter(ids.iter().map(|id| id.as_str())), |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(found.into_iter().map(RemoteId::from).collect())
    }
}

const SELECT_ITEM: &str = "SELECT remote_id, account_id, local_id, text, url, title, created_at, synced_at FROM ledger_items";

struct RawItem {
    remote_id: String,
    account_id: String,
    local_id: String,
    text: String,
    url: String,
    title: Option<String>,
    created_at: String,
    synced_at: String,
}

impl RawItem {
    fn into_item(self) -> StorageResult<RemoteItem> {
        Ok(RemoteItem {
            remote_id: RemoteId::from(self.remote_id),
            account_id: AccountId::from(self.account_id),
            local_id: LocalId::from(self.local_id),
            text: self.text,
            url: self.url,
            title: self.title,
            created_at: parse_ts(&self.created_at)?,
            synced_at: parse_ts(&self.synced_at)?,
        })
    }
}

fn row_to_raw(row: &duckdb::Row<'_>) -> duckdb::Result<RawItem> {
    Ok(RawItem {
        remote_id: row.get(0)?,
        account_id: row.get(1)?,
        local_id: row.get(2)?,
        text: row.get(3)?,
        url: row.get(4)?,
        title: row.get(5)?,
        created_at: row.get(6)?,
        synced_at: row.get(7)?,
    })
}

fn read_usage(conn: &Connection, account_id: &AccountId) -> StorageResult<AccountUsage> {
    let result = conn.query_row(
        "SELECT lifetime_saved_count, is_pro FROM accounts WHERE account_id = ?",
        params![account_id.as_str()],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, bool>(1)?)),
    );

    match result {
        Ok((count, is_pro)) => Ok(AccountUsage {
            account_id: account_id.clone(),
            lifetime_saved_count: count.max(0) as u64,
            is_pro,
        }),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(AccountUsage::fresh(account_id.clone())),
        Err(e) => Err(e.into()),
    }
}

fn find_by_local_id(
    conn: &Connection,
    account_id: &AccountId,
    local_id: &LocalId,
) -> StorageResult<Option<RemoteId>> {
    let result = conn.query_row(
        "SELECT remote_id FROM ledger_items WHERE account_id = ? AND local_id = ? LIMIT 1",
        params![account_id.as_str(), local_id.as_str()],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(id) => Ok(Some(RemoteId::from(id))),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// Fixed-width UTC so lexical order matches chronological order.
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> StorageResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

fn initialize_ledger_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            account_id VARCHAR PRIMARY KEY,
            lifetime_saved_count BIGINT NOT NULL DEFAULT 0,
            is_pro BOOLEAN NOT NULL DEFAULT FALSE
        );

        CREATE TABLE IF NOT EXISTS ledger_items (
            remote_id VARCHAR PRIMARY KEY,
            account_id VARCHAR NOT NULL,
            local_id VARCHAR NOT NULL,
            text TEXT NOT NULL,
            url TEXT NOT NULL,
            title TEXT,
            created_at VARCHAR NOT NULL,
            synced_at VARCHAR NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_ledger_items_account ON ledger_items(account_id);
        CREATE INDEX IF NOT EXISTS idx_ledger_items_local ON ledger_items(account_id, local_id);
        "#,
    )?;
    Ok(())
}
