//! Extension-scoped key-value store.
//!
//! Mirrors the extension storage area: a flat map of keys to JSON values.
//! Typed helpers cover the keys SaveIt uses; each read-modify-write helper
//! holds the connection lock for its whole sequence, so a single store
//! handle never interleaves two item-list updates.

use crate::error::{StorageError, StorageResult};
use duckdb::{params, Connection};
use saveit_types::{AccountId, Item, LocalId, SyncedItems, UsageCache};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Key names in the persisted layout.
pub mod keys {
    pub const SAVED_ITEMS: &str = "savedItems";
    pub const USER_ID: &str = "userId";
    pub const TOTAL_SAVED_COUNT: &str = "totalSavedCount";
    pub const IS_PRO: &str = "isPro";
    /// Batch suspended while the sync page waits for a login.
    pub const PENDING_SYNC: &str = "pendingSync";
}

/// Persistent key-value store backed by DuckDB.
#[derive(Clone)]
pub struct LocalStore {
    conn: Arc<Mutex<Connection>>,
}

impl LocalStore {
    /// Opens or creates a local store at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = crate::open_limited(path, "64MB", 1)?;
        initialize_kv_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory local store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_kv_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    // ── Raw key-value access ──

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        let conn = self.lock()?;
        read_key(&conn, key)
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        let conn = self.lock()?;
        write_key(&conn, key, value)
    }

    /// Removes a key. Returns true if it existed.
    pub fn remove(&self, key: &str) -> StorageResult<bool> {
        let conn = self.lock()?;
        remove_key(&conn, key)
    }

    // ── Items ──

    /// All items, most recent first.
    pub fn items(&self) -> StorageResult<Vec<Item>> {
        Ok(self.get(keys::SAVED_ITEMS)?.unwrap_or_default())
    }

    pub fn set_items(&self, items: &[Item]) -> StorageResult<()> {
        self.set(keys::SAVED_ITEMS, items)
    }

    pub fn item_count(&self) -> StorageResult<usize> {
        Ok(self.items()?.len())
    }

    pub fn get_item(&self, local_id: &LocalId) -> StorageResult<Option<Item>> {
        Ok(self
            .items()?
            .into_iter()
            .find(|item| &item.local_id == local_id))
    }

    /// Inserts an item at the head of the list. Returns the new item count.
    pub fn prepend_item(&self, item: Item) -> StorageResult<usize> {
        let conn = self.lock()?;
        let mut items: Vec<Item> = read_key(&conn, keys::SAVED_ITEMS)?.unwrap_or_default();
        items.insert(0, item);
        write_key(&conn, keys::SAVED_ITEMS, &items)?;
        Ok(items.len())
    }

    /// Removes an item by local id, returning it if present.
    pub fn remove_item(&self, local_id: &LocalId) -> StorageResult<Option<Item>> {
        let conn = self.lock()?;
        let mut items: Vec<Item> = read_key(&conn, keys::SAVED_ITEMS)?.unwrap_or_default();
        let Some(pos) = items.iter().position(|item| &item.local_id == local_id) else {
            return Ok(None);
        };
        let removed = items.remove(pos);
        write_key(&conn, keys::SAVED_ITEMS, &items)?;
        Ok(Some(removed))
    }

    /// Removes every item whose local id is listed. Returns how many went.
    pub fn remove_items(&self, local_ids: &[LocalId]) -> StorageResult<usize> {
        if local_ids.is_empty() {
            return Ok(0);
        }
        let conn = self.lock()?;
        let mut items: Vec<Item> = read_key(&conn, keys::SAVED_ITEMS)?.unwrap_or_default();
        let before = items.len();
        items.retain(|item| !local_ids.contains(&item.local_id));
        let removed = before - items.len();
        if removed > 0 {
            write_key(&conn, keys::SAVED_ITEMS, &items)?;
        }
        Ok(removed)
    }

    /// Attaches remote ids from a sync result. Items that already carry a
    /// remote id, or that were deleted while the sync was in flight, are
    /// skipped. Returns the number of items updated.
    pub fn attach_remote_ids(&self, synced: &SyncedItems) -> StorageResult<usize> {
        if synced.is_empty() {
            return Ok(0);
        }
        let conn = self.lock()?;
        let mut items: Vec<Item> = read_key(&conn, keys::SAVED_ITEMS)?.unwrap_or_default();
        let mut updated = 0;
        for item in &mut items {
            if let Some(remote_id) = synced.get(&item.local_id) {
                if item.attach_remote_id(remote_id.clone()) {
                    updated += 1;
                }
            }
        }
        if updated > 0 {
            write_key(&conn, keys::SAVED_ITEMS, &items)?;
        }
        Ok(updated)
    }

    // ── Usage cache ──

    pub fn usage_cache(&self) -> StorageResult<UsageCache> {
        let conn = self.lock()?;
        Ok(UsageCache {
            account_id: read_key::<AccountId>(&conn, keys::USER_ID)?,
            lifetime_saved_count: read_key(&conn, keys::TOTAL_SAVED_COUNT)?.unwrap_or(0),
            is_pro: read_key(&conn, keys::IS_PRO)?.unwrap_or(false),
        })
    }

    /// Overwrites the cached usage, including the account linkage.
    pub fn set_usage_cache(&self, cache: &UsageCache) -> StorageResult<()> {
        let conn = self.lock()?;
        match &cache.account_id {
            Some(id) => write_key(&conn, keys::USER_ID, id)?,
            None => {
                remove_key(&conn, keys::USER_ID)?;
            }
        }
        write_key(&conn, keys::TOTAL_SAVED_COUNT, &cache.lifetime_saved_count)?;
        write_key(&conn, keys::IS_PRO, &cache.is_pro)?;
        Ok(())
    }

    pub fn linked_account(&self) -> StorageResult<Option<AccountId>> {
        self.get(keys::USER_ID)
    }

    // ── Pending sync batch ──

    pub fn pending_batch(&self) -> StorageResult<Option<Vec<Item>>> {
        self.get(keys::PENDING_SYNC)
    }

    pub fn set_pending_batch(&self, items: &[Item]) -> StorageResult<()> {
        self.set(keys::PENDING_SYNC, items)
    }

    pub fn clear_pending_batch(&self) -> StorageResult<()> {
        self.remove(keys::PENDING_SYNC).map(|_| ())
    }
}

fn read_key<T: DeserializeOwned>(conn: &Connection, key: &str) -> StorageResult<Option<T>> {
    let result = conn.query_row(
        "SELECT value_json FROM kv WHERE key = ?",
        params![key],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_key<T: Serialize + ?Sized>(conn: &Connection, key: &str, value: &T) -> StorageResult<()> {
    let json = serde_json::to_string(value)?;
    conn.execute(
        "INSERT OR REPLACE INTO kv (key, value_json) VALUES (?, ?)",
        params![key, json],
    )?;
    Ok(())
}

fn remove_key(conn: &Connection, key: &str) -> StorageResult<bool> {
    let n = conn.execute("DELETE FROM kv WHERE key = ?", params![key])?;
    Ok(n > 0)
}

fn initialize_kv_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS kv (
            key VARCHAR PRIMARY KEY,
            value_json TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}
