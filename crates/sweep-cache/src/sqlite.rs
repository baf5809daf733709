use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use sweep_models::cache_schema::KV_TABLE_DDL;

use crate::error::CacheError;
use crate::store::KeyValueStore;

/// SQLite-backed key-value store.
///
/// `rusqlite::Connection` is not `Sync`, so access is serialized through a `Mutex`.
/// Statements are single-row and short, so they run inline on the async task.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(KV_TABLE_DDL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database with the schema applied.
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(KV_TABLE_DDL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn
            .lock()
            .map_err(|e| CacheError::Unavailable(format!("SQLite mutex poisoned: {e}")))
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached("SELECT value_json FROM kv_entries WHERE key = ?1")?;
        let value = stmt
            .query_row(rusqlite::params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO kv_entries (key, value_json, updated_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(key) DO UPDATE SET \
             value_json = excluded.value_json, updated_at = excluded.updated_at",
            rusqlite::params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM kv_entries WHERE key = ?1", rusqlite::params![key])?;
        Ok(())
    }

    async fn remove_if_eq(&self, key: &str, expected: &str) -> Result<bool, CacheError> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM kv_entries WHERE key = ?1 AND value_json = ?2",
            rusqlite::params![key, expected],
        )?;
        Ok(removed > 0)
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let conn = self.lock()?;
        // substr instead of LIKE: keys may contain `_` or `%`.
        let removed = conn.execute(
            "DELETE FROM kv_entries WHERE substr(key, 1, length(?1)) = ?1",
            rusqlite::params![prefix],
        )?;
        Ok(removed)
    }
}
