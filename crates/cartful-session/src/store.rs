use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use futures::future::BoxFuture;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use cartful_core::error::{CartfulError, Result};
use cartful_core::traits::ContextStore;

/// SQLite-backed ephemeral key-value store with per-entry expiry.
///
/// Carries partial results across conversation turns, keyed by session
/// key. Expired entries are treated as absent on read and reaped lazily;
/// `purge_expired` exists for a periodic sweep.
pub struct SqliteContextStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS context (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        expires_at INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_context_expiry ON context(expires_at);";

impl SqliteContextStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CartfulError::Database(format!("Failed to create db directory: {}", e))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| CartfulError::Database(e.to_string()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| CartfulError::Database(e.to_string()))?;

        conn.execute_batch(SCHEMA)
            .map_err(|e| CartfulError::Database(e.to_string()))?;

        debug!(path = %path.display(), "Context store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| CartfulError::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| CartfulError::Database(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Delete every entry whose expiry has passed. Returns the number of
    /// entries removed.
    pub fn purge_expired(&self) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CartfulError::Database(e.to_string()))?;
        let removed = conn
            .execute(
                "DELETE FROM context WHERE expires_at <= ?1",
                params![Utc::now().timestamp()],
            )
            .map_err(|e| CartfulError::Database(e.to_string()))?;
        if removed > 0 {
            debug!(removed, "Purged expired context entries");
        }
        Ok(removed)
    }

    fn put_at(&self, key: &str, value: &str, now: i64, ttl_secs: i64) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CartfulError::Database(e.to_string()))?;
        conn.execute(
            "INSERT INTO context (key, value, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at",
            params![key, value, now, now + ttl_secs],
        )
        .map_err(|e| CartfulError::Database(e.to_string()))?;
        Ok(())
    }

    fn get_at(&self, key: &str, now: i64) -> Result<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CartfulError::Database(e.to_string()))?;
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT value, expires_at FROM context WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| CartfulError::Database(e.to_string()))?;

        match row {
            Some((_, expires_at)) if expires_at <= now => {
                // Lazy reap: an expired entry reads as absent.
                conn.execute("DELETE FROM context WHERE key = ?1", params![key])
                    .map_err(|e| CartfulError::Database(e.to_string()))?;
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value)),
            None => Ok(None),
        }
    }

    fn delete_key(&self, key: &str) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CartfulError::Database(e.to_string()))?;
        conn.execute("DELETE FROM context WHERE key = ?1", params![key])
            .map_err(|e| CartfulError::Database(e.to_string()))?;
        Ok(())
    }
}

impl ContextStore for SqliteContextStore {
    fn put(&self, key: &str, value: &str, ttl_secs: i64) -> BoxFuture<'_, Result<()>> {
        let key = key.to_string();
        let value = value.to_string();
        Box::pin(async move { self.put_at(&key, &value, Utc::now().timestamp(), ttl_secs) })
    }

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<String>>> {
        let key = key.to_string();
        Box::pin(async move { self.get_at(&key, Utc::now().timestamp()) })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, Result<()>> {
        let key = key.to_string();
        Box::pin(async move { self.delete_key(&key) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let store = SqliteContextStore::in_memory().unwrap();

        store.put("conv1", "options text", 1800).await.unwrap();
        assert_eq!(
            store.get("conv1").await.unwrap().as_deref(),
            Some("options text")
        );
    }

    #[tokio::test]
    async fn test_get_is_idempotent() {
        let store = SqliteContextStore::in_memory().unwrap();
        store.put("conv1", "pending choice", 1800).await.unwrap();

        let first = store.get("conv1").await.unwrap();
        let second = store.get("conv1").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store = SqliteContextStore::in_memory().unwrap();
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = SqliteContextStore::in_memory().unwrap();
        store.put("conv1", "old", 1800).await.unwrap();
        store.put("conv1", "new", 1800).await.unwrap();
        assert_eq!(store.get("conv1").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = SqliteContextStore::in_memory().unwrap();
        store.put("conv1", "value", 1800).await.unwrap();
        store.delete("conv1").await.unwrap();
        assert!(store.get("conv1").await.unwrap().is_none());

        // Deleting a missing key is fine.
        store.delete("conv1").await.unwrap();
    }

    #[test]
    fn test_expired_entry_reads_as_absent() {
        let store = SqliteContextStore::in_memory().unwrap();
        let now = 1_700_000_000;

        store.put_at("conv1", "options text", now, 1800).unwrap();
        assert_eq!(
            store.get_at("conv1", now + 1).unwrap().as_deref(),
            Some("options text")
        );
        assert!(store.get_at("conv1", now + 1800).unwrap().is_none());
        // The lazy reap removed the row, so an earlier clock also misses.
        assert!(store.get_at("conv1", now + 1).unwrap().is_none());
    }

    #[test]
    fn test_purge_expired_sweeps_only_stale_rows() {
        let store = SqliteContextStore::in_memory().unwrap();
        let past = Utc::now().timestamp() - 3600;

        store.put_at("stale", "old", past, 60).unwrap();
        store.put_at("fresh", "new", Utc::now().timestamp(), 1800).unwrap();

        assert_eq!(store.purge_expired().unwrap(), 1);
        assert!(store.get_at("fresh", Utc::now().timestamp()).unwrap().is_some());
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("context.db");
        let store = SqliteContextStore::open(&path).unwrap();
        store.put_at("k", "v", Utc::now().timestamp(), 60).unwrap();
        assert!(path.exists());
    }
}
