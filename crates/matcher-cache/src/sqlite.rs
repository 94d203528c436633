//! SQLite-file store, shared by every process pointing at the same file.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use matcher_core::traits::CacheStore;
use matcher_core::{Error, Result};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn unavailable(e: rusqlite::Error) -> Error { Error::CacheUnavailable(e.to_string()) }

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(unavailable)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;").map_err(unavailable)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> { Self::init(Connection::open_in_memory().map_err(unavailable)?) }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                expires_at INTEGER NOT NULL
            );",
        )
        .map_err(unavailable)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::CacheUnavailable("sqlite store lock poisoned".into()))
    }
}

impl CacheStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Utc::now().timestamp_millis();
        self.conn()?
            .query_row(
                "SELECT value FROM cache_entries WHERE key = ?1 AND expires_at > ?2",
                params![key, now],
                |row| row.get(0),
            )
            .optional()
            .map_err(unavailable)
    }

    fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = Utc::now().timestamp_millis().saturating_add(ttl_ms);
        self.conn()?
            .execute(
                "INSERT INTO cache_entries (key, value, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
                params![key, value, expires_at],
            )
            .map_err(unavailable)?;
        Ok(())
    }

    fn invalidate(&self, key: &str) -> Result<()> {
        self.conn()?.execute("DELETE FROM cache_entries WHERE key = ?1", params![key]).map_err(unavailable)?;
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let now = Utc::now().timestamp_millis();
        let found: Option<i64> = self
            .conn()?
            .query_row(
                "SELECT 1 FROM cache_entries WHERE key = ?1 AND expires_at > ?2",
                params![key, now],
                |row| row.get(0),
            )
            .optional()
            .map_err(unavailable)?;
        Ok(found.is_some())
    }
}
