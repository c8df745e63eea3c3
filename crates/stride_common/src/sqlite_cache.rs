//! SQLite-backed local durable cache
//!
//! Schema:
//! - kv: key, value (JSON bytes), updated_at (unix seconds)
//!
//! A failed write flips the cache into memory-only mode for the rest of the
//! session; reads then consult the in-memory overlay before the database.

use crate::cache::LocalCache;
use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

pub struct SqliteCache {
    conn: Mutex<Connection>,
    /// Entries written while degraded; `None` marks a removal
    overlay: Mutex<HashMap<String, Option<Vec<u8>>>>,
    degraded: AtomicBool,
    path: Option<PathBuf>,
}

impl SqliteCache {
    /// Open (or create) the cache database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "Opened local cache");
        Self::with_connection(conn, Some(path.to_path_buf()))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, None)
    }

    fn with_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            overlay: Mutex::new(HashMap::new()),
            degraded: AtomicBool::new(false),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn overlay(&self) -> MutexGuard<'_, HashMap<String, Option<Vec<u8>>>> {
        self.overlay.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn degrade(&self, key: &str, value: Option<&[u8]>, error: rusqlite::Error) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            warn!(key, "Local cache write failed, continuing memory-only: {}", error);
        }
        self.overlay()
            .insert(key.to_string(), value.map(|v| v.to_vec()));
    }

    fn read_db(&self, key: &str) -> rusqlite::Result<Option<Vec<u8>>> {
        self.conn()
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
    }

    fn write_db(&self, key: &str, value: &[u8]) -> rusqlite::Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }

    fn delete_db(&self, key: &str) -> rusqlite::Result<()> {
        self.conn()
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl LocalCache for SqliteCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        if let Some(entry) = self.overlay().get(key) {
            return entry.clone();
        }

        match self.read_db(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, "Local cache read failed: {}", e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &[u8]) {
        if self.is_degraded() {
            self.overlay().insert(key.to_string(), Some(value.to_vec()));
            return;
        }
        if let Err(e) = self.write_db(key, value) {
            self.degrade(key, Some(value), e);
        }
    }

    fn remove(&self, key: &str) {
        if self.is_degraded() {
            self.overlay().insert(key.to_string(), None);
            return;
        }
        if let Err(e) = self.delete_db(key) {
            self.degrade(key, None, e);
        }
    }

    fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }
}
