//! Cache gateway
//!
//! Key/value cache behind a driver abstraction. Parsed frontmatter,
//! shortcode expansions, and the plugin boot record are stored here under
//! deterministic keys derived with [`cache_id`].
//!
//! Driver failures never propagate: a broken backend degrades to cache
//! misses (reads) and reported write failures, logged at warn level.
//! Concurrent writers to one key are not coordinated; last write wins.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use super::config::{CacheDriverKind, CacheSettings};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to open cache backend at {0}")]
    Open(PathBuf),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Derives a deterministic cache key from a namespaced input string.
///
/// Identical inputs map to identical keys; distinct namespaces cannot
/// collide because the namespace is part of the hashed material.
pub fn cache_id(namespace: &str, input: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(namespace.as_bytes());
    // NUL keeps the namespace boundary unambiguous under concatenation.
    hasher.update(&[0]);
    hasher.update(input.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// A cache backend.
///
/// Implementations swallow their own I/O errors: `get` answers `None`
/// and the write operations answer `false` when the backend misbehaves.
trait CacheDriver: Send {
    fn name(&self) -> &'static str;
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> bool;
    fn delete(&self, key: &str) -> bool;
    fn clear(&self) -> bool;
}

/// Cache gateway with a selectable backing driver.
pub struct CacheGateway {
    driver: Box<dyn CacheDriver>,
    default_ttl: Option<Duration>,
}

impl CacheGateway {
    /// Builds a gateway from settings.
    ///
    /// An explicitly configured driver wins. `auto` probes sqlite under
    /// `cache_dir` and falls back to memory. A disabled cache substitutes
    /// the null driver, so callers never special-case "disabled".
    pub fn from_settings(settings: &CacheSettings, cache_dir: &Path) -> Self {
        let default_ttl = settings.ttl.map(Duration::from_secs);

        if !settings.enabled {
            return Self {
                driver: Box::new(NullDriver),
                default_ttl,
            };
        }

        let driver: Box<dyn CacheDriver> = match settings.driver {
            CacheDriverKind::Memory => Box::new(MemoryDriver::new()),
            CacheDriverKind::Null => Box::new(NullDriver),
            CacheDriverKind::File => Box::new(FileDriver::new(cache_dir.join("data"))),
            CacheDriverKind::Sqlite => match SqliteDriver::open(cache_dir) {
                Ok(driver) => Box::new(driver),
                Err(e) => {
                    warn!("sqlite cache unavailable ({e}), falling back to memory");
                    Box::new(MemoryDriver::new())
                }
            },
            CacheDriverKind::Auto => match SqliteDriver::open(cache_dir) {
                Ok(driver) => Box::new(driver),
                Err(_) => Box::new(MemoryDriver::new()),
            },
        };

        Self {
            driver,
            default_ttl,
        }
    }

    /// An in-memory gateway, for tests and ad-hoc use.
    pub fn memory() -> Self {
        Self {
            driver: Box::new(MemoryDriver::new()),
            default_ttl: None,
        }
    }

    /// A gateway that never stores anything.
    pub fn null() -> Self {
        Self {
            driver: Box::new(NullDriver),
            default_ttl: None,
        }
    }

    /// Returns the active driver name.
    pub fn driver_name(&self) -> &'static str {
        self.driver.name()
    }

    pub fn has(&self, key: &str) -> bool {
        self.driver.get(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.driver.get(key)
    }

    /// Stores a value under the gateway's default time-to-live.
    pub fn set(&self, key: &str, value: Value) -> bool {
        self.driver.set(key, value, self.default_ttl)
    }

    /// Stores a value with an explicit time-to-live.
    pub fn set_ttl(&self, key: &str, value: Value, ttl: Duration) -> bool {
        self.driver.set(key, value, Some(ttl))
    }

    pub fn delete(&self, key: &str) -> bool {
        self.driver.delete(key)
    }

    pub fn clear(&self) -> bool {
        self.driver.clear()
    }
}

// ---------------------------------------------------------------------------
// Memory driver

struct MemoryEntry {
    value: Value,
    expires_at: Option<Instant>,
}

struct MemoryDriver {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryDriver {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl CacheDriver for MemoryDriver {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().ok()?;

        if let Some(entry) = entries.get(key) {
            if entry.expires_at.is_some_and(|at| Instant::now() >= at) {
                entries.remove(key);
                return None;
            }
        }

        entries.get(key).map(|e| e.value.clone())
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> bool {
        let Ok(mut entries) = self.entries.lock() else {
            return false;
        };

        entries.insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );

        true
    }

    fn delete(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|mut e| e.remove(key).is_some())
            .unwrap_or(false)
    }

    fn clear(&self) -> bool {
        self.entries
            .lock()
            .map(|mut e| {
                e.clear();
                true
            })
            .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Null driver

struct NullDriver;

impl CacheDriver for NullDriver {
    fn name(&self) -> &'static str {
        "null"
    }

    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn set(&self, _key: &str, _value: Value, _ttl: Option<Duration>) -> bool {
        true
    }

    fn delete(&self, _key: &str) -> bool {
        true
    }

    fn clear(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// File driver

/// Envelope persisted by the file driver.
#[derive(Serialize, Deserialize)]
struct FileEnvelope {
    value: Value,
    expires_at: Option<i64>,
}

/// One JSON file per entry under `root/<k[0..2]>/<hash>.json`.
struct FileDriver {
    root: PathBuf,
}

impl FileDriver {
    fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn file_path(&self, key: &str) -> PathBuf {
        let hash = blake3::hash(key.as_bytes()).to_hex().to_string();
        self.root.join(&hash[..2]).join(format!("{}.json", hash))
    }
}

impl CacheDriver for FileDriver {
    fn name(&self) -> &'static str {
        "file"
    }

    fn get(&self, key: &str) -> Option<Value> {
        let path = self.file_path(key);
        let content = fs::read_to_string(&path).ok()?;

        let envelope: FileEnvelope = match serde_json::from_str(&content) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("discarding corrupt cache file {}: {e}", path.display());
                let _ = fs::remove_file(&path);
                return None;
            }
        };

        if let Some(expires_at) = envelope.expires_at {
            if chrono::Utc::now().timestamp() >= expires_at {
                let _ = fs::remove_file(&path);
                return None;
            }
        }

        Some(envelope.value)
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> bool {
        let path = self.file_path(key);

        let envelope = FileEnvelope {
            value,
            expires_at: ttl.map(|ttl| chrono::Utc::now().timestamp() + ttl.as_secs() as i64),
        };

        let write = || -> Result<(), CacheError> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let content = serde_json::to_string(&envelope)
                .map_err(|e| CacheError::Io(std::io::Error::other(e)))?;
            fs::write(&path, content)?;
            Ok(())
        };

        match write() {
            Ok(()) => true,
            Err(e) => {
                warn!("cache write failed for {}: {e}", path.display());
                false
            }
        }
    }

    fn delete(&self, key: &str) -> bool {
        let path = self.file_path(key);

        if fs::remove_file(&path).is_err() {
            return false;
        }

        // Prune the containing directory once it empties out.
        if let Some(parent) = path.parent() {
            if fs::read_dir(parent).map(|mut d| d.next().is_none()).unwrap_or(false) {
                let _ = fs::remove_dir(parent);
            }
        }

        true
    }

    fn clear(&self) -> bool {
        if !self.root.exists() {
            return true;
        }

        match fs::remove_dir_all(&self.root) {
            Ok(()) => true,
            Err(e) => {
                warn!("cache clear failed for {}: {e}", self.root.display());
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SQLite driver

struct SqliteDriver {
    conn: Mutex<Connection>,
}

impl SqliteDriver {
    fn open(cache_dir: &Path) -> Result<Self, CacheError> {
        fs::create_dir_all(cache_dir).map_err(|_| CacheError::Open(cache_dir.to_path_buf()))?;

        let db_path = cache_dir.join("cache.db");
        let conn = Connection::open(&db_path)?;

        // WAL for cooperating-multiprocess readers.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cache (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER
            );",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl CacheDriver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn get(&self, key: &str) -> Option<Value> {
        let conn = self.conn.lock().ok()?;

        let row: Option<(String, Option<i64>)> = conn
            .query_row(
                "SELECT value, expires_at FROM cache WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .unwrap_or_else(|e| {
                warn!("cache read failed for {key}: {e}");
                None
            });

        let (value, expires_at) = row?;

        if let Some(expires_at) = expires_at {
            if chrono::Utc::now().timestamp() >= expires_at {
                let _ = conn.execute("DELETE FROM cache WHERE key = ?1", params![key]);
                return None;
            }
        }

        serde_json::from_str(&value).ok()
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> bool {
        let Ok(conn) = self.conn.lock() else {
            return false;
        };

        let Ok(serialized) = serde_json::to_string(&value) else {
            return false;
        };

        let expires_at = ttl.map(|ttl| chrono::Utc::now().timestamp() + ttl.as_secs() as i64);

        conn.execute(
            "INSERT OR REPLACE INTO cache (key, value, expires_at) VALUES (?1, ?2, ?3)",
            params![key, serialized, expires_at],
        )
        .map_err(|e| warn!("cache write failed for {key}: {e}"))
        .is_ok()
    }

    fn delete(&self, key: &str) -> bool {
        self.conn
            .lock()
            .ok()
            .and_then(|conn| {
                conn.execute("DELETE FROM cache WHERE key = ?1", params![key])
                    .ok()
            })
            .map(|rows| rows > 0)
            .unwrap_or(false)
    }

    fn clear(&self) -> bool {
        self.conn
            .lock()
            .ok()
            .and_then(|conn| conn.execute("DELETE FROM cache", []).ok())
            .is_some()
    }
}
