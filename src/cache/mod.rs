//! SQLite-based baseline cache.
//!
//! Profiling every column of a schema takes one GROUP BY per column, so the
//! baseline informativity table is persisted between runs. The cache is
//! stored in `~/.catdb/cache.db` unless configured otherwise.
//!
//! # Design
//!
//! - Simple key-value store with JSON values
//! - No TTL - an entry stays valid as long as the schema it was computed
//!   for is unchanged, which the key encodes
//! - Versioned - auto-clears on version mismatch
//!
//! # Key Format
//!
//! ```text
//! {schema_hash}:informativity          -> {table: {column: entropy}}
//! {schema_hash}:informativity:pk       -> same, primary keys included
//! ```

mod hash;
pub use hash::compute_hash;

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};

use crate::schema::Schema;

/// Current cache schema version. Bump this when the cache format changes.
const CACHE_VERSION: i32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to determine cache directory")]
    NoCacheDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Persistent key-value cache.
pub struct BaselineCache {
    conn: Connection,
}

impl BaselineCache {
    /// Open or create the cache at the default location.
    pub fn open_default() -> CacheResult<Self> {
        Self::open(Self::default_path()?)
    }

    /// Open or create the cache database at `path`.
    ///
    /// If the cache version doesn't match, it's automatically cleared.
    pub fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let cache = Self {
            conn: Connection::open(path)?,
        };
        cache.init()?;
        tracing::debug!(path = %path.display(), "opened cache");
        Ok(cache)
    }

    /// Open an in-memory cache (for testing).
    pub fn open_in_memory() -> CacheResult<Self> {
        let cache = Self {
            conn: Connection::open_in_memory()?,
        };
        cache.init()?;
        Ok(cache)
    }

    pub fn default_path() -> CacheResult<PathBuf> {
        let base = dirs::home_dir().ok_or(CacheError::NoCacheDir)?;
        Ok(base.join(".catdb").join("cache.db"))
    }

    fn init(&self) -> CacheResult<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS cache (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;

        let stored_version: Option<i32> = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = 'version'", [], |row| {
                let s: String = row.get(0)?;
                Ok(s.parse().unwrap_or(0))
            })
            .optional()?;

        match stored_version {
            Some(v) if v == CACHE_VERSION => {}
            Some(v) => {
                tracing::info!(found = v, expected = CACHE_VERSION, "cache version changed, clearing");
                self.clear_all()?;
                self.set_version()?;
            }
            None => self.set_version()?,
        }

        Ok(())
    }

    fn set_version(&self) -> CacheResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('version', ?)",
            params![CACHE_VERSION.to_string()],
        )?;
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM cache WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> CacheResult<()> {
        let json = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO cache (key, value) VALUES (?, ?)",
            params![key, json],
        )?;
        Ok(())
    }

    /// Clear all cache entries (but keep metadata).
    fn clear_all(&self) -> CacheResult<()> {
        self.conn.execute("DELETE FROM cache", [])?;
        Ok(())
    }

    pub fn stats(&self) -> CacheResult<CacheStats> {
        let entry_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cache", [], |row| row.get(0))?;

        let total_size: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(value)), 0) FROM cache",
            [],
            |row| row.get(0),
        )?;

        Ok(CacheStats {
            entry_count: entry_count as usize,
            total_size_bytes: total_size as usize,
        })
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    /// Number of entries in the cache.
    pub entry_count: usize,
    /// Total size of all values in bytes.
    pub total_size_bytes: usize,
}

/// Helper for generating cache keys.
pub struct CacheKey;

impl CacheKey {
    /// Content hash of a schema; changes whenever a table, column or
    /// procedure does.
    pub fn schema_hash(schema: &Schema) -> CacheResult<String> {
        Ok(compute_hash(schema)?)
    }

    /// Key for the baseline informativity table.
    pub fn informativity(schema_hash: &str, include_primary_keys: bool) -> String {
        if include_primary_keys {
            format!("{}:informativity:pk", schema_hash)
        } else {
            format!("{}:informativity", schema_hash)
        }
    }
}
