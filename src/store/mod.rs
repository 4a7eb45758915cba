//! Durable key/value store
//!
//! Persisted state (the selected source, the last fetched vault and the last
//! rendered entry list) lives in a single SQLite table so it survives process
//! restarts. Values are simple string-keyed blobs with no schema versioning.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("value for '{key}' is not valid UTF-8")]
    NotText { key: &'static str },

    #[error("store lock poisoned")]
    Poisoned,
}

/// Keys persisted by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKey {
    /// Selected source kind ("url" or "page_link")
    SourceKind,
    /// Selected source location (URL or bare filename)
    SourceLocation,
    /// Last fetched raw vault bytes
    VaultData,
    /// Last rendered entry list markup
    NamesMarkup,
}

impl StoreKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::SourceKind => "source_kind",
            StoreKey::SourceLocation => "source_location",
            StoreKey::VaultData => "vault_data",
            StoreKey::NamesMarkup => "names_markup",
        }
    }
}

/// SQLite-backed key/value store
pub struct Store {
    db: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the store at the given path
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL")?;
        Self::init(conn)
    }

    /// Open a store that lives only as long as this value
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;

        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.db.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Read raw bytes for a key
    pub fn get_bytes(&self, key: StoreKey) -> Result<Option<Vec<u8>>, StoreError> {
        let db = self.lock()?;
        let value = db
            .query_row(
                "SELECT value FROM kv WHERE key = ?",
                [key.as_str()],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Read a UTF-8 value for a key
    pub fn get_string(&self, key: StoreKey) -> Result<Option<String>, StoreError> {
        match self.get_bytes(key)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| StoreError::NotText { key: key.as_str() }),
            None => Ok(None),
        }
    }

    /// Write a value, replacing any previous one
    pub fn put(&self, key: StoreKey, value: &[u8]) -> Result<(), StoreError> {
        let db = self.lock()?;
        db.execute(
            r#"
            INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key.as_str(), value, Utc::now().to_rfc3339()],
        )?;
        tracing::debug!(key = key.as_str(), bytes = value.len(), "stored value");
        Ok(())
    }

    /// Write a UTF-8 value
    pub fn put_string(&self, key: StoreKey, value: &str) -> Result<(), StoreError> {
        self.put(key, value.as_bytes())
    }

    /// When a key was last written
    pub fn updated_at(&self, key: StoreKey) -> Result<Option<DateTime<Utc>>, StoreError> {
        let db = self.lock()?;
        let stamp: Option<String> = db
            .query_row(
                "SELECT updated_at FROM kv WHERE key = ?",
                [key.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(stamp.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        }))
    }
}
