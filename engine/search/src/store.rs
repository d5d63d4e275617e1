//! Durable win-ratio accumulator keyed by canonical board strings.
//!
//! Append/accumulate only: records are upserted, never deleted, so the
//! statistics compound across searches, games, and process restarts.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database failure: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Accumulated outcome statistics for one position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WinRatio {
    pub wins: u64,
    pub total: u64,
}

impl WinRatio {
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.wins as f64 / self.total as f64
        }
    }
}

/// Key-value accumulator for rollout outcomes.
pub trait WinStore {
    /// Record one rollout visit: a new key starts at `(win_delta, 1)`, an
    /// existing key adds `win_delta` and increments its total.
    fn upsert(&mut self, key: &str, win_delta: u32) -> Result<(), StoreError>;

    /// Aggregate stats for a key; `(0, 0)` when never visited.
    fn read(&self, key: &str) -> Result<WinRatio, StoreError>;
}

const UPSERT_SQL: &str = "INSERT INTO state_records (id, wins, total) VALUES (?1, ?2, 1)
     ON CONFLICT(id) DO UPDATE SET wins = wins + excluded.wins, total = total + 1";

const SELECT_SQL: &str = "SELECT wins, total FROM state_records WHERE id = ?1";

/// SQLite-backed store, the durable default.
pub struct SqliteWinStore {
    conn: Connection,
}

impl SqliteWinStore {
    /// Open (and initialize if needed) the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Ephemeral store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS state_records (
                id TEXT PRIMARY KEY,
                wins INTEGER NOT NULL,
                total INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }
}

impl WinStore for SqliteWinStore {
    fn upsert(&mut self, key: &str, win_delta: u32) -> Result<(), StoreError> {
        self.conn.execute(UPSERT_SQL, params![key, win_delta])?;
        Ok(())
    }

    fn read(&self, key: &str) -> Result<WinRatio, StoreError> {
        let row = self
            .conn
            .query_row(SELECT_SQL, params![key], |row| {
                Ok(WinRatio {
                    wins: row.get::<_, i64>(0)? as u64,
                    total: row.get::<_, i64>(1)? as u64,
                })
            })
            .optional()?;
        Ok(row.unwrap_or_default())
    }
}

/// In-memory store for tests and ephemeral agents.
#[derive(Debug, Default)]
pub struct MemoryWinStore {
    records: HashMap<String, WinRatio>,
}

impl MemoryWinStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl WinStore for MemoryWinStore {
    fn upsert(&mut self, key: &str, win_delta: u32) -> Result<(), StoreError> {
        let record = self.records.entry(key.to_string()).or_default();
        record.wins += win_delta as u64;
        record.total += 1;
        Ok(())
    }

    fn read(&self, key: &str) -> Result<WinRatio, StoreError> {
        Ok(self.records.get(key).copied().unwrap_or_default())
    }
}
