//! Durable score storage
//!
//! Append-only SQLite table of accepted scores:
//! - Seeded into the cache once at startup (`load_all`)
//! - Written in batches by the checkpoint task (`insert_batch`)
//!
//! Rows are never updated or deleted; the in-memory cap only trims the live
//! view, never the durable record.

use crate::entry::ScoreEntry;
use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS scores (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    score INTEGER NOT NULL,
    timestamp INTEGER NOT NULL
);
"#;

/// Interface the cache needs from durable storage.
///
/// `insert_batch` must be all-or-nothing: on failure no entry of the batch
/// may be durable.
pub trait ScoreStore: Send + Sync {
    /// All persisted entries, sorted by score descending, timestamp descending
    fn load_all(&self) -> Result<Vec<ScoreEntry>>;

    /// Persist a batch of entries in one transaction, preserving order
    fn insert_batch(&self, entries: &[ScoreEntry]) -> Result<()>;
}

/// SQLite-backed score store
pub struct SqliteScoreStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteScoreStore {
    /// Open (or create) the store at the specified path
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch(SCHEMA)?;
        info!("Score store initialized at {:?}", path);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create in-memory storage (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl ScoreStore for SqliteScoreStore {
    fn load_all(&self) -> Result<Vec<ScoreEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT name, score, timestamp FROM scores ORDER BY score DESC, timestamp DESC",
        )?;

        let entries = stmt
            .query_map([], |row| {
                Ok(ScoreEntry {
                    name: row.get(0)?,
                    score: row.get(1)?,
                    timestamp: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn insert_batch(&self, entries: &[ScoreEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            // u64 goes through rusqlite's checked conversion: a score above
            // i64::MAX fails the statement (and rolls back the batch) instead
            // of wrapping into a negative column value
            let mut stmt =
                tx.prepare("INSERT INTO scores (name, score, timestamp) VALUES (?1, ?2, ?3)")?;
            for entry in entries {
                stmt.execute(params![entry.name, entry.score, entry.timestamp])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
