//! `SQLite` backing for every persistent partition.
//!
//! One database file holds four tables:
//!
//! - `scores` - fingerprint → score JSON (the extraction cache)
//! - `preferences` - (user, key) → JSON value, last write wins
//! - `corrections` - append-only correction history
//! - `evaluations` - append-only extraction ratings
//!
//! [`Database`] is a cheap, cloneable handle. Each store runs one SQL
//! statement per write under the connection mutex, so a reader never sees a
//! half-written row.

use crate::error::{Error, Result};
use log::{debug, trace};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS scores (
        fingerprint      TEXT PRIMARY KEY,
        source           TEXT,
        score            TEXT NOT NULL,
        created_at       TEXT NOT NULL,
        last_accessed_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS preferences (
        user_id    TEXT NOT NULL,
        key        TEXT NOT NULL,
        value      TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (user_id, key)
    );

    CREATE TABLE IF NOT EXISTS corrections (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id         TEXT NOT NULL,
        original_ref    TEXT NOT NULL,
        corrected_ref   TEXT NOT NULL,
        corrected_score TEXT NOT NULL,
        diff            TEXT NOT NULL,
        signals         TEXT NOT NULL,
        created_at      TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_corrections_user ON corrections(user_id, created_at);

    CREATE TABLE IF NOT EXISTS evaluations (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        fingerprint TEXT NOT NULL,
        user_id     TEXT NOT NULL,
        rating      INTEGER NOT NULL,
        notes       TEXT,
        created_at  TEXT NOT NULL
    );
";

#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the library at `path` and make sure all tables exist.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| {
            Error::Storage(format!("cannot open database {}: {e}", path.display()))
        })?;
        debug!("Opened library database at {}", path.display());
        Self::init(conn)
    }

    /// Throwaway database, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        trace!("Library schema ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` with exclusive access to the connection.
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::Storage("database lock poisoned".to_owned()))?;
        Ok(f(&conn)?)
    }
}
