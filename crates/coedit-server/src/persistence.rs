//! `SQLite` persistence layer.
//!
//! Rooms are seeded from the `documents` snapshot table when they open and
//! write back a snapshot plus an `op_log` row after every version bump.

use rusqlite::{Connection, OptionalExtension, Result as SqliteResult};
use std::path::Path;

/// `SQLite`-backed persistence store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create a `SQLite` database.
    ///
    /// # Errors
    ///
    /// Returns error if database cannot be opened or initialized.
    pub fn open(path: &Path) -> SqliteResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory database (for testing and `COEDIT_STORE=memory`).
    ///
    /// # Errors
    ///
    /// Returns error if database cannot be created.
    pub fn in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize database schema.
    fn init_schema(&self) -> SqliteResult<()> {
        self.conn.execute_batch(
            r"
            -- Authoritative snapshot per document
            CREATE TABLE IF NOT EXISTS documents (
                doc_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                snapshot_json TEXT NOT NULL,
                version INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            -- Accepted, rebased operations in sequence order
            CREATE TABLE IF NOT EXISTS op_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                doc_id TEXT NOT NULL,
                version INTEGER NOT NULL,
                op_json TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE(doc_id, version)
            );

            CREATE INDEX IF NOT EXISTS idx_op_log_doc_id ON op_log(doc_id);
            ",
        )?;

        Ok(())
    }

    /// Save a document snapshot at a version.
    ///
    /// # Errors
    ///
    /// Returns error if insert fails.
    pub fn save_document(
        &self,
        doc_id: &str,
        title: &str,
        snapshot_json: &str,
        version: u64,
    ) -> SqliteResult<()> {
        self.conn.execute(
            r"
            INSERT OR REPLACE INTO documents (doc_id, title, snapshot_json, version, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            (doc_id, title, snapshot_json, to_i64(version)?, now_secs()?),
        )?;

        Ok(())
    }

    /// Load the latest snapshot for a document.
    ///
    /// Returns `(snapshot_json, version)` if the document exists.
    ///
    /// # Errors
    ///
    /// Returns error if query fails.
    pub fn load_document(&self, doc_id: &str) -> SqliteResult<Option<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT snapshot_json, version FROM documents
            WHERE doc_id = ?1
            ",
        )?;

        let result = stmt
            .query_row([doc_id], |row| {
                let json: String = row.get(0)?;
                let version: i64 = row.get(1)?;
                Ok((json, u64::try_from(version).unwrap_or(0)))
            })
            .optional()?;

        Ok(result)
    }

    /// Append an accepted operation to the log.
    ///
    /// # Errors
    ///
    /// Returns error if insert fails.
    pub fn append_operation(
        &self,
        doc_id: &str,
        version: u64,
        op_json: &str,
    ) -> SqliteResult<()> {
        self.conn.execute(
            r"
            INSERT OR REPLACE INTO op_log (doc_id, version, op_json, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
            (doc_id, to_i64(version)?, op_json, now_secs()?),
        )?;

        Ok(())
    }

    /// Operations accepted after a given version, in sequence order.
    ///
    /// # Errors
    ///
    /// Returns error if query fails.
    pub fn operations_since(&self, doc_id: &str, after_version: u64) -> SqliteResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT op_json FROM op_log
            WHERE doc_id = ?1 AND version > ?2
            ORDER BY version ASC
            ",
        )?;

        let ops = stmt
            .query_map((doc_id, to_i64(after_version)?), |row| row.get(0))?
            .collect::<SqliteResult<Vec<String>>>()?;

        Ok(ops)
    }
}

fn to_i64(value: u64) -> SqliteResult<i64> {
    i64::try_from(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn now_secs() -> SqliteResult<i64> {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?
        .as_secs();
    to_i64(secs)
}
