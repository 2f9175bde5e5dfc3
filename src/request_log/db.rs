//! Request log database: SQLite schema initialization and connection management

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Request log handle
///
/// The connection sits behind a mutex so one log can be shared with stream
/// completion hooks running on other threads.
#[derive(Debug)]
pub struct RequestLog {
    conn: Mutex<Connection>,
}

/// Request log errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RequestLog {
    /// Open (or create) the log database at `path`
    ///
    /// Tables are created when missing; existing rows are kept.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening request log");
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory log (tests, dry runs)
    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Get the SQLite connection
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Initialize schema (idempotent)
    fn init_schema(conn: &Connection) -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS qwen_requests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                request_time INTEGER NOT NULL,
                response_time INTEGER NOT NULL,
                messages_json TEXT NOT NULL,
                reply TEXT,
                think TEXT,
                web_json TEXT,
                token_total INTEGER,
                token_input INTEGER,
                token_output INTEGER,
                token_output_think INTEGER,
                model TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS translate_requests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                request_time INTEGER NOT NULL,
                response_time INTEGER NOT NULL,
                input TEXT NOT NULL,
                output TEXT NOT NULL,
                input_lang TEXT NOT NULL,
                output_lang TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_qwen_requests_time ON qwen_requests(request_time)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_translate_requests_time ON translate_requests(request_time)",
            [],
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_tables() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("requests.db");
        let log = RequestLog::open(&path).unwrap();

        let tables: Vec<String> = {
            let conn = log.conn();
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            let rows = stmt.query_map([], |row| row.get(0)).unwrap();
            rows.map(Result::unwrap).collect()
        };
        assert!(tables.contains(&"qwen_requests".to_string()));
        assert!(tables.contains(&"translate_requests".to_string()));
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("requests.db");
        drop(RequestLog::open(&path).unwrap());
        assert!(RequestLog::open(&path).is_ok());
    }
}
