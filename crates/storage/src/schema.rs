use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -8000;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, unixepoch())",
        [SCHEMA_VERSION],
    )?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS documents (
    path TEXT PRIMARY KEY,
    body BLOB NOT NULL,
    version INTEGER NOT NULL DEFAULT 0 CHECK (version >= 0),
    checksum BLOB NOT NULL CHECK (length(checksum) = 32),
    updated_at TEXT,
    written_at INTEGER NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER))
);

CREATE TABLE IF NOT EXISTS audit_log (
    rowid INTEGER PRIMARY KEY,
    audit_id BLOB NOT NULL UNIQUE CHECK (length(audit_id) = 16),
    path TEXT NOT NULL,
    kind TEXT NOT NULL,
    ts TEXT NOT NULL,
    by_author TEXT NOT NULL,
    user_agent TEXT,
    version INTEGER NOT NULL,
    size INTEGER NOT NULL,
    diff BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_audit_path ON audit_log (path, rowid);
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_records_the_schema_version_once() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        let (rows, version): (i64, i32) = conn
            .query_row("SELECT COUNT(*), MAX(version) FROM schema_version", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!((rows, version), (1, SCHEMA_VERSION));
    }
}
