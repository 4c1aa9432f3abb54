use std::path::Path;

use rusqlite::{Connection, OptionalExtension, TransactionBehavior};

use settingsdoc_core::{
    AuditKind, AuditRecord, Document,
    document::{self, from_msgpack, to_msgpack},
    ids::AuditId,
};

use crate::error::StorageError;
use crate::traits::{DocumentStore, DocumentTransaction, StoredDocument, TxOutcome, WriteMode};

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// The underlying connection, for maintenance and tests.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Number of stored documents.
    pub fn document_count(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn read_document(conn: &Connection, path: &str) -> Result<Option<StoredDocument>, StorageError> {
    let row: Option<(Vec<u8>, Vec<u8>)> = conn
        .query_row(
            "SELECT body, checksum FROM documents WHERE path = ?1",
            rusqlite::params![path],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((body, checksum)) = row else {
        return Ok(None);
    };
    let checksum = to_array::<32>(checksum, "checksum")?;
    if *blake3::hash(&body).as_bytes() != checksum {
        return Err(StorageError::Corrupt {
            path: path.to_string(),
        });
    }
    let data = from_msgpack(&body)?;
    Ok(Some(StoredDocument::new(path, data)))
}

fn write_document(conn: &Connection, path: &str, data: &Document) -> Result<(), StorageError> {
    let body = to_msgpack(data)?;
    let checksum = blake3::hash(&body);
    let updated_at = data
        .get(document::UPDATED_AT_KEY)
        .and_then(|v| v.as_str());
    conn.execute(
        "INSERT INTO documents (path, body, version, checksum, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(path) DO UPDATE SET body = excluded.body, version = excluded.version, checksum = excluded.checksum, updated_at = excluded.updated_at,
             written_at = CAST(unixepoch('now','subsec') * 1000 AS INTEGER)",
        rusqlite::params![
            path,
            body,
            document::version_of(data) as i64,
            &checksum.as_bytes()[..],
            updated_at,
        ],
    )?;
    Ok(())
}

fn apply_write(
    conn: &Connection,
    path: &str,
    data: &Document,
    mode: WriteMode,
) -> Result<(), StorageError> {
    match mode {
        WriteMode::Replace => write_document(conn, path, data),
        WriteMode::Merge => {
            let mut merged = read_document(conn, path)?
                .map(|doc| doc.data)
                .unwrap_or_default();
            document::merge_patch(&mut merged, data);
            write_document(conn, path, &merged)
        }
    }
}

/// Handle passed to transaction bodies. Borrows the open transaction.
struct SqliteTransaction<'c> {
    conn: &'c Connection,
}

impl DocumentTransaction for SqliteTransaction<'_> {
    fn get(&self, path: &str) -> Result<Option<StoredDocument>, StorageError> {
        read_document(self.conn, path)
    }

    fn set(&mut self, path: &str, data: &Document, mode: WriteMode) -> Result<(), StorageError> {
        apply_write(self.conn, path, data, mode)
    }
}

impl DocumentStore for SqliteStore {
    fn get(&self, path: &str) -> Result<Option<StoredDocument>, StorageError> {
        read_document(&self.conn, path)
    }

    fn set(&mut self, path: &str, data: &Document, mode: WriteMode) -> Result<(), StorageError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        apply_write(&tx, path, data, mode)?;
        tx.commit()?;
        Ok(())
    }

    fn run_transaction<T, F>(&mut self, body: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut dyn DocumentTransaction) -> Result<TxOutcome<T>, StorageError>,
    {
        // IMMEDIATE takes the write lock up front, so the read inside `body`
        // cannot go stale before the write. Concurrent writers wait on
        // busy_timeout.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = {
            let mut handle = SqliteTransaction { conn: &tx };
            body(&mut handle)?
        };
        match outcome {
            TxOutcome::Commit(value) => {
                tx.commit()?;
                Ok(value)
            }
            TxOutcome::Rollback(value) => {
                tx.rollback()?;
                Ok(value)
            }
        }
    }

    fn append_audit(&mut self, record: &AuditRecord) -> Result<(), StorageError> {
        let diff = rmp_serde::to_vec(&record.diff)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO audit_log (audit_id, path, kind, ts, by_author, user_agent, version, size, diff) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                record.id.as_bytes().as_slice(),
                record.path,
                record.kind.as_str(),
                record.ts,
                record.by,
                record.ua,
                record.version as i64,
                record.size as i64,
                diff,
            ],
        )?;
        Ok(())
    }

    fn audit_records(&self, path: &str) -> Result<Vec<AuditRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT audit_id, kind, ts, by_author, user_agent, version, size, diff FROM audit_log WHERE path = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(rusqlite::params![path], |row| {
            let audit_id: Vec<u8> = row.get(0)?;
            let kind: String = row.get(1)?;
            let ts: String = row.get(2)?;
            let by: String = row.get(3)?;
            let ua: Option<String> = row.get(4)?;
            let version: i64 = row.get(5)?;
            let size: i64 = row.get(6)?;
            let diff: Vec<u8> = row.get(7)?;
            Ok((audit_id, kind, ts, by, ua, version, size, diff))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (audit_id, kind, ts, by, ua, version, size, diff) = row?;
            let kind = AuditKind::parse(&kind).ok_or_else(|| {
                StorageError::Serialization(format!("unknown audit kind: {kind}"))
            })?;
            let diff = rmp_serde::from_slice(&diff)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            result.push(AuditRecord {
                id: AuditId::from_bytes(to_array::<16>(audit_id, "audit_id")?),
                kind,
                path: path.to_string(),
                ts,
                by,
                ua,
                version: version as u64,
                size: size as u64,
                diff,
            });
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn missing_document_reads_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get("settings/main").unwrap().is_none());
    }

    #[test]
    fn replace_then_read() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let data = doc(json!({"version": 3, "title": "Acme", "ratio": 0.5}));
        store.set("settings/main", &data, WriteMode::Replace).unwrap();

        let stored = store.get("settings/main").unwrap().unwrap();
        assert_eq!(stored.version, 3);
        assert_eq!(stored.data, data);
        assert_eq!(store.document_count().unwrap(), 1);
    }

    #[test]
    fn replace_drops_keys_merge_keeps_them() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .set("p", &doc(json!({"a": 1, "nested": {"x": 1}})), WriteMode::Replace)
            .unwrap();
        store
            .set("p", &doc(json!({"nested": {"y": 2}})), WriteMode::Merge)
            .unwrap();
        assert_eq!(
            Value::Object(store.get("p").unwrap().unwrap().data),
            json!({"a": 1, "nested": {"x": 1, "y": 2}})
        );

        store.set("p", &doc(json!({"b": 2})), WriteMode::Replace).unwrap();
        assert_eq!(Value::Object(store.get("p").unwrap().unwrap().data), json!({"b": 2}));
    }

    #[test]
    fn rollback_discards_writes() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let seen = store
            .run_transaction(|tx| {
                tx.set("p", &doc(json!({"a": 1})), WriteMode::Replace)?;
                let inside = tx.get("p")?.is_some();
                Ok(TxOutcome::Rollback(inside))
            })
            .unwrap();
        assert!(seen, "write should be visible inside the transaction");
        assert!(store.get("p").unwrap().is_none());
    }

    #[test]
    fn error_in_body_discards_writes() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let result: Result<(), StorageError> = store.run_transaction(|tx| {
            tx.set("p", &doc(json!({"a": 1})), WriteMode::Replace)?;
            Err(StorageError::Serialization("boom".into()))
        });
        assert!(result.is_err());
        assert!(store.get("p").unwrap().is_none());
    }

    #[test]
    fn commit_persists_writes() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .run_transaction(|tx| {
                tx.set("p", &doc(json!({"version": 1})), WriteMode::Replace)?;
                Ok(TxOutcome::Commit(()))
            })
            .unwrap();
        assert_eq!(store.get("p").unwrap().unwrap().version, 1);
    }

    #[test]
    fn checksum_mismatch_is_corrupt() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.set("p", &doc(json!({"a": 1})), WriteMode::Replace).unwrap();
        store
            .conn()
            .execute("UPDATE documents SET checksum = zeroblob(32) WHERE path = 'p'", [])
            .unwrap();
        match store.get("p") {
            Err(StorageError::Corrupt { path }) => assert_eq!(path, "p"),
            other => panic!("expected Corrupt, got {other:?}"),
        }
    }

    #[test]
    fn audit_roundtrip_in_insertion_order() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        for version in 1..=2u64 {
            let record = AuditRecord {
                id: AuditId::new(),
                kind: AuditKind::Save,
                path: "p".into(),
                ts: "2024-05-01T10:00:00.000Z".into(),
                by: "alice".into(),
                ua: Some("test-agent".into()),
                version,
                size: 42,
                diff: json!({"added": {"a": version}, "removed": {}, "changed": {}}),
            };
            store.append_audit(&record).unwrap();
        }
        let records = store.audit_records("p").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].version, 1);
        assert_eq!(records[1].diff["added"]["a"], json!(2));
        assert!(store.audit_records("other").unwrap().is_empty());
    }

    #[test]
    fn file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.set("p", &doc(json!({"version": 5})), WriteMode::Replace).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("p").unwrap().unwrap().version, 5);
    }
}
