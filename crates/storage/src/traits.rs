use settingsdoc_core::{AuditRecord, Document, document};

use crate::error::StorageError;

/// A document as persisted, with its version counter pulled out.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub path: String,
    pub data: Document,
    pub version: u64,
}

impl StoredDocument {
    pub fn new(path: impl Into<String>, data: Document) -> Self {
        let version = document::version_of(&data);
        Self {
            path: path.into(),
            data,
            version,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Deep-merge into the stored document.
    Merge,
    /// Replace the stored document wholesale.
    Replace,
}

/// What a transaction body asks the store to do with its writes.
#[derive(Debug)]
pub enum TxOutcome<T> {
    Commit(T),
    Rollback(T),
}

/// Reads and writes inside one atomic transaction.
pub trait DocumentTransaction {
    fn get(&self, path: &str) -> Result<Option<StoredDocument>, StorageError>;

    fn set(&mut self, path: &str, data: &Document, mode: WriteMode) -> Result<(), StorageError>;
}

/// A transactional key-document store.
pub trait DocumentStore {
    /// Plain read outside any transaction. May be stale.
    fn get(&self, path: &str) -> Result<Option<StoredDocument>, StorageError>;

    /// Single atomic write.
    fn set(&mut self, path: &str, data: &Document, mode: WriteMode) -> Result<(), StorageError>;

    /// Run `body` with exclusive write access. Writes become visible only if
    /// it returns `TxOutcome::Commit`; an error or `Rollback` discards them.
    fn run_transaction<T, F>(&mut self, body: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut dyn DocumentTransaction) -> Result<TxOutcome<T>, StorageError>;

    fn append_audit(&mut self, record: &AuditRecord) -> Result<(), StorageError>;

    /// Audit records for `path`, oldest first.
    fn audit_records(&self, path: &str) -> Result<Vec<AuditRecord>, StorageError>;
}
