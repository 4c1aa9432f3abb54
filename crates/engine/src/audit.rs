//! Best-effort audit trail for settings transitions.
//!
//! Records hold a diff and metadata, never the documents themselves. A failed
//! append is logged and dropped so it can never undo or fail a committed save.

use serde_json::{Value, json};
use tracing::{debug, warn};

use settingsdoc_core::{
    AuditKind, AuditRecord, Clock, CoreError, Document, diff,
    document::{json_size, without_reserved},
    ids::AuditId,
};
use settingsdoc_storage::DocumentStore;

use crate::config::EngineConfig;

/// One transition to record.
#[derive(Debug, Clone, Copy)]
pub struct AuditEntry<'a> {
    pub kind: AuditKind,
    pub path: &'a str,
    pub before: &'a Document,
    pub after: &'a Document,
    pub author: &'a str,
    pub user_agent: Option<&'a str>,
    /// Version after the transition.
    pub version: u64,
}

#[derive(Debug, Clone)]
pub struct AuditLogger {
    max_diff_bytes: usize,
    enabled: bool,
}

impl AuditLogger {
    pub fn new(max_diff_bytes: usize, enabled: bool) -> Self {
        Self {
            max_diff_bytes,
            enabled,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.audit_max_diff_bytes, config.audit_enabled)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Build the record for `entry`, or `None` when it should be skipped.
    ///
    /// The diff ignores the provenance fields, which every save rewrites. A
    /// transition with no other change is skipped unless it created the
    /// document (version 1).
    pub fn build(&self, entry: &AuditEntry<'_>, ts: String) -> Result<Option<AuditRecord>, CoreError> {
        let changes = diff(&without_reserved(entry.before), &without_reserved(entry.after));
        if changes.is_empty() && entry.version != 1 {
            return Ok(None);
        }

        let mut payload = serde_json::to_value(&changes)?;
        let payload_len = serde_json::to_vec(&payload)?.len();
        if payload_len > self.max_diff_bytes {
            payload = json!({ "truncated": true, "keys": changes.keys() });
        }

        Ok(Some(AuditRecord {
            id: AuditId::new(),
            kind: entry.kind,
            path: entry.path.to_string(),
            ts,
            by: entry.author.to_string(),
            ua: entry.user_agent.map(str::to_string),
            version: entry.version,
            size: json_size(entry.after)?,
            diff: payload,
        }))
    }

    /// Append a record for `entry`. Returns whether one was written.
    pub fn record<S: DocumentStore>(&self, store: &mut S, clock: &dyn Clock, entry: AuditEntry<'_>) -> bool {
        if !self.enabled {
            return false;
        }
        let record = match self.build(&entry, clock.now_iso()) {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(path = entry.path, version = entry.version, "audit skipped: no changes");
                return false;
            }
            Err(e) => {
                warn!(path = entry.path, error = %e, "audit record could not be built");
                return false;
            }
        };
        match store.append_audit(&record) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    path = entry.path,
                    kind = entry.kind.as_str(),
                    version = entry.version,
                    error = %e,
                    "audit append failed"
                );
                false
            }
        }
    }
}

/// Whether a stored diff payload was replaced by its key list.
pub fn is_truncated(diff: &Value) -> bool {
    diff.get("truncated").and_then(Value::as_bool).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use settingsdoc_core::FixedClock;
    use settingsdoc_storage::SqliteStore;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn entry<'a>(before: &'a Document, after: &'a Document, version: u64) -> AuditEntry<'a> {
        AuditEntry {
            kind: AuditKind::Save,
            path: "settings/main",
            before,
            after,
            author: "alice",
            user_agent: Some("browser"),
            version,
        }
    }

    #[test]
    fn no_op_transition_is_skipped() {
        let logger = AuditLogger::new(1024, true);
        let a = doc(json!({"title": "Acme"}));
        assert!(logger.build(&entry(&a, &a, 4), "t".into()).unwrap().is_none());
    }

    #[test]
    fn provenance_only_changes_are_skipped() {
        let logger = AuditLogger::new(1024, true);
        let before = doc(json!({"title": "Acme", "version": 3, "updatedBy": "bob"}));
        let after = doc(json!({"title": "Acme", "version": 4, "updatedBy": "alice"}));
        assert!(logger.build(&entry(&before, &after, 4), "t".into()).unwrap().is_none());
    }

    #[test]
    fn first_version_is_recorded_even_without_changes() {
        let logger = AuditLogger::new(1024, true);
        let empty = Document::new();
        let record = logger.build(&entry(&empty, &empty, 1), "t".into()).unwrap().unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.size, 2);
    }

    #[test]
    fn record_carries_diff_and_metadata() {
        let logger = AuditLogger::new(1024, true);
        let before = doc(json!({"title": "Acme", "gone": true}));
        let after = doc(json!({"title": "Acme Inc", "fresh": 1}));
        let record = logger
            .build(&entry(&before, &after, 2), "2024-05-01T10:00:00.000Z".into())
            .unwrap()
            .unwrap();
        assert_eq!(record.by, "alice");
        assert_eq!(record.ua.as_deref(), Some("browser"));
        assert_eq!(record.diff["added"]["fresh"], json!(1));
        assert_eq!(record.diff["removed"]["gone"], json!(true));
        assert_eq!(record.diff["changed"]["title"]["after"], json!("Acme Inc"));
        assert!(!is_truncated(&record.diff));
    }

    #[test]
    fn oversized_diff_is_truncated_to_keys() {
        let logger = AuditLogger::new(64, true);
        let before = Document::new();
        let after = doc(json!({"blob": "x".repeat(500), "alpha": 1}));
        let record = logger.build(&entry(&before, &after, 2), "t".into()).unwrap().unwrap();
        assert!(is_truncated(&record.diff));
        assert_eq!(record.diff["keys"], json!(["alpha", "blob"]));
    }

    #[test]
    fn failed_append_is_swallowed() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.conn().execute_batch("DROP TABLE audit_log").unwrap();
        let logger = AuditLogger::new(1024, true);
        let before = Document::new();
        let after = doc(json!({"a": 1}));
        let clock = FixedClock::new("2024-05-01T10:00:00.000Z");
        assert!(!logger.record(&mut store, &clock, entry(&before, &after, 1)));
    }

    #[test]
    fn disabled_logger_writes_nothing() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let logger = AuditLogger::new(1024, false);
        let before = Document::new();
        let after = doc(json!({"a": 1}));
        let clock = FixedClock::new("t");
        assert!(!logger.record(&mut store, &clock, entry(&before, &after, 1)));
        assert!(store.audit_records("settings/main").unwrap().is_empty());
    }
}
