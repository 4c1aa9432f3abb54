//! One-shot rewrite of the flat legacy header keys into the nested layout.
//!
//! Must not run concurrently with saves: the rewrite leaves `version`
//! untouched, so a save racing it would not see a conflict.

use tracing::{debug, info};

use settingsdoc_core::{
    AuditKind, Document,
    document::{self, stamp_provenance},
    legacy::migrate_document,
};
use settingsdoc_storage::{DocumentStore, TxOutcome, WriteMode};

use crate::audit::AuditEntry;
use crate::error::EngineError;
use crate::SettingsService;

pub const REASON_NOT_FOUND: &str = "document not found";
pub const REASON_NO_LEGACY_KEYS: &str = "no legacy keys";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub changed: bool,
    /// Why nothing was written, when `changed` is false.
    pub reason: Option<String>,
    /// Legacy keys removed from the document, in legacy table order.
    pub moved_keys: Vec<String>,
}

impl MigrationReport {
    fn unchanged(reason: &str) -> Self {
        Self {
            changed: false,
            reason: Some(reason.to_string()),
            moved_keys: Vec::new(),
        }
    }
}

enum Rewrite {
    Skipped(&'static str),
    Written {
        before: Document,
        after: Document,
        moved_keys: Vec<String>,
    },
}

impl<S: DocumentStore> SettingsService<S> {
    /// Move every legacy flat key in the document at `path` under `header`.
    ///
    /// Running it twice is a no-op the second time.
    pub fn migrate_legacy(&mut self, path: &str) -> Result<MigrationReport, EngineError> {
        let now = self.clock.now_iso();
        let author = self.config.migration_author.clone();

        let rewrite = self.store.run_transaction(|tx| {
            let Some(current) = tx.get(path)? else {
                return Ok(TxOutcome::Rollback(Rewrite::Skipped(REASON_NOT_FOUND)));
            };
            let Some(migrated) = migrate_document(&current.data) else {
                return Ok(TxOutcome::Rollback(Rewrite::Skipped(REASON_NO_LEGACY_KEYS)));
            };
            let mut after = migrated.document;
            stamp_provenance(&mut after, &now, &author);
            tx.set(path, &after, WriteMode::Replace)?;
            Ok(TxOutcome::Commit(Rewrite::Written {
                before: current.data,
                after,
                moved_keys: migrated.moved_keys,
            }))
        })?;

        let (before, after, moved_keys) = match rewrite {
            Rewrite::Skipped(reason) => {
                debug!(path, reason, "migration skipped");
                return Ok(MigrationReport::unchanged(reason));
            }
            Rewrite::Written {
                before,
                after,
                moved_keys,
            } => (before, after, moved_keys),
        };

        let version = document::version_of(&after);
        info!(path, moved = moved_keys.len(), version, "legacy header keys migrated");

        self.audit.record(
            &mut self.store,
            &*self.clock,
            AuditEntry {
                kind: AuditKind::Migrate,
                path,
                before: &before,
                after: &after,
                author: &author,
                user_agent: None,
                version,
            },
        );
        if let Some(cache) = &self.cache {
            cache.put(path, after, version);
        }

        Ok(MigrationReport {
            changed: true,
            reason: None,
            moved_keys,
        })
    }
}
