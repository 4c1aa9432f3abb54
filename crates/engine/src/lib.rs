pub mod audit;
pub mod cache;
pub mod config;
pub mod error;
pub mod migration;

pub use audit::{AuditEntry, AuditLogger};
pub use cache::{CacheEvent, SettingsCache, SubscriptionId};
pub use config::EngineConfig;
pub use error::EngineError;
pub use migration::MigrationReport;

use std::sync::Arc;

use tracing::{debug, info, warn};

use settingsdoc_core::{
    AuditKind, Clock, Concern, Document, HeaderAppearance, SystemClock, ValidationErrors,
    document::{self, merge_patch, stamp},
    normalize::{canonicalize_patch, has_header_source},
    normalize_concern, normalize_header, validate_patch,
};
use settingsdoc_storage::{DocumentStore, SqliteStore, StoredDocument, TxOutcome, WriteMode};

/// A partial update against the document at `path`.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub path: String,
    pub patch: Document,
    /// Version the caller read before editing.
    pub base_version: u64,
    pub author: String,
    pub user_agent: Option<String>,
}

impl SaveRequest {
    pub fn new(path: impl Into<String>, patch: Document, base_version: u64, author: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            patch,
            base_version,
            author: author.into(),
            user_agent: None,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// The patch was merged and the version advanced by one.
    Committed { document: Document, before: Document },
    /// The stored version moved past the caller's base. Nothing was written;
    /// the caller must re-read and retry.
    Conflict { current: Document, current_version: u64 },
    /// The patch failed validation. Nothing was written.
    Invalid(ValidationErrors),
}

impl SaveOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Version of the committed document.
    pub fn committed_version(&self) -> Option<u64> {
        match self {
            Self::Committed { document, .. } => Some(document::version_of(document)),
            _ => None,
        }
    }
}

/// Versioned reads and writes of settings documents.
///
/// All writes go through optimistic concurrency: a save names the version it
/// was based on and is refused if the stored version has moved.
pub struct SettingsService<S: DocumentStore = SqliteStore> {
    store: S,
    clock: Box<dyn Clock>,
    config: EngineConfig,
    audit: AuditLogger,
    cache: Option<Arc<SettingsCache>>,
}

impl<S: DocumentStore> SettingsService<S> {
    pub fn new(store: S) -> Self {
        let config = EngineConfig::default();
        Self {
            store,
            clock: Box::new(SystemClock),
            audit: AuditLogger::from_config(&config),
            config,
            cache: None,
        }
    }

    pub fn with_config(store: S, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            audit: AuditLogger::from_config(&config),
            config,
            ..Self::new(store)
        })
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Publish committed documents to `cache`.
    pub fn with_cache(mut self, cache: Arc<SettingsCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&Arc<SettingsCache>> {
        self.cache.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Merge `request.patch` into the stored document.
    ///
    /// The patch is canonicalized and validated first. The read, version
    /// check and write then run in one immediate transaction, so of two
    /// saves from the same base version exactly one commits.
    pub fn save(&mut self, request: SaveRequest) -> Result<SaveOutcome, EngineError> {
        let SaveRequest {
            path,
            patch,
            base_version,
            author,
            user_agent,
        } = request;
        debug!(path = %path, base_version, author = %author, "save started");

        let patch = match validate_patch(&canonicalize_patch(&patch)) {
            Ok(patch) => patch,
            Err(errors) => {
                warn!(path = %path, fields = ?errors.paths(), "save rejected: invalid patch");
                return Ok(SaveOutcome::Invalid(errors));
            }
        };

        let now = self.clock.now_iso();
        let outcome = self.store.run_transaction(|tx| {
            let (before, current_version) = match tx.get(&path)? {
                Some(current) => {
                    if current.version != base_version {
                        return Ok(TxOutcome::Rollback(SaveOutcome::Conflict {
                            current_version: current.version,
                            current: current.data,
                        }));
                    }
                    (current.data, current.version)
                }
                None => (Document::new(), 0),
            };

            let mut after = before.clone();
            merge_patch(&mut after, &patch);
            stamp(&mut after, current_version + 1, &now, &author);
            tx.set(&path, &after, WriteMode::Replace)?;
            Ok(TxOutcome::Commit(SaveOutcome::Committed {
                document: after,
                before,
            }))
        })?;

        match &outcome {
            SaveOutcome::Committed { document, before } => {
                let version = document::version_of(document);
                info!(path = %path, version, author = %author, "settings saved");
                self.audit.record(
                    &mut self.store,
                    &*self.clock,
                    AuditEntry {
                        kind: AuditKind::Save,
                        path: &path,
                        before,
                        after: document,
                        author: &author,
                        user_agent: user_agent.as_deref(),
                        version,
                    },
                );
                if let Some(cache) = &self.cache {
                    cache.put(&path, document.clone(), version);
                }
            }
            SaveOutcome::Conflict { current_version, .. } => {
                warn!(path = %path, base_version, current_version, "save conflict");
            }
            SaveOutcome::Invalid(_) => {}
        }
        Ok(outcome)
    }

    /// Plain read outside any transaction.
    pub fn read(&self, path: &str) -> Result<Option<StoredDocument>, EngineError> {
        Ok(self.store.get(path)?)
    }

    /// The canonical header appearance for the document at `path`.
    ///
    /// When that document carries no header data in any layout, the
    /// standalone legacy appearance document is used instead. Defaults apply
    /// when neither exists.
    pub fn read_header_appearance(&self, path: &str) -> Result<HeaderAppearance, EngineError> {
        let source = self.header_source(path)?;
        Ok(normalize_header(&source))
    }

    /// Canonical JSON for one concern of the header appearance.
    pub fn read_concern(&self, path: &str, concern: Concern) -> Result<serde_json::Value, EngineError> {
        let source = self.header_source(path)?;
        Ok(normalize_concern(concern, &source)?)
    }

    /// Header appearance of the configured main settings document.
    pub fn site_header(&self) -> Result<HeaderAppearance, EngineError> {
        self.read_header_appearance(&self.config.settings_path)
    }

    fn header_source(&self, path: &str) -> Result<Document, EngineError> {
        let main = self.read(path)?.map(|doc| doc.data).unwrap_or_default();
        if has_header_source(&main) {
            return Ok(main);
        }
        match self.read(&self.config.legacy_appearance_path)? {
            Some(legacy) => {
                debug!(path, fallback = %self.config.legacy_appearance_path, "using legacy appearance document");
                Ok(legacy.data)
            }
            None => Ok(main),
        }
    }
}
