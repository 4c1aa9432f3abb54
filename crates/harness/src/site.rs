use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use settingsdoc_core::{Document, FixedClock};
use settingsdoc_engine::{EngineConfig, EngineError, SaveOutcome, SaveRequest, SettingsCache, SettingsService};
use settingsdoc_storage::{DocumentStore, SqliteStore, WriteMode};

/// `updatedAt` stamp produced by every test site.
pub const FIXED_NOW: &str = "2024-05-01T12:00:00.000Z";

/// Unwrap a JSON object literal into a document.
pub fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Install a fmt subscriber filtered by `RUST_LOG`. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A settings service on a throwaway store with a fixed clock and its own cache.
pub struct TestSite {
    pub service: SettingsService<SqliteStore>,
    pub cache: Arc<SettingsCache>,
}

impl TestSite {
    pub fn new() -> Result<Self, EngineError> {
        Self::from_store(SqliteStore::open_in_memory()?, EngineConfig::default())
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        Self::from_store(SqliteStore::open(path)?, EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, EngineError> {
        Self::from_store(SqliteStore::open_in_memory()?, config)
    }

    fn from_store(store: SqliteStore, config: EngineConfig) -> Result<Self, EngineError> {
        init_tracing();
        let cache = Arc::new(SettingsCache::new());
        let service = SettingsService::with_config(store, config)?
            .with_clock(FixedClock::new(FIXED_NOW))
            .with_cache(Arc::clone(&cache));
        Ok(Self { service, cache })
    }

    /// Write `value` verbatim, bypassing versioning and audit.
    pub fn seed(&mut self, path: &str, value: Value) -> Result<(), EngineError> {
        self.service
            .store_mut()
            .set(path, &doc(value), WriteMode::Replace)?;
        Ok(())
    }

    pub fn save(&mut self, path: &str, patch: Value, base_version: u64) -> Result<SaveOutcome, EngineError> {
        self.service
            .save(SaveRequest::new(path, doc(patch), base_version, "tester"))
    }

    pub fn document(&self, path: &str) -> Result<Option<Document>, EngineError> {
        Ok(self.service.read(path)?.map(|stored| stored.data))
    }

    /// Stored version, 0 when the document is absent.
    pub fn version(&self, path: &str) -> Result<u64, EngineError> {
        Ok(self.service.read(path)?.map_or(0, |stored| stored.version))
    }
}
