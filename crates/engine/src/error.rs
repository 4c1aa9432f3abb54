use settingsdoc_core::CoreError;
use settingsdoc_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The document store failed. Fatal for the call; nothing retries.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
