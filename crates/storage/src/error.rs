use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt document at {path}: checksum mismatch")]
    Corrupt { path: String },

    #[error("core error: {0}")]
    Core(#[from] settingsdoc_core::CoreError),
}
