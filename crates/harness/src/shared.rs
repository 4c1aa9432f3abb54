use std::path::{Path, PathBuf};

use settingsdoc_engine::EngineError;
use tempfile::TempDir;

use crate::TestSite;

/// A database file several sites connect to, one connection each.
pub struct SharedDatabase {
    _dir: TempDir,
    path: PathBuf,
}

impl SharedDatabase {
    pub fn new() -> std::io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("settings.db");
        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a new site on its own connection to the shared file.
    pub fn connect(&self) -> Result<TestSite, EngineError> {
        TestSite::open(&self.path)
    }

    pub fn connect_many(&self, count: usize) -> Result<Vec<TestSite>, EngineError> {
        (0..count).map(|_| self.connect()).collect()
    }
}
