use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::AuditId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditKind {
    #[serde(rename = "settings.save")]
    Save,
    #[serde(rename = "settings.migrate")]
    Migrate,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Save => "settings.save",
            Self::Migrate => "settings.migrate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "settings.save" => Some(Self::Save),
            "settings.migrate" => Some(Self::Migrate),
            _ => None,
        }
    }
}

/// One recorded settings transition. Holds the diff, never the documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditId,
    #[serde(rename = "type")]
    pub kind: AuditKind,
    pub path: String,
    pub ts: String,
    pub by: String,
    pub ua: Option<String>,
    /// Version after the transition.
    pub version: u64,
    /// Byte size of the serialized after-document.
    pub size: u64,
    pub diff: Value,
}
