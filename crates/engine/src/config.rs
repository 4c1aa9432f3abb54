//! Engine configuration.

use serde::Deserialize;

use settingsdoc_core::legacy::MIGRATION_AUTHOR;

use crate::error::EngineError;

pub const DEFAULT_SETTINGS_PATH: &str = "settings/main";
pub const DEFAULT_LEGACY_APPEARANCE_PATH: &str = "settings/appearance";

/// Default cap on a serialized audit diff: 64 KiB.
pub const DEFAULT_AUDIT_MAX_DIFF_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Path of the main settings document.
    pub settings_path: String,
    /// Standalone appearance document written by older deployments.
    pub legacy_appearance_path: String,
    /// `updatedBy` stamp for migration writes.
    pub migration_author: String,
    pub audit_max_diff_bytes: usize,
    pub audit_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settings_path: DEFAULT_SETTINGS_PATH.into(),
            legacy_appearance_path: DEFAULT_LEGACY_APPEARANCE_PATH.into(),
            migration_author: MIGRATION_AUTHOR.into(),
            audit_max_diff_bytes: DEFAULT_AUDIT_MAX_DIFF_BYTES,
            audit_enabled: true,
        }
    }
}

impl EngineConfig {
    /// Reads configuration from environment variables, falling back to the
    /// defaults for anything unset.
    ///
    /// | Variable                              | Default               |
    /// |---------------------------------------|-----------------------|
    /// | `SETTINGSDOC_SETTINGS_PATH`           | `settings/main`       |
    /// | `SETTINGSDOC_LEGACY_APPEARANCE_PATH`  | `settings/appearance` |
    /// | `SETTINGSDOC_MIGRATION_AUTHOR`        | `migration:DF-246`    |
    /// | `SETTINGSDOC_AUDIT_MAX_DIFF_BYTES`    | `65536`               |
    /// | `SETTINGSDOC_AUDIT_ENABLED`           | `true`                |
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EngineError> {
        let mut config = Self::default();
        if let Some(v) = lookup("SETTINGSDOC_SETTINGS_PATH") {
            config.settings_path = v;
        }
        if let Some(v) = lookup("SETTINGSDOC_LEGACY_APPEARANCE_PATH") {
            config.legacy_appearance_path = v;
        }
        if let Some(v) = lookup("SETTINGSDOC_MIGRATION_AUTHOR") {
            config.migration_author = v;
        }
        if let Some(v) = lookup("SETTINGSDOC_AUDIT_MAX_DIFF_BYTES") {
            config.audit_max_diff_bytes = v.trim().parse().map_err(|_| {
                EngineError::InvalidConfig(format!("SETTINGSDOC_AUDIT_MAX_DIFF_BYTES: not a byte count: {v}"))
            })?;
        }
        if let Some(v) = lookup("SETTINGSDOC_AUDIT_ENABLED") {
            config.audit_enabled = parse_bool(&v).ok_or_else(|| {
                EngineError::InvalidConfig(format!("SETTINGSDOC_AUDIT_ENABLED: not a boolean: {v}"))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.settings_path.trim().is_empty() {
            return Err(EngineError::InvalidConfig("settings_path is empty".into()));
        }
        if self.legacy_appearance_path.trim().is_empty() {
            return Err(EngineError::InvalidConfig(
                "legacy_appearance_path is empty".into(),
            ));
        }
        if self.migration_author.trim().is_empty() {
            return Err(EngineError::InvalidConfig("migration_author is empty".into()));
        }
        Ok(())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.migration_author, "migration:DF-246");
        assert_eq!(config.audit_max_diff_bytes, 65536);
    }

    #[test]
    fn env_overrides_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("SETTINGSDOC_SETTINGS_PATH", "site/settings"),
            ("SETTINGSDOC_AUDIT_MAX_DIFF_BYTES", "1024"),
            ("SETTINGSDOC_AUDIT_ENABLED", "off"),
        ]))
        .unwrap();
        assert_eq!(config.settings_path, "site/settings");
        assert_eq!(config.audit_max_diff_bytes, 1024);
        assert!(!config.audit_enabled);
        assert_eq!(config.legacy_appearance_path, DEFAULT_LEGACY_APPEARANCE_PATH);
    }

    #[test]
    fn bad_env_values_are_rejected() {
        let err = EngineConfig::from_lookup(lookup(&[("SETTINGSDOC_AUDIT_MAX_DIFF_BYTES", "lots")]));
        assert!(matches!(err, Err(EngineError::InvalidConfig(_))));

        let err = EngineConfig::from_lookup(lookup(&[("SETTINGSDOC_MIGRATION_AUTHOR", "  ")]));
        assert!(matches!(err, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn deserialize_fills_missing_fields() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"settingsPath": "a/b", "auditEnabled": false}"#).unwrap();
        assert_eq!(config.settings_path, "a/b");
        assert!(!config.audit_enabled);
        assert_eq!(config.migration_author, MIGRATION_AUTHOR);
    }
}
