//! Configuration for the feature pipeline.
//!
//! All settings are static tables; the defaults reproduce the reference
//! experiment. A JSON file can override any subset of them.

use crate::corrections::CorrectionTables;
use crate::error::ComputeError;
use crate::split::ManifestRules;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What to do with raw `command` / `prompt` lines, which bypass all rewriting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalLines {
    /// Record them into the session table unchanged
    #[default]
    Record,
    /// Ignore them; command/prompt facets then come only from the noise aliases
    Discard,
}

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shorten / correct session tables
    pub corrections: CorrectionTables,

    /// Manifest reference rewriting
    pub manifest: ManifestRules,

    /// Handling of raw command/prompt lines
    pub canonical_lines: CanonicalLines,

    /// File extension of session logs
    pub log_extension: LogExtension,
}

/// Session log file extension (without the dot)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogExtension(pub String);

impl Default for LogExtension {
    fn default() -> Self {
        Self("txt".to_string())
    }
}

impl LogExtension {
    pub fn matches(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == self.0.as_str())
    }
}

impl Config {
    /// Parse configuration JSON
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        serde_json::from_str(json).map_err(|e| ComputeError::Config(e.to_string()))
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ComputeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ComputeError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Load from `path` if given, else the built-in defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ComputeError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Save configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ComputeError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CorrectionPolicy, SessionKey};

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = Config::from_json(r#"{"canonical_lines": "discard"}"#).unwrap();
        assert_eq!(config.canonical_lines, CanonicalLines::Discard);
        assert_eq!(config.corrections, CorrectionTables::default());
        assert_eq!(config.manifest, ManifestRules::default());
        assert_eq!(config.log_extension.0, "txt");
    }

    #[test]
    fn test_conflicting_tables_fail_to_load() {
        let json = r#"{"corrections": {"shorten": {"01": ["a0"]}, "correct": {"01": ["a0"]}}}"#;
        let err = Config::from_json(json).unwrap_err();
        assert!(matches!(err, ComputeError::Config(_)));
        assert!(err.to_string().contains("a0"));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir()
            .join("itbn-features-config-test")
            .join("config.json");
        let mut config = Config::default();
        config.corrections = CorrectionTables::empty();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(
            loaded.corrections.resolve(&SessionKey::new("01", "a0")),
            CorrectionPolicy::None
        );
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_log_extension() {
        let ext = LogExtension::default();
        assert!(ext.matches(Path::new("labels/subject_01/a0.txt")));
        assert!(!ext.matches(Path::new("labels/subject_01/a0.csv")));
    }
}
