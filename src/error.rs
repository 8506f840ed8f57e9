//! Error types for ITBN feature extraction

use thiserror::Error;

/// Errors that can occur while normalizing sessions and building the feature table
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Malformed line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },

    #[error("Reward window opened but never closed")]
    UnclosedRewardWindow,

    #[error("Session {group}/{name} is listed in both the shorten and correct tables")]
    PolicyConflict { group: String, name: String },

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl ComputeError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        ComputeError::MalformedLine {
            line,
            reason: reason.into(),
        }
    }

    /// Whether this error only invalidates the session it was raised for
    pub fn is_session_local(&self) -> bool {
        matches!(
            self,
            ComputeError::MalformedLine { .. } | ComputeError::UnclosedRewardWindow
        )
    }
}
