//! Error types for the cast analysis pipeline
//!
//! Only malformed top-level input, bad configuration and bad rule tables are
//! fatal. Everything chapter-scoped is absorbed and surfaced as warnings.

use std::time::Duration;
use thiserror::Error;

/// Fatal, run-level errors
#[derive(Debug, Error)]
pub enum CastError {
    #[error("chapter at position {index} has an empty id")]
    MissingChapterId { index: usize },

    #[error("duplicate chapter id `{0}`")]
    DuplicateChapterId(String),

    #[error("chapters `{first}` and `{second}` share ordinal {ordinal}")]
    DuplicateOrdinal {
        ordinal: u32,
        first: String,
        second: String,
    },

    #[error("malformed chapter input: {0}")]
    MalformedInput(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Rules(#[from] RuleError),

    #[error("analysis cancelled before extraction started")]
    Cancelled,
}

/// Configuration loading / validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Rule table compilation errors
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("pattern `{pattern}` has no capture group `{group}`")]
    MissingGroup { pattern: String, group: String },

    #[error("relation rule `{0}` must name an explicit relation type")]
    ImplicitRelationType(String),

    #[error("failed to build automaton: {0}")]
    Automaton(#[from] aho_corasick::BuildError),
}

/// Failures of the optional name suggestion service
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("suggestion service timed out after {0:?}")]
    Timeout(Duration),

    #[error("suggestion service unavailable: {0}")]
    Unavailable(String),

    #[error("suggestion service worker disconnected")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, CastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CastError::DuplicateOrdinal {
            ordinal: 3,
            first: "v1c3".to_string(),
            second: "v2c3".to_string(),
        };
        assert_eq!(err.to_string(), "chapters `v1c3` and `v2c3` share ordinal 3");

        let err = ServiceError::Timeout(Duration::from_millis(250));
        assert!(err.to_string().contains("250ms"));
    }

    #[test]
    fn test_config_error_converts() {
        let err: CastError = ConfigError::InvalidValue {
            field: "min_name_length",
            reason: "must be at least 1".to_string(),
        }
        .into();
        assert!(matches!(err, CastError::Config(_)));
    }
}
