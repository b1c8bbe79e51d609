//! Error types for engine configuration
//!
//! Rewrite failures use [`remodel_rules::RewriteError`]; this module covers
//! reading configuration, rule definition files and documents.

use std::path::PathBuf;

use remodel_rules::RewriteError;
use remodel_tree::RecordError;

/// Failure while loading configuration or assembling rules
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Invalid YAML configuration
    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid JSON configuration
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid node record file
    #[error("invalid record in {}: {source}", .path.display())]
    Record {
        /// File that was parsed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: RecordError,
    },

    /// File extension is neither YAML nor JSON
    #[error("unsupported file format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Rule construction or activation failed
    #[error("rule setup failed: {0}")]
    Rules(#[from] RewriteError),
}

impl ConfigError {
    /// Check if the error comes from rule activation rather than I/O or parsing
    #[inline]
    #[must_use]
    pub fn is_rule_error(&self) -> bool {
        matches!(self, Self::Rules(_))
    }

    /// Create I/O error for a path
    #[inline]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display_names_the_file() {
        let err = ConfigError::io(
            "rules/missing.yaml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.to_string(), "failed to read rules/missing.yaml: gone");
        assert!(!err.is_rule_error());

        let err = ConfigError::UnsupportedFormat(PathBuf::from("engine.toml"));
        assert_eq!(err.to_string(), "unsupported file format: engine.toml");
    }

    #[test]
    fn config_error_wraps_rule_errors() {
        let err: ConfigError = RewriteError::configuration("layout", "required").into();
        assert!(err.is_rule_error());
        assert!(err.to_string().contains("layout"));
    }
}
