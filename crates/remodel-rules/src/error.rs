//! Error types for rule application
//!
//! Provides the [`RewriteError`] taxonomy:
//! - Structural problems local to one rule (missing replacement, malformed marker runs)
//! - Invalid rule or partitioner configuration, raised at activation
//! - Store failures, always propagated
//!
//! Unmappable template properties are not errors; they are dropped or
//! defaulted while instantiating.

use remodel_tree::StoreError;

/// Classification of a [`RewriteError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Problem local to one rule application
    Structural,
    /// Invalid rule or partitioner configuration
    Configuration,
    /// Failure of the tree store
    Store,
}

/// Failure while building, matching or applying rules
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    /// Rule record has no `replacement` definition
    #[error("rule {rule} does not define a replacement")]
    MissingReplacement {
        /// Rule id
        rule: String,
    },

    /// Column marker run changed between matching and applying
    #[error("malformed marker run at {node}: {reason}")]
    MalformedMarkerRun {
        /// Path of the first marker
        node: String,
        /// What was found
        reason: String,
    },

    /// Other structural problem while applying a rule
    #[error("structural error in rule {rule}: {reason}")]
    Structural {
        /// Rule id
        rule: String,
        /// What went wrong
        reason: String,
    },

    /// Invalid configuration detected at activation
    #[error("invalid configuration for '{field}': {reason}")]
    Configuration {
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// Tree store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Rewrite did not reach a fixed point
    #[error("no fixed point after {0} passes")]
    PassLimitExceeded(usize),
}

impl RewriteError {
    /// Taxonomy bucket of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingReplacement { .. }
            | Self::MalformedMarkerRun { .. }
            | Self::Structural { .. }
            | Self::PassLimitExceeded(_) => ErrorKind::Structural,
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Store(_) => ErrorKind::Store,
        }
    }

    /// Create configuration error
    #[inline]
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create structural error
    #[inline]
    pub fn structural(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Structural {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    /// Create malformed-marker error
    #[inline]
    pub fn malformed_run(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedMarkerRun {
            node: node.into(),
            reason: reason.into(),
        }
    }
}
