//! Error types for tree storage

use crate::path::PathError;
use crate::tree::NodeId;

/// Failure reported by the tree or the session holding it
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Handle does not point to a live node
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// Sibling with the same name already exists
    #[error("name collision: '{name}' already exists under {parent}")]
    NameCollision {
        /// Path of the parent node
        parent: String,
        /// Colliding name
        name: String,
    },

    /// Named child does not exist
    #[error("child '{name}' not found under {parent}")]
    ChildNotFound {
        /// Path of the parent node
        parent: String,
        /// Missing name
        name: String,
    },

    /// Structural operation not allowed on this node
    #[error("invalid operation on {node}: {reason}")]
    InvalidOperation {
        /// Path of the node
        node: String,
        /// What went wrong
        reason: String,
    },

    /// Path could not be parsed
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),

    /// Failure of the persistence backend behind a session
    #[error("backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create an invalid-operation error
    #[inline]
    pub fn invalid_operation(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            node: node.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let err = StoreError::NameCollision {
            parent: "/content".to_string(),
            name: "page".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "name collision: 'page' already exists under /content"
        );
    }

    #[test]
    fn path_error_converts() {
        let err: StoreError = PathError::EmptySegment("a//b".to_string()).into();
        assert!(matches!(err, StoreError::InvalidPath(_)));
    }
}
