//! Rule capability and core types
//!
//! Provides the [`Rule`] trait implemented by every rewrite rule, whether it
//! is built from a definition record or written in code.

use std::collections::HashSet;

use remodel_tree::{NodeId, Tree};

use crate::error::RewriteError;

/// Ranking of rules that do not declare one (lowest priority)
pub const DEFAULT_RANKING: i32 = i32::MAX;

/// Rewrite rule
///
/// Rules are immutable once built and shared read-only across concurrent
/// rewrites of different trees.
pub trait Rule: Send + Sync + std::fmt::Debug {
    /// Stable identifier (for logging and reports)
    fn id(&self) -> &str;

    /// Human-readable title
    fn title(&self) -> &str {
        self.id()
    }

    /// Priority, lower values are tried first
    fn ranking(&self) -> i32 {
        DEFAULT_RANKING
    }

    /// Check whether the subtree rooted at `node` matches this rule
    ///
    /// Never mutates the tree. "No match" is `Ok(false)`.
    ///
    /// # Errors
    /// Propagates store errors only
    fn matches(&self, tree: &Tree, node: NodeId) -> Result<bool, RewriteError>;

    /// Rewrite the subtree rooted at `node`
    ///
    /// Returns the node that now stands where `node` stood, or `None` when
    /// the subtree was removed. Nodes the rewrite must not revisit are added
    /// to `finals`.
    ///
    /// # Errors
    /// Returns structural errors local to this rule and propagated store errors
    fn apply(
        &self,
        tree: &mut Tree,
        node: NodeId,
        finals: &mut FinalNodeSet,
    ) -> Result<Option<NodeId>, RewriteError>;
}

/// Nodes excluded from further matching within one rewrite
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalNodeSet {
    nodes: HashSet<NodeId>,
}

impl FinalNodeSet {
    /// Create empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a node final, returning whether it was newly added
    #[inline]
    pub fn insert(&mut self, node: NodeId) -> bool {
        self.nodes.insert(node)
    }

    /// Mark a node and its whole subtree final
    ///
    /// # Errors
    /// Returns error if the node does not exist
    pub fn insert_subtree(&mut self, tree: &Tree, node: NodeId) -> Result<(), RewriteError> {
        self.nodes.extend(tree.descendants(node)?);
        Ok(())
    }

    /// Check if a node is final
    #[inline]
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// Number of final nodes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the set is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over final nodes (unordered)
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }
}
