//! Staged access to a tree
//!
//! A [`Session`] hands out the working tree and decides what becomes durable.
//! Rewrites mutate the working tree freely and then either commit once or
//! discard everything.

use crate::error::StoreError;
use crate::tree::Tree;

/// Transactional handle on one tree
///
/// Sessions are owned by exactly one rewrite at a time.
pub trait Session {
    /// Working tree
    fn tree(&self) -> &Tree;

    /// Mutable working tree
    fn tree_mut(&mut self) -> &mut Tree;

    /// Make all staged changes durable
    ///
    /// # Errors
    /// Returns error if the backend refuses the changes
    fn commit(&mut self) -> Result<(), StoreError>;

    /// Drop all staged changes
    ///
    /// # Errors
    /// Returns error if the backend cannot restore its state
    fn discard(&mut self) -> Result<(), StoreError>;

    /// Whether the working tree differs from the last committed state
    fn has_pending_changes(&self) -> bool;
}

/// In-memory session keeping a committed snapshot next to the working tree
#[derive(Debug, Clone)]
pub struct MemorySession {
    committed: Tree,
    working: Tree,
    commits: usize,
}

impl MemorySession {
    /// Open a session on a tree, treating its current state as committed
    #[must_use]
    pub fn new(tree: Tree) -> Self {
        Self {
            committed: tree.clone(),
            working: tree,
            commits: 0,
        }
    }

    /// Last committed state
    #[inline]
    #[must_use]
    pub fn committed(&self) -> &Tree {
        &self.committed
    }

    /// Number of successful commits
    #[inline]
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commits
    }

    /// Consume the session, returning the committed tree
    #[must_use]
    pub fn into_committed(self) -> Tree {
        self.committed
    }
}

impl Session for MemorySession {
    fn tree(&self) -> &Tree {
        &self.working
    }

    fn tree_mut(&mut self) -> &mut Tree {
        &mut self.working
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.committed = self.working.clone();
        self.commits += 1;
        Ok(())
    }

    fn discard(&mut self) -> Result<(), StoreError> {
        self.working = self.committed.clone();
        Ok(())
    }

    fn has_pending_changes(&self) -> bool {
        self.working.revision() != self.committed.revision()
    }
}
