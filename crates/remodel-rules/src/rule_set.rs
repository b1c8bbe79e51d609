//! Rule providers and ranked rule sets
//!
//! Provides [`RuleSet`], the immutable, ranked list of rules a rewrite runs
//! with, and [`RuleProvider`] for the sources it is assembled from.

use std::sync::Arc;

use remodel_tree::{NodeId, Tree};

use crate::error::RewriteError;
use crate::rule::Rule;

/// Named source of rules
pub trait RuleProvider: Send + Sync + std::fmt::Debug {
    /// Provider name (for logging)
    fn name(&self) -> &str;

    /// Rules in provider order
    fn rules(&self) -> Vec<Arc<dyn Rule>>;
}

/// Provider over a fixed list of rules
#[derive(Debug, Clone)]
pub struct StaticRuleProvider {
    name: String,
    rules: Vec<Arc<dyn Rule>>,
}

impl StaticRuleProvider {
    /// Create provider
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, rules: Vec<Arc<dyn Rule>>) -> Self {
        Self {
            name: name.into(),
            rules,
        }
    }

    /// Add a rule, returning the provider
    #[must_use]
    pub fn with_rule(mut self, rule: Arc<dyn Rule>) -> Self {
        self.rules.push(rule);
        self
    }
}

impl RuleProvider for StaticRuleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn rules(&self) -> Vec<Arc<dyn Rule>> {
        self.rules.clone()
    }
}

/// Ranked, read-only list of rules
///
/// Sorted by ranking (lower first). Ties keep provider order, then the order
/// within each provider.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Arc<dyn Rule>>,
}

impl RuleSet {
    /// Create empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge providers in order
    #[must_use]
    pub fn from_providers<'a>(providers: impl IntoIterator<Item = &'a dyn RuleProvider>) -> Self {
        let mut rules = Vec::new();
        for provider in providers {
            let provided = provider.rules();
            tracing::debug!(provider = provider.name(), rules = provided.len(), "collected rules");
            rules.extend(provided);
        }
        Self::from_rules(rules)
    }

    /// Rank a plain list of rules
    #[must_use]
    pub fn from_rules(mut rules: Vec<Arc<dyn Rule>>) -> Self {
        rules.sort_by_key(|rule| rule.ranking());
        Self { rules }
    }

    /// Rules in ranking order
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    /// Iterate over rules in ranking order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Rule>> {
        self.rules.iter()
    }

    /// Get number of rules
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if set is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Look up a rule by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Rule>> {
        self.rules.iter().find(|rule| rule.id() == id)
    }

    /// Rule ids in ranking order
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.rules.iter().map(|rule| rule.id()).collect()
    }

    /// First rule, in ranking order, that matches `node`
    ///
    /// # Errors
    /// Propagates store errors
    pub fn first_match(
        &self,
        tree: &Tree,
        node: NodeId,
    ) -> Result<Option<&Arc<dyn Rule>>, RewriteError> {
        for rule in &self.rules {
            if rule.matches(tree, node)? {
                return Ok(Some(rule));
            }
        }
        Ok(None)
    }

    /// Nodes of the subtree at `root` that some rule matches, in pre-order
    ///
    /// Read-only; useful to decide which trees need rewriting at all.
    ///
    /// # Errors
    /// Propagates store errors
    pub fn find_matches(&self, tree: &Tree, root: NodeId) -> Result<Vec<NodeId>, RewriteError> {
        let mut found = Vec::new();
        for node in tree.descendants(root)? {
            if self.first_match(tree, node)?.is_some() {
                found.push(node);
            }
        }
        Ok(found)
    }
}
