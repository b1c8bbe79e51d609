//! Fixed-point rewriting of one tree
//!
//! A rewrite runs passes over the subtree below a start node until a pass
//! applies no rule. Each pass is a pre-order walk that applies at most one
//! rule, at the first node some rule matches; the rest of the pass only keeps
//! sibling order intact.
//!
//! # Pass walk
//!
//! - Sibling groups are walked live: the next node visited is the first child
//!   of the parent not yet visited in this pass, so nodes inserted or removed
//!   by a rule are picked up correctly.
//! - After a node has been tested it is re-appended to the end of its parent
//!   if the parent's children are order-sensitive. Visiting every child this
//!   way leaves the group in its original relative order.
//! - Nodes that match no rule join the [`FinalNodeSet`] and are never tested
//!   again during the same rewrite.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use remodel_rules::{FinalNodeSet, RewriteError, RuleSet};
use remodel_tree::{NodeId, Session, Tree};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Default bound on passes per rewrite
pub const DEFAULT_MAX_PASSES: usize = 10_000;

/// Rewrite limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Passes allowed before the rewrite is aborted
    pub max_passes: usize,
}

impl RewriteConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With pass limit
    #[inline]
    #[must_use]
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

/// State of the current pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassState {
    /// Walking, no rule applied yet
    Scanning,
    /// A rule was applied during this pass
    Matched,
    /// A full pass applied no rule
    Stable,
}

/// Outcome of a rewrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteReport {
    /// Node standing at the start position, `None` if it was removed
    pub root: Option<NodeId>,
    /// Passes run, including the final stable one
    pub passes: usize,
    /// Rule applications
    pub applications: usize,
    /// Ids of the applied rules, in application order
    pub applied_rules: Vec<String>,
}

impl RewriteReport {
    /// Check if no rule was applied
    #[inline]
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.applications == 0
    }
}

/// Rewrites trees to a fixed point with a shared rule set
///
/// The rewriter is immutable; one instance can serve concurrent rewrites of
/// different sessions.
#[derive(Debug, Clone)]
pub struct TreeRewriter {
    rules: Arc<RuleSet>,
    config: RewriteConfig,
}

impl TreeRewriter {
    /// Create rewriter with default limits
    #[must_use]
    pub fn new(rules: impl Into<Arc<RuleSet>>) -> Self {
        Self {
            rules: rules.into(),
            config: RewriteConfig::default(),
        }
    }

    /// With limits
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: RewriteConfig) -> Self {
        self.config = config;
        self
    }

    /// Rules in ranking order
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Limits
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }

    /// Rewrite the subtree at `root`, returning the node now standing there
    ///
    /// # Errors
    /// See [`TreeRewriter::rewrite_with_report`]
    pub fn rewrite<S>(&self, session: &mut S, root: NodeId) -> Result<Option<NodeId>, RewriteError>
    where
        S: Session + ?Sized,
    {
        self.rewrite_with_report(session, root).map(|report| report.root)
    }

    /// Rewrite the subtree at `root` and report what happened
    ///
    /// Commits the session once after the fixed point is reached. On any
    /// error the session is discarded; a failing discard is logged and the
    /// original error is returned.
    ///
    /// # Errors
    /// Returns the first rule or store error, or
    /// [`RewriteError::PassLimitExceeded`] if no fixed point is reached
    pub fn rewrite_with_report<S>(
        &self,
        session: &mut S,
        root: NodeId,
    ) -> Result<RewriteReport, RewriteError>
    where
        S: Session + ?Sized,
    {
        let started = Instant::now();
        let outcome = self.run(session.tree_mut(), root).and_then(|report| {
            session.commit()?;
            Ok(report)
        });

        match outcome {
            Ok(report) => {
                info!(
                    passes = report.passes,
                    applications = report.applications,
                    elapsed_ms = started.elapsed().as_millis(),
                    "rewrote tree"
                );
                Ok(report)
            }
            Err(err) => {
                debug!(error = %err, "rewrite failed, discarding changes");
                if let Err(discard) = session.discard() {
                    warn!(error = %discard, "failed to discard changes after rewrite error");
                }
                Err(err)
            }
        }
    }

    fn run(&self, tree: &mut Tree, root: NodeId) -> Result<RewriteReport, RewriteError> {
        let mut finals = FinalNodeSet::new();
        let mut report = RewriteReport {
            root: Some(root),
            passes: 0,
            applications: 0,
            applied_rules: Vec::new(),
        };

        let mut start = Some(root);
        while let Some(current) = start {
            if report.passes >= self.config.max_passes {
                return Err(RewriteError::PassLimitExceeded(self.config.max_passes));
            }
            report.passes += 1;

            let mut pass = Pass::new(&self.rules, &mut finals);
            start = pass.walk(tree, current)?;
            let (state, applied) = pass.finish();
            debug!(pass = report.passes, state = ?state, rule = ?applied, "pass finished");

            match applied {
                Some(rule) => {
                    report.applications += 1;
                    report.applied_rules.push(rule);
                }
                None => break,
            }
        }

        report.root = start;
        Ok(report)
    }
}

struct Pass<'a> {
    rules: &'a RuleSet,
    finals: &'a mut FinalNodeSet,
    visited: HashSet<NodeId>,
    state: PassState,
    applied: Option<String>,
}

impl<'a> Pass<'a> {
    fn new(rules: &'a RuleSet, finals: &'a mut FinalNodeSet) -> Self {
        Self {
            rules,
            finals,
            visited: HashSet::new(),
            state: PassState::Scanning,
            applied: None,
        }
    }

    fn finish(self) -> (PassState, Option<String>) {
        let state = match self.state {
            PassState::Scanning => PassState::Stable,
            other => other,
        };
        (state, self.applied)
    }

    /// Walk the subtree of `start`, returning the node standing in its place
    ///
    /// The walk keeps an explicit stack of open parents, so document depth
    /// does not grow the call stack.
    fn walk(&mut self, tree: &mut Tree, start: NodeId) -> Result<Option<NodeId>, RewriteError> {
        let Some(start) = self.enter(tree, start, false)? else {
            return Ok(None);
        };
        let mut open = vec![start];
        while let Some(&parent) = open.last() {
            match self.next_unvisited(tree, parent)? {
                Some(child) => {
                    if let Some(current) = self.enter(tree, child, true)? {
                        open.push(current);
                    }
                }
                None => {
                    open.pop();
                }
            }
        }
        Ok(Some(start))
    }

    /// Test one node, then re-append whatever stands in its place
    fn enter(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        reorder: bool,
    ) -> Result<Option<NodeId>, RewriteError> {
        self.visited.insert(node);
        let mut current = node;

        if self.state == PassState::Scanning && !self.finals.contains(node) {
            let rules = self.rules;
            if let Some(rule) = rules.first_match(tree, node)? {
                debug!(rule = rule.id(), node = %tree.path(node)?, "rule matched");
                self.state = PassState::Matched;
                self.applied = Some(rule.id().to_string());
                match rule.apply(tree, node, self.finals)? {
                    Some(replacement) => {
                        current = replacement;
                        self.visited.insert(current);
                    }
                    None => return Ok(None),
                }
            } else {
                self.finals.insert(node);
            }
        }

        if reorder {
            if let Some(parent) = tree.parent(current)? {
                if tree.is_orderable(parent)? {
                    tree.order_before(current, None)?;
                }
            }
        }
        Ok(Some(current))
    }

    fn next_unvisited(&self, tree: &Tree, parent: NodeId) -> Result<Option<NodeId>, RewriteError> {
        Ok(tree
            .children(parent)?
            .iter()
            .copied()
            .find(|child| !self.visited.contains(child)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use remodel_rules::{NodeBasedRule, Rule};
    use remodel_tree::{MemorySession, NodeRecord, StoreOptions};

    fn rule(yaml: &str) -> Arc<dyn Rule> {
        let record = NodeRecord::from_yaml(yaml).unwrap();
        Arc::new(NodeBasedRule::from_record(record.name.clone(), &record).unwrap())
    }

    fn retype(from: &str, to: &str) -> Arc<dyn Rule> {
        rule(&format!(
            r"
name: {from}-to-{to}
children:
  - name: patterns
    children:
      - name: p
        type: {from}
  - name: replacement
    children:
      - name: r
        type: {to}
        properties:
          cq:copyChildren: true
"
        ))
    }

    fn session(record: &NodeRecord) -> MemorySession {
        MemorySession::new(Tree::from_record(record, StoreOptions::default()).unwrap())
    }

    fn names(tree: &Tree, node: NodeId) -> Vec<String> {
        tree.children(node)
            .unwrap()
            .iter()
            .map(|c| tree.name(*c).unwrap().to_string())
            .collect()
    }

    #[test]
    fn rewrite_config_defaults() {
        assert_eq!(RewriteConfig::new().max_passes, DEFAULT_MAX_PASSES);
        assert_eq!(RewriteConfig::new().with_max_passes(3).max_passes, 3);
        let parsed: RewriteConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, RewriteConfig::default());
    }

    #[test]
    fn rewrite_applies_one_rule_per_pass_and_keeps_order() {
        let record = NodeRecord::unstructured("content")
            .with_child(NodeRecord::new("a", "old"))
            .with_child(NodeRecord::unstructured("b"))
            .with_child(NodeRecord::new("c", "old"))
            .with_child(NodeRecord::unstructured("d"));
        let mut session = session(&record);
        let root = session.tree().root();

        let rewriter = TreeRewriter::new(RuleSet::from_rules(vec![retype("old", "new")]));
        let report = rewriter.rewrite_with_report(&mut session, root).unwrap();

        assert_eq!(report.applications, 2);
        assert_eq!(report.passes, 3);
        assert_eq!(report.root, Some(root));
        let tree = session.committed();
        assert_eq!(names(tree, root), vec!["a", "b", "c", "d"]);
        let c = tree.child(root, "c").unwrap().unwrap();
        assert_eq!(tree.type_tag(c).unwrap(), "new");
        assert_eq!(session.commit_count(), 1);
    }

    #[test]
    fn rewrite_without_rules_is_unchanged() {
        let record = NodeRecord::unstructured("content").with_child(NodeRecord::unstructured("a"));
        let mut session = session(&record);
        let root = session.tree().root();
        let report = TreeRewriter::new(RuleSet::new())
            .rewrite_with_report(&mut session, root)
            .unwrap();
        assert!(report.is_unchanged());
        assert_eq!(report.passes, 1);
        assert_eq!(session.tree().export(root).unwrap(), record);
    }

    #[test]
    fn rewrite_reassigns_replaced_start() {
        let record = NodeRecord::unstructured("content")
            .with_child(NodeRecord::new("panel", "old").with_child(NodeRecord::unstructured("x")));
        let mut session = session(&record);
        let panel = session.tree().child(session.tree().root(), "panel").unwrap().unwrap();

        let rewriter = TreeRewriter::new(RuleSet::from_rules(vec![retype("old", "new")]));
        let new_root = rewriter.rewrite(&mut session, panel).unwrap().unwrap();

        assert_ne!(new_root, panel);
        assert_eq!(session.tree().type_tag(new_root).unwrap(), "new");
        assert_eq!(names(session.tree(), new_root), vec!["x"]);
    }

    #[test]
    fn rewrite_removed_start_ends_rewrite() {
        let remove = rule(
            r"
name: drop
children:
  - name: patterns
    children:
      - name: p
        type: junk
  - name: replacement
",
        );
        let record = NodeRecord::unstructured("content").with_child(NodeRecord::new("j", "junk"));
        let mut session = session(&record);
        let junk = session.tree().child(session.tree().root(), "j").unwrap().unwrap();

        let report = TreeRewriter::new(RuleSet::from_rules(vec![remove]))
            .rewrite_with_report(&mut session, junk)
            .unwrap();
        assert_eq!(report.root, None);
        assert_eq!(report.passes, 1);
        assert!(!session.committed().contains(junk));
    }

    #[test]
    fn rewrite_stops_at_pass_limit_and_discards() {
        let record = NodeRecord::unstructured("content").with_child(NodeRecord::new("a", "ping"));
        let mut session = session(&record);
        let root = session.tree().root();
        let rules = RuleSet::from_rules(vec![retype("ping", "pong"), retype("pong", "ping")]);

        let err = TreeRewriter::new(rules)
            .with_config(RewriteConfig::new().with_max_passes(5))
            .rewrite(&mut session, root)
            .unwrap_err();

        assert!(matches!(err, RewriteError::PassLimitExceeded(5)));
        assert!(!session.has_pending_changes());
        assert_eq!(session.tree().export(root).unwrap(), record);
    }

    #[test]
    fn rewrite_keeps_unordered_groups_untouched() {
        let record = NodeRecord::new("folder", "nt:folder")
            .with_child(NodeRecord::unstructured("b"))
            .with_child(NodeRecord::unstructured("a"));
        let mut session = session(&record);
        let root = session.tree().root();
        let before = session.tree().revision();
        TreeRewriter::new(RuleSet::new()).rewrite(&mut session, root).unwrap();
        assert_eq!(session.tree().revision(), before);
        assert_eq!(names(session.tree(), root), vec!["b", "a"]);
    }

    #[test]
    fn rewrite_walks_deep_documents() {
        let mut tree = Tree::new("content", "nt:unstructured");
        let mut parent = tree.root();
        for _ in 0..20_000 {
            parent = tree.add_child(parent, "n", "nt:unstructured").unwrap();
        }
        let leaf = tree.add_child(parent, "leaf", "old").unwrap();
        let mut session = MemorySession::new(tree);
        let root = session.tree().root();

        let report = TreeRewriter::new(RuleSet::from_rules(vec![retype("old", "new")]))
            .rewrite_with_report(&mut session, root)
            .unwrap();

        assert_eq!(report.applications, 1);
        assert_eq!(report.passes, 2);
        let tree = session.committed();
        assert!(!tree.contains(leaf));
        let replaced = tree.child(parent, "leaf").unwrap().unwrap();
        assert_eq!(tree.type_tag(replaced).unwrap(), "new");
        assert_eq!(tree.node_count(), 20_002);
    }
}
