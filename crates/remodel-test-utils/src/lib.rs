//! Testing utilities for the remodel workspace
//!
//! Shared fixtures for trees, rules and column-control runs.

#![allow(missing_docs)]

use std::sync::Arc;

use parking_lot::Mutex;
use remodel_rules::column_control::{BREAK, CONTROL_TYPE, DEFAULT_RESOURCE_TYPE, END, LAYOUT, RESOURCE_TYPE};
use remodel_rules::{FinalNodeSet, NodeBasedRule, RewriteError, Rule};
use remodel_tree::{MemorySession, NodeId, NodeRecord, StoreOptions, Tree, DEFAULT_TYPE};

/// Rule turning a `panel` with an `items` list into a `container`
pub const PANEL_RULE: &str = r"
name: panel
children:
  - name: patterns
    children:
      - name: panel
        type: panel
        children:
          - name: items
            type: list
  - name: replacement
    children:
      - name: container
        type: container
        properties:
          sling:resourceType: ${./title:untitled}
";

pub fn create_tree(yaml: &str) -> Tree {
    let record = NodeRecord::from_yaml(yaml).unwrap();
    Tree::from_record(&record, StoreOptions::default()).unwrap()
}

pub fn create_session(yaml: &str) -> MemorySession {
    MemorySession::new(create_tree(yaml))
}

pub fn create_rule(yaml: &str) -> Arc<NodeBasedRule> {
    let record = NodeRecord::from_yaml(yaml).unwrap();
    Arc::new(NodeBasedRule::from_record(format!("/rules/{}", record.name), &record).unwrap())
}

pub fn create_panel_rule() -> Arc<NodeBasedRule> {
    create_rule(PANEL_RULE)
}

/// Rule replacing every node of type `from` by a `to` node keeping its children
pub fn create_retype_rule(from: &str, to: &str) -> Arc<NodeBasedRule> {
    create_rule(&format!(
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

pub fn child_names(tree: &Tree, node: NodeId) -> Vec<String> {
    tree.children(node)
        .unwrap()
        .iter()
        .map(|child| tree.name(*child).unwrap().to_string())
        .collect()
}

pub fn child(tree: &Tree, node: NodeId, name: &str) -> NodeId {
    tree.child(node, name)
        .unwrap()
        .unwrap_or_else(|| panic!("{} has no child {name}", tree.path(node).unwrap()))
}

/// YAML dump of a subtree for readable assertions
pub fn snapshot(tree: &Tree, node: NodeId) -> String {
    tree.export(node).unwrap().to_yaml().unwrap()
}

pub fn add_content(tree: &mut Tree, parent: NodeId, name: &str) -> NodeId {
    let node = tree.add_child(parent, name, DEFAULT_TYPE).unwrap();
    tree.set_property(node, RESOURCE_TYPE, "foundation/components/text")
        .unwrap();
    node
}

/// Append a complete marker run, one marker between each group of content names
pub fn add_column_run(tree: &mut Tree, parent: NodeId, layout: &str, columns: &[&[&str]]) -> NodeId {
    let marker = |tree: &mut Tree| {
        let name = tree.unique_child_name(parent, "colctrl").unwrap();
        let node = tree.add_child(parent, &name, DEFAULT_TYPE).unwrap();
        tree.set_property(node, RESOURCE_TYPE, DEFAULT_RESOURCE_TYPE)
            .unwrap();
        node
    };

    let start = marker(tree);
    tree.set_property(start, LAYOUT, layout).unwrap();
    for (index, names) in columns.iter().enumerate() {
        if index > 0 {
            let split = marker(tree);
            tree.set_property(split, CONTROL_TYPE, BREAK).unwrap();
        }
        for name in names.iter() {
            add_content(tree, parent, name);
        }
    }
    let end = marker(tree);
    tree.set_property(end, CONTROL_TYPE, END).unwrap();
    start
}

/// Rule wrapper recording every node passed to `matches`
#[derive(Debug)]
pub struct RecordingRule {
    inner: Arc<dyn Rule>,
    seen: Mutex<Vec<NodeId>>,
}

impl RecordingRule {
    pub fn new(inner: Arc<dyn Rule>) -> Self {
        Self {
            inner,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<NodeId> {
        self.seen.lock().clone()
    }
}

impl Rule for RecordingRule {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn ranking(&self) -> i32 {
        self.inner.ranking()
    }

    fn matches(&self, tree: &Tree, node: NodeId) -> Result<bool, RewriteError> {
        self.seen.lock().push(node);
        self.inner.matches(tree, node)
    }

    fn apply(
        &self,
        tree: &mut Tree,
        node: NodeId,
        finals: &mut FinalNodeSet,
    ) -> Result<Option<NodeId>, RewriteError> {
        self.inner.apply(tree, node, finals)
    }
}

/// Rule matching a type and failing on apply
#[derive(Debug)]
pub struct FailingRule {
    pub type_tag: String,
}

impl Rule for FailingRule {
    fn id(&self) -> &str {
        "failing"
    }

    fn matches(&self, tree: &Tree, node: NodeId) -> Result<bool, RewriteError> {
        Ok(tree.type_tag(node)? == self.type_tag)
    }

    fn apply(
        &self,
        tree: &mut Tree,
        node: NodeId,
        _finals: &mut FinalNodeSet,
    ) -> Result<Option<NodeId>, RewriteError> {
        tree.set_property(node, "touched", true)?;
        Err(RewriteError::structural("failing", "refusing to apply"))
    }
}
