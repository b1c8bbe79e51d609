//! Definition-driven rules
//!
//! A [`NodeBasedRule`] is built from a rule record:
//!
//! ```yaml
//! name: panel-to-container
//! properties:
//!   jcr:title: Panel to container
//!   cq:rewriteRanking: 10
//! children:
//!   - name: patterns
//!     children:
//!       - name: panel
//!         type: panel
//!   - name: replacement
//!     children:
//!       - name: container
//!         type: container
//!         properties:
//!           sling:resourceType: ${./title:untitled}
//! ```
//!
//! Applying a rule swaps the matched subtree for an instantiated copy of the
//! template, in the same position and under the same name.

use std::fmt;
use std::sync::Arc;

use remodel_tree::{NodeId, NodePath, NodeRecord, PropertyValue, Tree};
use tracing::debug;

use crate::directive;
use crate::error::RewriteError;
use crate::granite;
use crate::pattern::matches_any;
use crate::rule::{FinalNodeSet, Rule, DEFAULT_RANKING};
use crate::rule_set::RuleProvider;
use crate::template::{Instantiation, ReplacementTemplate};

/// Name hint for the matched subtree while its replacement is built
const DETACHED_HINT: &str = "rewrite-detached";
const ROOT_HOLDER_TYPE: &str = "nt:unstructured";

/// Rule built from a definition record
#[derive(Debug, Clone)]
pub struct NodeBasedRule {
    id: String,
    title: String,
    ranking: i32,
    patterns: Vec<NodeRecord>,
    replacement: Option<ReplacementTemplate>,
}

impl NodeBasedRule {
    /// Build a rule from its record
    ///
    /// # Errors
    /// Returns a configuration error for an unreadable ranking or malformed
    /// rewrite-properties entries
    pub fn from_record(id: impl Into<String>, record: &NodeRecord) -> Result<Self, RewriteError> {
        let id = id.into();
        let ranking = match record.property(directive::RANKING) {
            None => DEFAULT_RANKING,
            Some(value) => {
                let raw = value.to_long().ok_or_else(|| {
                    RewriteError::configuration(
                        format!("{id}/{}", directive::RANKING),
                        format!("not an integer: {value}"),
                    )
                })?;
                i32::try_from(raw).unwrap_or(if raw < 0 { i32::MIN } else { i32::MAX })
            }
        };
        let title = record
            .property(directive::TITLE)
            .and_then(PropertyValue::as_str)
            .unwrap_or(&record.name)
            .to_string();
        let patterns = record
            .child(directive::PATTERNS)
            .map(|p| p.children.clone())
            .unwrap_or_default();
        let replacement = record
            .child(directive::REPLACEMENT)
            .map(|r| ReplacementTemplate::compile(&id, r))
            .transpose()?;

        Ok(Self {
            id,
            title,
            ranking,
            patterns,
            replacement,
        })
    }

    /// Build a rule from a record stored in a tree, using its path as id
    ///
    /// # Errors
    /// See [`NodeBasedRule::from_record`]
    pub fn from_tree(tree: &Tree, node: NodeId) -> Result<Self, RewriteError> {
        Self::from_record(tree.path(node)?, &tree.export(node)?)
    }

    /// Pattern alternatives
    #[inline]
    #[must_use]
    pub fn patterns(&self) -> &[NodeRecord] {
        &self.patterns
    }

    /// Compiled replacement, `None` if the record defines none
    #[inline]
    #[must_use]
    pub fn replacement(&self) -> Option<&ReplacementTemplate> {
        self.replacement.as_ref()
    }

    fn copy_from_original(
        tree: &mut Tree,
        original: NodeId,
        out: &Instantiation,
        target: NodeId,
    ) -> Result<(), RewriteError> {
        let mut sources = Vec::new();
        for (path, dest) in &out.mappings {
            let Ok(parsed) = NodePath::parse(path) else {
                continue;
            };
            if let Some(source) = tree.resolve(original, &parsed)? {
                sources.push((source, *dest));
            }
        }
        if !out.copy_children && sources.is_empty() {
            return Ok(());
        }

        let children = tree.children(original)?.to_vec();
        for child in children {
            let mut mapped = false;
            for (source, dest) in &sources {
                if *source == child {
                    mapped = true;
                    copy_children_into(tree, child, *dest)?;
                }
            }
            if out.copy_children && !mapped {
                copy_into(tree, child, target)?;
            }
        }

        for (source, dest) in &sources {
            if tree.parent(*source)? != Some(original) {
                copy_children_into(tree, *source, *dest)?;
            }
        }
        Ok(())
    }
}

fn copy_into(tree: &mut Tree, node: NodeId, dest: NodeId) -> Result<NodeId, RewriteError> {
    let name = tree.name(node)?.to_string();
    let name = tree.unique_child_name(dest, &name)?;
    Ok(tree.copy(node, dest, None, &name)?)
}

fn copy_children_into(tree: &mut Tree, source: NodeId, dest: NodeId) -> Result<(), RewriteError> {
    for child in tree.children(source)?.to_vec() {
        copy_into(tree, child, dest)?;
    }
    Ok(())
}

impl Rule for NodeBasedRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn ranking(&self) -> i32 {
        self.ranking
    }

    fn matches(&self, tree: &Tree, node: NodeId) -> Result<bool, RewriteError> {
        Ok(matches_any(tree, node, &self.patterns)?)
    }

    fn apply(
        &self,
        tree: &mut Tree,
        node: NodeId,
        finals: &mut FinalNodeSet,
    ) -> Result<Option<NodeId>, RewriteError> {
        let template = self
            .replacement
            .as_ref()
            .ok_or_else(|| RewriteError::MissingReplacement {
                rule: self.id.clone(),
            })?;

        if template.is_empty() {
            debug!(rule = %self.id, node = %tree.path(node)?, "removing matched subtree");
            tree.remove(node)?;
            return Ok(None);
        }

        let name = tree.name(node)?.to_string();
        let parent = tree.parent(node)?;
        // the tree root is rebuilt below a detached holder and swapped in last
        let (holder, index) = match parent {
            Some(parent) => {
                let index = tree.index_of(node)?;
                let detached = tree.unique_child_name(parent, DETACHED_HINT)?;
                tree.rename(node, &detached)?;
                (parent, index)
            }
            None => (tree.create_detached(DETACHED_HINT, ROOT_HOLDER_TYPE), None),
        };

        let out = template.instantiate(tree, node, holder, index, &name)?;
        let Some(replacement) = out.root else {
            return Err(RewriteError::structural(&self.id, "template produced no node"));
        };

        if out.copy_children || !out.mappings.is_empty() {
            Self::copy_from_original(tree, node, &out, replacement)?;
            for (target, before) in &out.orderings {
                if parent.is_none() && *target == replacement {
                    continue;
                }
                tree.order_before(*target, Some(before.as_str()))?;
            }
        }
        if template.maps_common_attrs() {
            granite::map_common_attrs(tree, node, replacement)?;
        }
        if template.copies_render_condition() {
            granite::copy_render_condition(tree, node, replacement)?;
        }

        for id in &out.finals {
            finals.insert(*id);
        }
        if template.is_final() {
            finals.insert_subtree(tree, replacement)?;
        }

        if parent.is_some() {
            tree.remove(node)?;
        } else {
            tree.replace_root(replacement)?;
            tree.remove(holder)?;
        }
        debug!(rule = %self.id, node = %tree.path(replacement)?, "applied replacement");
        Ok(Some(replacement))
    }
}

impl fmt::Display for NodeBasedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[path={},ranking={}]", self.title, self.id, self.ranking)
    }
}

/// Provider turning a folder of rule records into [`NodeBasedRule`]s
#[derive(Debug, Clone)]
pub struct DefinitionRuleProvider {
    name: String,
    rules: Vec<Arc<NodeBasedRule>>,
}

impl DefinitionRuleProvider {
    /// Build one rule per child of `folder`
    ///
    /// Rule ids are `<name>/<child name>`.
    ///
    /// # Errors
    /// Returns the first rule construction error
    pub fn from_folder(name: impl Into<String>, folder: &NodeRecord) -> Result<Self, RewriteError> {
        let name = name.into();
        let rules = folder
            .children
            .iter()
            .map(|record| {
                NodeBasedRule::from_record(format!("{name}/{}", record.name), record).map(Arc::new)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { name, rules })
    }

    /// Build one rule per child of a folder node stored in a tree
    ///
    /// # Errors
    /// Returns the first rule construction error
    pub fn from_tree(tree: &Tree, folder: NodeId) -> Result<Self, RewriteError> {
        let mut rules = Vec::new();
        for child in tree.children(folder)? {
            rules.push(Arc::new(NodeBasedRule::from_tree(tree, *child)?));
        }
        Ok(Self {
            name: tree.path(folder)?,
            rules,
        })
    }

    /// Number of rules
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if the folder held no rules
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl RuleProvider for DefinitionRuleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn rules(&self) -> Vec<Arc<dyn Rule>> {
        self.rules
            .iter()
            .map(|rule| Arc::clone(rule) as Arc<dyn Rule>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use remodel_tree::{StoreError, StoreOptions};

    fn rule_from_yaml(yaml: &str) -> NodeBasedRule {
        let record = NodeRecord::from_yaml(yaml).unwrap();
        NodeBasedRule::from_record(format!("/rules/{}", record.name), &record).unwrap()
    }

    fn document(yaml: &str) -> Tree {
        Tree::from_record(&NodeRecord::from_yaml(yaml).unwrap(), StoreOptions::default()).unwrap()
    }

    fn child_names(tree: &Tree, node: NodeId) -> Vec<String> {
        tree.children(node)
            .unwrap()
            .iter()
            .map(|c| tree.name(*c).unwrap().to_string())
            .collect()
    }

    const PANEL_RULE: &str = r"
name: panel
properties:
  jcr:title: Panel rule
  cq:rewriteRanking: 5
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

    const PAGE: &str = r"
name: content
children:
  - name: before
  - name: dialog
    type: panel
    children:
      - name: items
        type: list
        children:
          - name: first
          - name: second
      - name: header
  - name: after
";

    #[test]
    fn rule_reads_record_metadata() {
        let rule = rule_from_yaml(PANEL_RULE);
        assert_eq!(rule.id(), "/rules/panel");
        assert_eq!(rule.title(), "Panel rule");
        assert_eq!(rule.ranking(), 5);
        assert_eq!(rule.patterns().len(), 1);
        assert_eq!(rule.to_string(), "Panel rule[path=/rules/panel,ranking=5]");
    }

    #[test]
    fn rule_default_ranking_and_title() {
        let rule = rule_from_yaml("name: bare");
        assert_eq!(rule.ranking(), DEFAULT_RANKING);
        assert_eq!(rule.title(), "bare");
        assert!(rule.replacement().is_none());
    }

    #[test]
    fn rule_rejects_bad_ranking() {
        let record = NodeRecord::unstructured("r").with_property(directive::RANKING, "high");
        assert!(matches!(
            NodeBasedRule::from_record("r", &record),
            Err(RewriteError::Configuration { .. })
        ));
    }

    #[test]
    fn rule_without_patterns_never_matches() {
        let rule = rule_from_yaml("name: bare");
        let tree = document(PAGE);
        assert!(!rule.matches(&tree, tree.root()).unwrap());
    }

    #[test]
    fn apply_replaces_in_place() {
        let rule = rule_from_yaml(PANEL_RULE);
        let mut tree = document(PAGE);
        let root = tree.root();
        let dialog = tree.child(root, "dialog").unwrap().unwrap();
        assert!(rule.matches(&tree, dialog).unwrap());

        let mut finals = FinalNodeSet::new();
        let new = rule.apply(&mut tree, dialog, &mut finals).unwrap().unwrap();

        assert!(!tree.contains(dialog));
        assert_eq!(child_names(&tree, root), vec!["before", "dialog", "after"]);
        assert_eq!(tree.type_tag(new).unwrap(), "container");
        assert_eq!(
            tree.property(new, "sling:resourceType").unwrap(),
            Some(&PropertyValue::from("untitled"))
        );
        assert!(tree.children(new).unwrap().is_empty());
        assert!(finals.is_empty());
    }

    #[test]
    fn apply_without_replacement_fails() {
        let rule = rule_from_yaml(
            r"
name: broken
children:
  - name: patterns
    children:
      - name: p
        type: panel
",
        );
        let mut tree = document(PAGE);
        let dialog = tree.child(tree.root(), "dialog").unwrap().unwrap();
        assert!(rule.matches(&tree, dialog).unwrap());
        assert!(matches!(
            rule.apply(&mut tree, dialog, &mut FinalNodeSet::new()),
            Err(RewriteError::MissingReplacement { .. })
        ));
    }

    #[test]
    fn apply_empty_replacement_removes() {
        let rule = rule_from_yaml(
            r"
name: drop
children:
  - name: patterns
    children:
      - name: p
        type: panel
  - name: replacement
",
        );
        let mut tree = document(PAGE);
        let root = tree.root();
        let dialog = tree.child(root, "dialog").unwrap().unwrap();
        assert_eq!(rule.apply(&mut tree, dialog, &mut FinalNodeSet::new()).unwrap(), None);
        assert_eq!(child_names(&tree, root), vec!["before", "after"]);
    }

    #[test]
    fn apply_maps_and_copies_children() {
        let rule = rule_from_yaml(
            r"
name: copy
children:
  - name: patterns
    children:
      - name: p
        type: panel
  - name: replacement
    children:
      - name: c
        type: container
        properties:
          cq:copyChildren: true
        children:
          - name: fields
            properties:
              cq:rewriteMapChildren: ./items
              cq:orderBefore: header
",
        );
        let mut tree = document(PAGE);
        let dialog = tree.child(tree.root(), "dialog").unwrap().unwrap();
        let new = rule
            .apply(&mut tree, dialog, &mut FinalNodeSet::new())
            .unwrap()
            .unwrap();

        // `items` is a mapped source, so only `header` is copied verbatim
        assert_eq!(child_names(&tree, new), vec!["fields", "header"]);
        let fields = tree.child(new, "fields").unwrap().unwrap();
        assert_eq!(child_names(&tree, fields), vec!["first", "second"]);
        assert!(tree.properties(fields).unwrap().is_empty());
    }

    #[test]
    fn apply_orders_after_copying() {
        let rule = rule_from_yaml(
            r"
name: order
children:
  - name: patterns
    children:
      - name: p
        type: panel
  - name: replacement
    children:
      - name: c
        type: container
        properties:
          cq:copyChildren: true
        children:
          - name: footer
            properties:
              cq:orderBefore: header
",
        );
        let mut tree = document(PAGE);
        let dialog = tree.child(tree.root(), "dialog").unwrap().unwrap();
        let new = rule
            .apply(&mut tree, dialog, &mut FinalNodeSet::new())
            .unwrap()
            .unwrap();
        assert_eq!(child_names(&tree, new), vec!["items", "footer", "header"]);
    }

    #[test]
    fn apply_collects_finals() {
        let rule = rule_from_yaml(
            r"
name: finals
children:
  - name: patterns
    children:
      - name: p
        type: panel
  - name: replacement
    children:
      - name: c
        type: container
        children:
          - name: locked
            properties:
              cq:rewriteFinal: true
          - name: open
",
        );
        let mut tree = document(PAGE);
        let dialog = tree.child(tree.root(), "dialog").unwrap().unwrap();
        let mut finals = FinalNodeSet::new();
        let new = rule.apply(&mut tree, dialog, &mut finals).unwrap().unwrap();
        let locked = tree.child(new, "locked").unwrap().unwrap();
        let open = tree.child(new, "open").unwrap().unwrap();
        assert!(finals.contains(locked));
        assert!(!finals.contains(open));
        assert!(!finals.contains(new));
        assert!(tree.property(locked, directive::FINAL).unwrap().is_none());
    }

    #[test]
    fn apply_whole_tree_final() {
        let rule = rule_from_yaml(
            r"
name: finals
children:
  - name: patterns
    children:
      - name: p
        type: panel
  - name: replacement
    properties:
      cq:rewriteFinal: true
    children:
      - name: c
        type: container
        children:
          - name: inner
",
        );
        let mut tree = document(PAGE);
        let dialog = tree.child(tree.root(), "dialog").unwrap().unwrap();
        let mut finals = FinalNodeSet::new();
        let new = rule.apply(&mut tree, dialog, &mut finals).unwrap().unwrap();
        let inner = tree.child(new, "inner").unwrap().unwrap();
        assert!(finals.contains(new));
        assert!(finals.contains(inner));
    }

    #[test]
    fn apply_replaces_tree_root() {
        let rule = rule_from_yaml(
            r"
name: root
children:
  - name: patterns
    children:
      - name: p
        type: panel
  - name: replacement
    children:
      - name: c
        type: container
        properties:
          jcr:title: ${./title}
          cq:copyChildren: true
        children:
          - name: footer
            properties:
              cq:orderBefore: items
",
        );
        let mut tree = document(
            r"
name: dialog
type: panel
properties:
  title: Root
children:
  - name: items
    type: list
",
        );
        let old_root = tree.root();
        let items = tree.child(old_root, "items").unwrap().unwrap();

        let new = rule
            .apply(&mut tree, old_root, &mut FinalNodeSet::new())
            .unwrap()
            .unwrap();

        assert_eq!(tree.root(), new);
        assert!(!tree.contains(old_root));
        assert!(!tree.contains(items));
        assert_eq!(tree.parent(new).unwrap(), None);
        assert_eq!(tree.name(new).unwrap(), "dialog");
        assert_eq!(tree.path(new).unwrap(), "/dialog");
        assert_eq!(tree.property(new, "jcr:title").unwrap(), Some(&PropertyValue::from("Root")));
        assert_eq!(child_names(&tree, new), vec!["footer", "items"]);
        assert_eq!(tree.node_count(), 3);
    }

    #[test]
    fn apply_empty_replacement_removes_tree_root() {
        let rule = rule_from_yaml(
            r"
name: drop
children:
  - name: patterns
    children:
      - name: p
        type: panel
  - name: replacement
",
        );
        let mut tree = document("name: dialog\ntype: panel\n");
        let root = tree.root();
        assert_eq!(rule.apply(&mut tree, root, &mut FinalNodeSet::new()).unwrap(), None);
        assert_eq!(tree.node_count(), 0);
    }

    #[test]
    fn apply_maps_nested_source() {
        let rule = rule_from_yaml(
            r"
name: nested
children:
  - name: patterns
    children:
      - name: p
        type: panel
  - name: replacement
    children:
      - name: c
        type: container
        children:
          - name: fields
            properties:
              cq:rewriteMapChildren: ./items/first
",
        );
        let mut tree = document(
            r"
name: content
children:
  - name: dialog
    type: panel
    children:
      - name: items
        children:
          - name: first
            children:
              - name: x
              - name: y
          - name: second
",
        );
        let dialog = tree.child(tree.root(), "dialog").unwrap().unwrap();
        let new = rule
            .apply(&mut tree, dialog, &mut FinalNodeSet::new())
            .unwrap()
            .unwrap();

        assert_eq!(child_names(&tree, new), vec!["fields"]);
        let fields = tree.child(new, "fields").unwrap().unwrap();
        assert_eq!(child_names(&tree, fields), vec!["x", "y"]);
    }

    #[test]
    fn apply_renames_colliding_copies() {
        let rule = rule_from_yaml(
            r"
name: collide
children:
  - name: patterns
    children:
      - name: p
        type: panel
  - name: replacement
    children:
      - name: c
        type: container
        properties:
          cq:copyChildren: true
        children:
          - name: header
            type: title
",
        );
        let mut tree = document(PAGE);
        let dialog = tree.child(tree.root(), "dialog").unwrap().unwrap();
        let new = rule
            .apply(&mut tree, dialog, &mut FinalNodeSet::new())
            .unwrap()
            .unwrap();

        assert_eq!(child_names(&tree, new), vec!["header", "items", "header0"]);
        let template_header = tree.child(new, "header").unwrap().unwrap();
        assert_eq!(tree.type_tag(template_header).unwrap(), "title");
    }

    #[test]
    fn apply_order_before_missing_sibling_fails() {
        let rule = rule_from_yaml(
            r"
name: order
children:
  - name: patterns
    children:
      - name: p
        type: panel
  - name: replacement
    children:
      - name: c
        type: container
        properties:
          cq:copyChildren: true
        children:
          - name: footer
            properties:
              cq:orderBefore: missing
",
        );
        let mut tree = document(PAGE);
        let dialog = tree.child(tree.root(), "dialog").unwrap().unwrap();
        let err = rule
            .apply(&mut tree, dialog, &mut FinalNodeSet::new())
            .unwrap_err();
        assert!(matches!(
            err,
            RewriteError::Store(StoreError::ChildNotFound { ref name, .. }) if name == "missing"
        ));
    }

    #[test]
    fn apply_skips_ordering_without_copying() {
        let rule = rule_from_yaml(
            r"
name: order
children:
  - name: patterns
    children:
      - name: p
        type: panel
  - name: replacement
    children:
      - name: c
        type: container
        children:
          - name: a
          - name: b
            properties:
              cq:orderBefore: missing
",
        );
        let mut tree = document(PAGE);
        let dialog = tree.child(tree.root(), "dialog").unwrap().unwrap();
        let new = rule
            .apply(&mut tree, dialog, &mut FinalNodeSet::new())
            .unwrap()
            .unwrap();
        assert_eq!(child_names(&tree, new), vec!["a", "b"]);
    }

    #[test]
    fn apply_granite_extras() {
        let rule = rule_from_yaml(
            r"
name: granite
children:
  - name: patterns
    children:
      - name: p
        type: textfield
  - name: replacement
    properties:
      cq:rewriteCommonAttrs: true
      cq:rewriteRenderCondition: true
    children:
      - name: field
        type: granite/textfield
        properties:
          name: ${./name}
",
        );
        let mut tree = document(
            r"
name: content
children:
  - name: text
    type: textfield
    properties:
      name: ./title
      class: wide
      data-role: heading
    children:
      - name: rendercondition
        properties:
          sling:resourceType: granite/ui/components/foundation/renderconditions/simple
",
        );
        let text = tree.child(tree.root(), "text").unwrap().unwrap();
        let new = rule
            .apply(&mut tree, text, &mut FinalNodeSet::new())
            .unwrap()
            .unwrap();

        assert_eq!(tree.property(new, "granite:class").unwrap(), Some(&PropertyValue::from("wide")));
        let data = tree.child(new, granite::GRANITE_DATA).unwrap().unwrap();
        assert_eq!(tree.property(data, "role").unwrap(), Some(&PropertyValue::from("heading")));
        let condition = tree.child(new, granite::GRANITE_RENDER_CONDITION).unwrap().unwrap();
        assert_eq!(
            tree.property(condition, "sling:resourceType").unwrap(),
            Some(&PropertyValue::from(
                "granite/ui/components/coral/foundation/renderconditions/simple"
            ))
        );
        assert!(!tree.has_child(new, granite::RENDER_CONDITION).unwrap());
    }

    #[test]
    fn provider_builds_rules_from_folder() {
        let folder = NodeRecord::unstructured("rules")
            .with_child(NodeRecord::from_yaml(PANEL_RULE).unwrap())
            .with_child(NodeRecord::unstructured("other"));
        let provider = DefinitionRuleProvider::from_folder("/apps/rules", &folder).unwrap();
        assert_eq!(provider.len(), 2);
        assert_eq!(provider.name(), "/apps/rules");
        let ids: Vec<_> = provider.rules().iter().map(|r| r.id().to_string()).collect();
        assert_eq!(ids, vec!["/apps/rules/panel", "/apps/rules/other"]);

        let tree = Tree::from_record(&folder, StoreOptions::default()).unwrap();
        let from_tree = DefinitionRuleProvider::from_tree(&tree, tree.root()).unwrap();
        assert_eq!(from_tree.rules()[0].id(), "/rules/panel");
    }
}
