//! Replacement templates
//!
//! A [`ReplacementTemplate`] is compiled once from the `replacement` child of
//! a rule record. Directives are split off the properties and every
//! rewrite-properties regex is compiled up front, so a malformed record fails
//! when the rule is built rather than when it first fires.

use remodel_tree::{NodeId, NodeRecord, PropertyValue, Tree};
use tracing::warn;

use crate::directive;
use crate::error::RewriteError;
use crate::mapping::{map_value, Mapping, PropertyRewrite};

/// Compiled `replacement` definition
#[derive(Debug, Clone)]
pub struct ReplacementTemplate {
    top: Option<TemplateNode>,
    tree_is_final: bool,
    common_attrs: bool,
    render_condition: bool,
}

/// One node of a compiled template
#[derive(Debug, Clone)]
struct TemplateNode {
    name: String,
    type_tag: String,
    properties: Vec<(String, PropertyValue)>,
    rewrites: Vec<(String, PropertyRewrite)>,
    is_final: bool,
    map_children: Option<String>,
    copy_children: bool,
    order_before: Option<String>,
    children: Vec<TemplateNode>,
}

/// Side results of instantiating a template into a tree
#[derive(Debug, Clone, Default)]
pub struct Instantiation {
    /// Root of the produced subtree
    pub root: Option<NodeId>,
    /// Nodes marked final individually
    pub finals: Vec<NodeId>,
    /// `(source path, destination)` pairs from map-children directives
    pub mappings: Vec<(String, NodeId)>,
    /// Whether any node asked for the unmapped original children
    pub copy_children: bool,
    /// `(node, sibling name)` pairs from order-before directives, in declaration order
    pub orderings: Vec<(NodeId, String)>,
}

fn directive_text(value: &PropertyValue) -> String {
    match value {
        PropertyValue::String(s) => s.clone(),
        PropertyValue::StringList(values) => values.first().cloned().unwrap_or_default(),
        other => other.to_string(),
    }
}

impl ReplacementTemplate {
    /// Compile the `replacement` record of a rule
    ///
    /// # Errors
    /// Returns a configuration error for malformed rewrite-properties entries
    pub fn compile(rule: &str, replacement: &NodeRecord) -> Result<Self, RewriteError> {
        let flag = |name: &str| replacement.property(name).is_some_and(PropertyValue::is_truthy);
        let tree_is_final = flag(directive::FINAL);
        let common_attrs = flag(directive::COMMON_ATTRS);
        let render_condition = flag(directive::RENDER_CONDITION);

        if replacement.children.len() > 1 {
            warn!(
                rule,
                ignored = replacement.children.len() - 1,
                "replacement has more than one top-level node, only the first is used"
            );
        }
        let top = replacement
            .children
            .first()
            .map(|record| TemplateNode::compile(rule, record))
            .transpose()?;

        Ok(Self {
            top,
            tree_is_final,
            common_attrs,
            render_condition,
        })
    }

    /// Whether the template removes the matched subtree
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.top.is_none()
    }

    /// Whether the whole produced subtree is final
    #[inline]
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.tree_is_final
    }

    /// Whether common attributes of the original root are mapped
    #[inline]
    #[must_use]
    pub fn maps_common_attrs(&self) -> bool {
        self.common_attrs
    }

    /// Whether the original render condition is carried over
    #[inline]
    #[must_use]
    pub fn copies_render_condition(&self) -> bool {
        self.render_condition
    }

    /// Instantiate under `parent` at `index` with the given name
    ///
    /// Properties are resolved against `original`. Directives are consumed
    /// and reported in the returned [`Instantiation`]; nothing is copied from
    /// the original yet.
    ///
    /// # Errors
    /// Propagates store errors
    pub fn instantiate(
        &self,
        tree: &mut Tree,
        original: NodeId,
        parent: NodeId,
        index: Option<usize>,
        name: &str,
    ) -> Result<Instantiation, RewriteError> {
        let mut out = Instantiation::default();
        if let Some(top) = &self.top {
            let root = top.instantiate(tree, original, parent, index, name, self.tree_is_final, &mut out)?;
            out.root = Some(root);
        }
        Ok(out)
    }
}

impl TemplateNode {
    fn compile(rule: &str, record: &NodeRecord) -> Result<Self, RewriteError> {
        let mut node = Self {
            name: record.name.clone(),
            type_tag: record.type_tag.clone(),
            properties: Vec::new(),
            rewrites: Vec::new(),
            is_final: false,
            map_children: None,
            copy_children: false,
            order_before: None,
            children: Vec::new(),
        };

        for (name, value) in &record.properties {
            match name.as_str() {
                directive::FINAL => node.is_final = value.is_truthy(),
                directive::COPY_CHILDREN => node.copy_children = value.is_truthy(),
                directive::MAP_CHILDREN => node.map_children = Some(directive_text(value)),
                directive::ORDER_BEFORE => node.order_before = Some(directive_text(value)),
                _ => node.properties.push((name.clone(), value.clone())),
            }
        }

        for child in &record.children {
            if child.name == directive::REWRITE_PROPERTIES {
                node.rewrites = compile_rewrites(rule, child)?;
            } else {
                node.children.push(Self::compile(rule, child)?);
            }
        }
        Ok(node)
    }

    fn rewrite_for(&self, property: &str) -> Option<&PropertyRewrite> {
        self.rewrites
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, rewrite)| rewrite)
    }

    #[allow(clippy::too_many_arguments)]
    fn instantiate(
        &self,
        tree: &mut Tree,
        original: NodeId,
        parent: NodeId,
        index: Option<usize>,
        name: &str,
        tree_is_final: bool,
        out: &mut Instantiation,
    ) -> Result<NodeId, RewriteError> {
        let at = match index {
            Some(i) => i,
            None => tree.children(parent)?.len(),
        };
        let node = tree.insert_child(parent, at, name, &self.type_tag)?;

        for (prop, value) in &self.properties {
            if tree.is_protected(prop) {
                tree.set_property(node, prop.clone(), value.clone())?;
                continue;
            }
            let resolved = match map_value(tree, original, value)? {
                Mapping::Unmapped => value.clone(),
                Mapping::Mapped(mapped) => mapped,
                Mapping::Removed => continue,
            };
            let rewritten = self
                .rewrite_for(prop)
                .and_then(|rewrite| rewrite.rewrite(&resolved))
                .unwrap_or(resolved);
            tree.set_property(node, prop.clone(), rewritten)?;
        }

        if self.is_final && !tree_is_final {
            out.finals.push(node);
        }
        if let Some(source) = &self.map_children {
            out.mappings.push((source.clone(), node));
        }
        out.copy_children |= self.copy_children;
        if let Some(before) = &self.order_before {
            out.orderings.push((node, before.clone()));
        }

        for child in &self.children {
            child.instantiate(tree, original, node, None, &child.name, tree_is_final, out)?;
        }
        Ok(node)
    }
}

fn compile_rewrites(
    rule: &str,
    block: &NodeRecord,
) -> Result<Vec<(String, PropertyRewrite)>, RewriteError> {
    let mut rewrites = Vec::new();
    for (key, value) in &block.properties {
        if !key.starts_with("./") {
            continue;
        }
        let field = format!("{rule}/{}/{key}", directive::REWRITE_PROPERTIES);
        let pair = match value.as_string_list() {
            Some([pattern, replacement]) => (pattern, replacement),
            _ => {
                return Err(RewriteError::configuration(
                    field,
                    "expected a two-element string list [pattern, replacement]",
                ))
            }
        };
        let rewrite = PropertyRewrite::new(pair.0, pair.1.clone())
            .map_err(|e| RewriteError::configuration(field, e.to_string()))?;
        rewrites.push((directive::rewrite_target(key).to_string(), rewrite));
    }
    Ok(rewrites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use remodel_tree::StoreOptions;

    fn original_tree() -> (Tree, NodeId) {
        let record = NodeRecord::new("content", "nt:unstructured").with_child(
            NodeRecord::new("panel", "panel")
                .with_property("title", "Old Title")
                .with_property("hidden", true),
        );
        let tree = Tree::from_record(&record, StoreOptions::default()).unwrap();
        let panel = tree.child(tree.root(), "panel").unwrap().unwrap();
        (tree, panel)
    }

    #[test]
    fn compile_splits_directives() {
        let replacement = NodeRecord::unstructured("replacement").with_child(
            NodeRecord::new("c", "container")
                .with_property(directive::FINAL, true)
                .with_property(directive::MAP_CHILDREN, "items")
                .with_property(directive::ORDER_BEFORE, "other")
                .with_property(directive::COPY_CHILDREN, "true")
                .with_property("keep", "me"),
        );
        let template = ReplacementTemplate::compile("r", &replacement).unwrap();
        let top = template.top.as_ref().unwrap();
        assert!(top.is_final);
        assert!(top.copy_children);
        assert_eq!(top.map_children.as_deref(), Some("items"));
        assert_eq!(top.order_before.as_deref(), Some("other"));
        assert_eq!(top.properties.len(), 1);
        assert!(!template.is_final());
        assert!(!template.maps_common_attrs());
        assert!(!template.copies_render_condition());
    }

    #[test]
    fn compile_reads_replacement_flags() {
        let replacement = NodeRecord::unstructured("replacement")
            .with_property(directive::COMMON_ATTRS, true)
            .with_property(directive::RENDER_CONDITION, "true")
            .with_child(NodeRecord::new("c", "container"));
        let template = ReplacementTemplate::compile("r", &replacement).unwrap();
        assert!(template.maps_common_attrs());
        assert!(template.copies_render_condition());
        assert!(!template.is_final());
    }

    #[test]
    fn compile_rejects_bad_rewrites() {
        let bad_shape = NodeRecord::unstructured("replacement").with_child(
            NodeRecord::new("c", "t").with_child(
                NodeRecord::unstructured(directive::REWRITE_PROPERTIES)
                    .with_property("./title", "only-one"),
            ),
        );
        assert!(matches!(
            ReplacementTemplate::compile("r", &bad_shape),
            Err(RewriteError::Configuration { .. })
        ));

        let bad_regex = NodeRecord::unstructured("replacement").with_child(
            NodeRecord::new("c", "t").with_child(
                NodeRecord::unstructured(directive::REWRITE_PROPERTIES)
                    .with_property("./title", &["(", "x"][..]),
            ),
        );
        assert!(matches!(
            ReplacementTemplate::compile("r", &bad_regex),
            Err(RewriteError::Configuration { .. })
        ));
    }

    #[test]
    fn instantiate_maps_and_rewrites() {
        let (mut tree, panel) = original_tree();
        let root = tree.root();
        let replacement = NodeRecord::unstructured("replacement").with_child(
            NodeRecord::new("ignored", "container")
                .with_property("jcr:title", "${./title}")
                .with_property("visible", "!${./hidden}")
                .with_property("gone", "${./missing}")
                .with_property("fallback", &["${./missing}", "${./missing2:dflt}"][..])
                .with_child(
                    NodeRecord::unstructured(directive::REWRITE_PROPERTIES)
                        .with_property("./jcr:title", &["^Old ", "New "][..]),
                ),
        );
        let template = ReplacementTemplate::compile("r", &replacement).unwrap();
        let out = template
            .instantiate(&mut tree, panel, root, Some(0), "panel-new")
            .unwrap();
        let node = out.root.unwrap();

        assert_eq!(tree.name(node).unwrap(), "panel-new");
        assert_eq!(tree.index_of(node).unwrap(), Some(0));
        assert_eq!(tree.type_tag(node).unwrap(), "container");
        assert_eq!(
            tree.property(node, "jcr:title").unwrap(),
            Some(&PropertyValue::from("New Title"))
        );
        assert_eq!(
            tree.property(node, "visible").unwrap(),
            Some(&PropertyValue::Boolean(false))
        );
        assert_eq!(tree.property(node, "gone").unwrap(), None);
        assert_eq!(
            tree.property(node, "fallback").unwrap(),
            Some(&PropertyValue::from("dflt"))
        );
        assert!(tree.child(node, directive::REWRITE_PROPERTIES).unwrap().is_none());
    }

    #[test]
    fn instantiate_reports_directives() {
        let (mut tree, panel) = original_tree();
        let root = tree.root();
        let replacement = NodeRecord::unstructured("replacement")
            .with_property(directive::FINAL, true)
            .with_child(
                NodeRecord::new("x", "container").with_child(
                    NodeRecord::unstructured("items")
                        .with_property(directive::MAP_CHILDREN, "./items")
                        .with_property(directive::FINAL, true)
                        .with_property(directive::ORDER_BEFORE, "other"),
                ),
            );
        let template = ReplacementTemplate::compile("r", &replacement).unwrap();
        assert!(template.is_final());
        let out = template.instantiate(&mut tree, panel, root, None, "n").unwrap();
        let items = tree.child(out.root.unwrap(), "items").unwrap().unwrap();

        // the whole tree is final, so individual flags are not collected
        assert!(out.finals.is_empty());
        assert_eq!(out.mappings, vec![("./items".to_string(), items)]);
        assert_eq!(out.orderings, vec![(items, "other".to_string())]);
        assert!(tree.properties(items).unwrap().is_empty());
    }

    #[test]
    fn empty_replacement() {
        let template =
            ReplacementTemplate::compile("r", &NodeRecord::unstructured("replacement")).unwrap();
        assert!(template.is_empty());
    }
}
