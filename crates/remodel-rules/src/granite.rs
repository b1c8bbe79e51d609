//! Granite dialog extras
//!
//! Two replacement-level directives finish a dialog rewrite once the
//! replacement has been built and the original children copied:
//!
//! - `cq:rewriteCommonAttrs` maps the common attributes of the original root
//!   (`id`, `class`, ...) to their `granite:` names and moves `data-*`
//!   properties into a `granite:data` child.
//! - `cq:rewriteRenderCondition` copies the original render condition to
//!   `granite:rendercondition` and moves Coral 2 condition types to Coral 3.

use remodel_tree::{NodeId, PropertyValue, Tree};

use crate::error::RewriteError;
use crate::mapping::{map_value, Mapping};

/// Attributes mapped to `granite:<name>`
pub const COMMON_ATTRIBUTES: [&str; 8] = [
    "id",
    "rel",
    "class",
    "title",
    "hidden",
    "itemscope",
    "itemtype",
    "itemprop",
];
/// Child holding `data-*` attributes without their prefix
pub const GRANITE_DATA: &str = "granite:data";
/// Render condition child written on the replacement
pub const GRANITE_RENDER_CONDITION: &str = "granite:rendercondition";
/// Legacy render condition child name
pub const RENDER_CONDITION: &str = "rendercondition";

const DATA_PREFIX: &str = "data-";
const RESOURCE_TYPE: &str = "sling:resourceType";
const CORAL2_CONDITIONS: &str = "granite/ui/components/foundation/renderconditions";
const CORAL3_CONDITIONS: &str = "granite/ui/components/coral/foundation/renderconditions";
const DATA_NODE_TYPE: &str = "nt:unstructured";

/// Map common attributes and `data-*` properties of `original` onto `copy`
///
/// Each attribute resolves from `./<name>` first, then `./granite:<name>`;
/// unresolved attributes are left off. An existing `granite:data` child of
/// the original is copied unless the replacement defines its own.
///
/// # Errors
/// Propagates store errors
pub fn map_common_attrs(tree: &mut Tree, original: NodeId, copy: NodeId) -> Result<(), RewriteError> {
    for attribute in COMMON_ATTRIBUTES {
        let alternatives = PropertyValue::StringList(vec![
            format!("${{./{attribute}}}"),
            format!("${{'./granite:{attribute}'}}"),
        ]);
        let target = format!("granite:{attribute}");
        match map_value(tree, original, &alternatives)? {
            Mapping::Mapped(value) => {
                tree.set_property(copy, target, value)?;
            }
            Mapping::Removed | Mapping::Unmapped => {
                tree.remove_property(copy, &target)?;
            }
        }
    }

    if let Some(data) = tree.child(original, GRANITE_DATA)? {
        if !tree.has_child(copy, GRANITE_DATA)? {
            tree.copy(data, copy, None, GRANITE_DATA)?;
        }
    }

    let data_properties: Vec<(String, PropertyValue)> = tree
        .properties(original)?
        .iter()
        .filter(|(name, _)| !tree.is_protected(name))
        .filter_map(|(name, value)| {
            name.strip_prefix(DATA_PREFIX)
                .map(|bare| (bare.to_string(), value.clone()))
        })
        .collect();
    if data_properties.is_empty() {
        return Ok(());
    }

    let data = match tree.child(copy, GRANITE_DATA)? {
        Some(node) => node,
        None => tree.add_child(copy, GRANITE_DATA, DATA_NODE_TYPE)?,
    };
    for (name, value) in data_properties {
        tree.set_property(data, name, value)?;
    }
    Ok(())
}

/// Copy the render condition of `original` to `granite:rendercondition` on `copy`
///
/// `granite:rendercondition` wins over `rendercondition` on the original. A
/// condition already present on the replacement is replaced.
///
/// # Errors
/// Propagates store errors
pub fn copy_render_condition(
    tree: &mut Tree,
    original: NodeId,
    copy: NodeId,
) -> Result<Option<NodeId>, RewriteError> {
    let source = match tree.child(original, GRANITE_RENDER_CONDITION)? {
        Some(node) => node,
        None => match tree.child(original, RENDER_CONDITION)? {
            Some(node) => node,
            None => return Ok(None),
        },
    };

    if let Some(existing) = tree.child(copy, GRANITE_RENDER_CONDITION)? {
        tree.remove(existing)?;
    }
    let condition = tree.copy(source, copy, None, GRANITE_RENDER_CONDITION)?;

    for node in tree.descendants(condition)? {
        let upgraded = tree
            .property(node, RESOURCE_TYPE)?
            .and_then(PropertyValue::as_str)
            .and_then(|kind| kind.strip_prefix(CORAL2_CONDITIONS))
            .map(|rest| format!("{CORAL3_CONDITIONS}{rest}"));
        if let Some(kind) = upgraded {
            tree.set_property(node, RESOURCE_TYPE, kind)?;
        }
    }
    Ok(Some(condition))
}
