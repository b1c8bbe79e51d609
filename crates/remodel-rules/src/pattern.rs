//! Pattern matching against tree subtrees
//!
//! A pattern is a [`NodeRecord`] compared against a live node:
//!
//! 1. Type tags must be equal.
//! 2. Every pattern property must exist on the candidate with an equal value,
//!    skipping protected properties and the optional marker.
//! 3. Every non-optional pattern child must exist on the candidate.
//! 4. The first pattern child that is not an absent optional child decides
//!    the result by recursion. Later pattern children are only checked for
//!    existence, so a pattern describes one nested chain below its root.
//! 5. A pattern without children matches once 1 and 2 pass.

use remodel_tree::{NodeId, NodeRecord, StoreError, Tree};

use crate::directive;

/// Check whether a pattern child is marked optional
#[inline]
#[must_use]
pub fn is_optional(pattern: &NodeRecord) -> bool {
    pattern
        .property(directive::OPTIONAL)
        .is_some_and(remodel_tree::PropertyValue::is_truthy)
}

/// Check a candidate against alternatives, stopping at the first match
///
/// # Errors
/// Propagates store errors only
pub fn matches_any(
    tree: &Tree,
    candidate: NodeId,
    patterns: &[NodeRecord],
) -> Result<bool, StoreError> {
    for pattern in patterns {
        if matches_pattern(tree, candidate, pattern)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Check a candidate against one pattern
///
/// # Errors
/// Propagates store errors only
pub fn matches_pattern(
    tree: &Tree,
    candidate: NodeId,
    pattern: &NodeRecord,
) -> Result<bool, StoreError> {
    if tree.type_tag(candidate)? != pattern.type_tag {
        return Ok(false);
    }

    for (name, expected) in &pattern.properties {
        if tree.is_protected(name) || name == directive::OPTIONAL {
            continue;
        }
        if tree.property(candidate, name)? != Some(expected) {
            return Ok(false);
        }
    }

    for child in &pattern.children {
        if !is_optional(child) && !tree.has_child(candidate, &child.name)? {
            return Ok(false);
        }
    }

    for child in &pattern.children {
        match tree.child(candidate, &child.name)? {
            None if is_optional(child) => continue,
            Some(node) => return matches_pattern(tree, node, child),
            None => return Ok(false),
        }
    }

    Ok(true)
}
