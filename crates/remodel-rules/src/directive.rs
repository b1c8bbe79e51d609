//! Persisted names used by rule definition records

/// Child holding the pattern alternatives
pub const PATTERNS: &str = "patterns";
/// Child holding the replacement template
pub const REPLACEMENT: &str = "replacement";
/// Rule priority (Long), absent means lowest priority
pub const RANKING: &str = "cq:rewriteRanking";
/// Human-readable rule title
pub const TITLE: &str = "jcr:title";

/// Pattern child may be absent
pub const OPTIONAL: &str = "cq:rewriteOptional";
/// Exclude a node (or, on `replacement`, the whole produced tree) from further rewriting
pub const FINAL: &str = "cq:rewriteFinal";
/// Copy the children of an original node under this node
pub const MAP_CHILDREN: &str = "cq:rewriteMapChildren";
/// Copy every unmapped child of the original root into the replacement root
pub const COPY_CHILDREN: &str = "cq:copyChildren";
/// Reorder this node before the named sibling once copying is done
pub const ORDER_BEFORE: &str = "cq:orderBefore";
/// On `replacement`: map Granite common attributes of the original root
pub const COMMON_ATTRS: &str = "cq:rewriteCommonAttrs";
/// On `replacement`: copy the original render condition to the new root
pub const RENDER_CONDITION: &str = "cq:rewriteRenderCondition";
/// Child holding `./<property> = [regex, replacement]` entries
pub const REWRITE_PROPERTIES: &str = "cq:rewriteProperties";

/// Key of a rewrite-properties entry for a property name
#[inline]
#[must_use]
pub fn rewrite_key(property: &str) -> String {
    format!("./{property}")
}

/// Property name of a rewrite-properties key
#[inline]
#[must_use]
pub fn rewrite_target(key: &str) -> &str {
    key.strip_prefix("./").unwrap_or(key)
}
