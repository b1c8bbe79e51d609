//! Property-mapping expressions
//!
//! Template property values of the form
//!
//! ```text
//! expr            := "!"? "${" path-or-default "}"
//! path-or-default := quoted-path | bare-path [":" default-text]
//! quoted-path     := "'" text "'"
//! ```
//!
//! are resolved against the original subtree. Quoting lets a path contain `:`.
//! A multi-valued template property lists alternatives; the first one that
//! resolves wins.

use once_cell::sync::Lazy;
use regex::Regex;
use remodel_tree::{NodeId, NodePath, PropertyValue, StoreError, Tree};

static MAPPED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(!?)\$\{('.*?'|.*?)(:(.+))?\}$").expect("mapping expression regex")
});

/// Parsed `${...}` expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingExpr {
    negate: bool,
    path: String,
    default: Option<String>,
}

impl MappingExpr {
    /// Parse a template value, `None` if it is not an expression
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let caps = MAPPED_PATTERN.captures(value)?;
        let raw = caps.get(2).map_or("", |m| m.as_str());
        let unquoted = raw.trim_end_matches('\'');
        let path = unquoted.strip_prefix('\'').unwrap_or(unquoted);
        Some(Self {
            negate: caps.get(1).is_some_and(|m| !m.as_str().is_empty()),
            path: path.to_string(),
            default: caps.get(4).map(|m| m.as_str().to_string()),
        })
    }

    /// Whether a boolean result is negated
    #[inline]
    #[must_use]
    pub fn is_negated(&self) -> bool {
        self.negate
    }

    /// Property path relative to the original root
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fallback used when the path does not resolve
    #[inline]
    #[must_use]
    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Resolve against the original subtree
    ///
    /// Unparseable paths resolve like missing ones.
    ///
    /// # Errors
    /// Propagates store errors only
    pub fn resolve(&self, tree: &Tree, original: NodeId) -> Result<Option<PropertyValue>, StoreError> {
        let Ok(path) = NodePath::parse(&self.path) else {
            return Ok(None);
        };
        Ok(tree.property_at(original, &path)?.map(|value| match value {
            PropertyValue::Boolean(b) if self.negate => PropertyValue::Boolean(!b),
            other => other.clone(),
        }))
    }
}

/// Outcome of mapping one template property
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mapping {
    /// Not an expression, keep the template value
    Unmapped,
    /// Resolved to a copied original value or a default
    Mapped(PropertyValue),
    /// Expression found but nothing resolved, drop the property
    Removed,
}

/// Map a template property value against the original subtree
///
/// Only string values are considered. Each alternative is tried in order:
/// an existing source property is copied with its native type (booleans
/// negated under `!`), otherwise a default collapses the property to a single
/// string. Without any resolution the property is removed.
///
/// # Errors
/// Propagates store errors only
pub fn map_value(
    tree: &Tree,
    original: NodeId,
    value: &PropertyValue,
) -> Result<Mapping, StoreError> {
    let alternatives: &[String] = match value {
        PropertyValue::String(s) => std::slice::from_ref(s),
        PropertyValue::StringList(values) => values,
        PropertyValue::Boolean(_) | PropertyValue::Long(_) => return Ok(Mapping::Unmapped),
    };

    let mut found_expression = false;
    for alternative in alternatives {
        let Some(expr) = MappingExpr::parse(alternative) else {
            continue;
        };
        found_expression = true;
        if let Some(resolved) = expr.resolve(tree, original)? {
            return Ok(Mapping::Mapped(resolved));
        }
        if let Some(default) = expr.default_value() {
            return Ok(Mapping::Mapped(PropertyValue::from(default)));
        }
    }

    Ok(if found_expression {
        Mapping::Removed
    } else {
        Mapping::Unmapped
    })
}

/// Regex substitution applied to a property after mapping
#[derive(Debug, Clone)]
pub struct PropertyRewrite {
    pattern: Regex,
    replacement: String,
}

impl PropertyRewrite {
    /// Compile a rewrite
    ///
    /// `replacement` uses `$1` / `${name}` group references.
    ///
    /// # Errors
    /// Returns error if the pattern is not a valid regex
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement: replacement.into(),
        })
    }

    /// Source pattern
    #[inline]
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Replace every match in a string
    #[must_use]
    pub fn rewrite_str(&self, input: &str) -> String {
        self.pattern
            .replace_all(input, self.replacement.as_str())
            .into_owned()
    }

    /// Rewrite a textual value, `None` for booleans and integers
    #[must_use]
    pub fn rewrite(&self, value: &PropertyValue) -> Option<PropertyValue> {
        match value {
            PropertyValue::String(s) => Some(PropertyValue::String(self.rewrite_str(s))),
            PropertyValue::StringList(values) => Some(PropertyValue::StringList(
                values.iter().map(|v| self.rewrite_str(v)).collect(),
            )),
            PropertyValue::Boolean(_) | PropertyValue::Long(_) => None,
        }
    }
}
