//! Property values
//!
//! Provides [`PropertyValue`], the tagged union stored under every property name.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Value stored under a property name
///
/// Equality is by tag and value: `Long(1)` never equals `String("1")`.
/// Serializes untagged, so `true`, `42`, `"text"` and `["a", "b"]` are all
/// valid YAML/JSON spellings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean flag
    Boolean(bool),
    /// Signed integer
    Long(i64),
    /// Single string
    String(String),
    /// Multi-valued string
    StringList(Vec<String>),
}

/// Discriminator of a [`PropertyValue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// [`PropertyValue::Boolean`]
    Boolean,
    /// [`PropertyValue::Long`]
    Long,
    /// [`PropertyValue::String`]
    String,
    /// [`PropertyValue::StringList`]
    StringList,
}

impl PropertyValue {
    /// Tag of this value
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Long(_) => ValueKind::Long,
            Self::String(_) => ValueKind::String,
            Self::StringList(_) => ValueKind::StringList,
        }
    }

    /// Single string content
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean content
    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer content
    #[inline]
    #[must_use]
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(n) => Some(*n),
            _ => None,
        }
    }

    /// Multi-valued string content
    #[inline]
    #[must_use]
    pub fn as_string_list(&self) -> Option<&[String]> {
        match self {
            Self::StringList(values) => Some(values),
            _ => None,
        }
    }

    /// Whether this is a multi-valued property
    #[inline]
    #[must_use]
    pub fn is_multi_valued(&self) -> bool {
        matches!(self, Self::StringList(_))
    }

    /// Whether this value carries string data (single or multi-valued)
    #[inline]
    #[must_use]
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::String(_) | Self::StringList(_))
    }

    /// Interpret the value as a directive flag
    ///
    /// `true` and the string `"true"` (any case) are truthy, everything else is not.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Boolean(b) => *b,
            Self::String(s) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// Interpret the value as a directive integer
    ///
    /// Accepts `Long` values and strings that parse as integers.
    #[must_use]
    pub fn to_long(&self) -> Option<i64> {
        match self {
            Self::Long(n) => Some(*n),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl Display for PropertyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Long(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::StringList(values) => write!(f, "[{}]", values.join(", ")),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(values: Vec<String>) -> Self {
        Self::StringList(values)
    }
}

impl From<&[&str]> for PropertyValue {
    fn from(values: &[&str]) -> Self {
        Self::StringList(values.iter().map(|s| (*s).to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_tag_and_value() {
        assert_eq!(PropertyValue::from(1_i64), PropertyValue::Long(1));
        assert_ne!(PropertyValue::from(1_i64), PropertyValue::from("1"));
        assert_ne!(
            PropertyValue::from("a"),
            PropertyValue::StringList(vec!["a".to_string()])
        );
    }

    #[test]
    fn truthiness() {
        assert!(PropertyValue::Boolean(true).is_truthy());
        assert!(PropertyValue::from("TRUE").is_truthy());
        assert!(!PropertyValue::from("yes").is_truthy());
        assert!(!PropertyValue::Long(1).is_truthy());
    }

    #[test]
    fn to_long_accepts_numeric_strings() {
        assert_eq!(PropertyValue::from(" 12 ").to_long(), Some(12));
        assert_eq!(PropertyValue::Long(-3).to_long(), Some(-3));
        assert_eq!(PropertyValue::from("x").to_long(), None);
    }

    #[test]
    fn untagged_yaml_spellings() {
        let values: Vec<PropertyValue> =
            serde_yaml::from_str("[true, 42, \"true\", text, [a, b]]").unwrap();
        assert_eq!(
            values,
            vec![
                PropertyValue::Boolean(true),
                PropertyValue::Long(42),
                PropertyValue::from("true"),
                PropertyValue::from("text"),
                PropertyValue::from(&["a", "b"][..]),
            ]
        );
    }

    #[test]
    fn display_formats() {
        assert_eq!(PropertyValue::from(&["a", "b"][..]).to_string(), "[a, b]");
        assert_eq!(PropertyValue::Boolean(false).to_string(), "false");
    }
}
