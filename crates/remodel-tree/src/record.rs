//! Serializable node records
//!
//! [`NodeRecord`] is the detached, serde-friendly shape of a subtree. Rule
//! definitions, fixtures and documents on disk all use it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::PropertyValue;

/// Type tag used when a record does not name one
pub const DEFAULT_TYPE: &str = "nt:unstructured";

fn default_type() -> String {
    DEFAULT_TYPE.to_string()
}

fn is_default_type(type_tag: &str) -> bool {
    type_tag == DEFAULT_TYPE
}

/// Detached subtree
///
/// ```yaml
/// name: panel
/// type: cq:Widget
/// properties:
///   title: Hello
/// children:
///   - name: items
///     type: cq:WidgetCollection
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node name
    pub name: String,

    /// Type tag
    #[serde(
        rename = "type",
        default = "default_type",
        skip_serializing_if = "is_default_type"
    )]
    pub type_tag: String,

    /// Properties in declaration order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, PropertyValue>,

    /// Children in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeRecord>,
}

impl NodeRecord {
    /// Create record without properties or children
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
            properties: IndexMap::new(),
            children: Vec::new(),
        }
    }

    /// Create record with the default type tag
    #[inline]
    #[must_use]
    pub fn unstructured(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_TYPE)
    }

    /// Add a property
    #[inline]
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Add a child
    #[inline]
    #[must_use]
    pub fn with_child(mut self, child: NodeRecord) -> Self {
        self.children.push(child);
        self
    }

    /// Look up a child by name
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&NodeRecord> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Look up a property by name
    #[inline]
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Number of nodes in this subtree
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(NodeRecord::node_count).sum::<usize>()
    }

    /// Parse from YAML string
    ///
    /// # Errors
    /// Returns error if YAML is invalid or has the wrong shape
    pub fn from_yaml(yaml: &str) -> Result<Self, RecordError> {
        serde_yaml::from_str(yaml).map_err(RecordError::InvalidYaml)
    }

    /// Parse from JSON string
    ///
    /// # Errors
    /// Returns error if JSON is invalid or has the wrong shape
    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        serde_json::from_str(json).map_err(RecordError::InvalidJson)
    }

    /// Serialize to YAML
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_yaml(&self) -> Result<String, RecordError> {
        serde_yaml::to_string(self).map_err(RecordError::InvalidYaml)
    }

    /// Serialize to pretty JSON
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json(&self) -> Result<String, RecordError> {
        serde_json::to_string_pretty(self).map_err(RecordError::InvalidJson)
    }
}

/// Record (de)serialization errors
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// YAML error
    #[error("invalid YAML: {0}")]
    InvalidYaml(#[source] serde_yaml::Error),

    /// JSON error
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
}
