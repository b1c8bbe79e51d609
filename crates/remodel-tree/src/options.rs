//! Store options

use serde::{Deserialize, Serialize};

/// Options shared by every tree of one store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// System-managed property names never matched, copied or rewritten by rules
    pub protected_properties: Vec<String>,
    /// Type tags whose children carry no significant order
    pub unordered_types: Vec<String>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            protected_properties: [
                "jcr:primaryType",
                "jcr:mixinTypes",
                "jcr:uuid",
                "jcr:created",
                "jcr:createdBy",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
            unordered_types: vec!["nt:folder".to_string(), "sling:Folder".to_string()],
        }
    }
}

impl StoreOptions {
    /// Create default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a protected property name
    #[must_use]
    pub fn with_protected(mut self, name: impl Into<String>) -> Self {
        self.protected_properties.push(name.into());
        self
    }

    /// Add an unordered type tag
    #[must_use]
    pub fn with_unordered_type(mut self, type_tag: impl Into<String>) -> Self {
        self.unordered_types.push(type_tag.into());
        self
    }

    /// Check if a property is system-managed
    #[inline]
    #[must_use]
    pub fn is_protected(&self, name: &str) -> bool {
        self.protected_properties.iter().any(|p| p == name)
    }

    /// Check if children of this type tag are order-sensitive
    #[inline]
    #[must_use]
    pub fn is_orderable(&self, type_tag: &str) -> bool {
        !self.unordered_types.iter().any(|t| t == type_tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_protect_system_properties() {
        let options = StoreOptions::default();
        assert!(options.is_protected("jcr:primaryType"));
        assert!(options.is_protected("jcr:uuid"));
        assert!(!options.is_protected("jcr:title"));
    }

    #[test]
    fn folders_are_unordered() {
        let options = StoreOptions::new().with_unordered_type("my:Bag");
        assert!(!options.is_orderable("nt:folder"));
        assert!(!options.is_orderable("my:Bag"));
        assert!(options.is_orderable("nt:unstructured"));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let options: StoreOptions =
            serde_yaml::from_str("protected_properties: [secret]").unwrap();
        assert!(options.is_protected("secret"));
        assert!(!options.is_protected("jcr:uuid"));
        assert!(!options.is_orderable("nt:folder"));
    }
}
