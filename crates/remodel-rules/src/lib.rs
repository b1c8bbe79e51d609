//! Remodel Rules
//!
//! Rewrite rules and the building blocks they are made of:
//! - Structural pattern matching against live subtrees
//! - Replacement templates with `${...}` property mapping
//! - Definition-driven rules and the in-place replacement they perform
//! - Column-control partitioning into grid columns
//!
//! # Core Concepts
//!
//! - [`Rule`]: `matches` / `apply` capability with id, title and ranking
//! - [`NodeBasedRule`]: Rule built from a `patterns` + `replacement` record
//! - [`ColumnControlRule`]: Rule turning marker runs into grid metadata
//! - [`RuleSet`]: Immutable rules sorted by ranking, shared across rewrites
//! - [`FinalNodeSet`]: Nodes a rewrite must not match again
//!
//! # Example
//!
//! ```rust
//! use remodel_rules::{FinalNodeSet, NodeBasedRule, Rule};
//! use remodel_tree::{NodeRecord, StoreOptions, Tree};
//!
//! let rule_record = NodeRecord::from_yaml(
//!     r"
//! name: rename
//! children:
//!   - name: patterns
//!     children:
//!       - name: old
//!         type: legacy
//!   - name: replacement
//!     children:
//!       - name: new
//!         type: modern
//!         properties:
//!           title: ${./title}
//! ",
//! )
//! .unwrap();
//! let rule = NodeBasedRule::from_record("rename", &rule_record).unwrap();
//!
//! let page = NodeRecord::unstructured("page")
//!     .with_child(NodeRecord::new("item", "legacy").with_property("title", "Hi"));
//! let mut tree = Tree::from_record(&page, StoreOptions::default()).unwrap();
//! let item = tree.child(tree.root(), "item").unwrap().unwrap();
//!
//! assert!(rule.matches(&tree, item).unwrap());
//! let new = rule.apply(&mut tree, item, &mut FinalNodeSet::new()).unwrap().unwrap();
//! assert_eq!(tree.type_tag(new).unwrap(), "modern");
//! assert_eq!(tree.name(new).unwrap(), "item");
//! ```

#![warn(unreachable_pub)]

pub mod column_control;
pub mod directive;
mod error;
pub mod granite;
pub mod mapping;
mod node_based;
pub mod pattern;
mod rule;
mod rule_set;
mod template;

pub use column_control::{ColumnControlConfig, ColumnControlRule, GridMode};
pub use error::{ErrorKind, RewriteError};
pub use mapping::{map_value, Mapping, MappingExpr, PropertyRewrite};
pub use node_based::{DefinitionRuleProvider, NodeBasedRule};
pub use pattern::{matches_any, matches_pattern};
pub use rule::{FinalNodeSet, Rule, DEFAULT_RANKING};
pub use rule_set::{RuleProvider, RuleSet, StaticRuleProvider};
pub use template::{Instantiation, ReplacementTemplate};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
