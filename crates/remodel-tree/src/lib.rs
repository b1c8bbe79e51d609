//! Remodel Tree
//!
//! Ordered content trees with typed properties, the data model every rewrite
//! operates on.
//!
//! # Core Concepts
//!
//! - [`Tree`]: Arena of named, typed nodes with ordered children
//! - [`NodeId`]: Stable handle to a node, never reused within a tree
//! - [`PropertyValue`]: `Boolean`, `Long`, `String` or `StringList`
//! - [`NodePath`]: Relative or absolute addressing between nodes
//! - [`NodeRecord`]: Detached, serializable subtree
//! - [`Session`]: Staged changes with commit/discard
//!
//! # Example
//!
//! ```rust
//! use remodel_tree::{MemorySession, PropertyValue, Session, Tree};
//!
//! let mut session = MemorySession::new(Tree::new("content", "nt:unstructured"));
//! let root = session.tree().root();
//! let page = session.tree_mut().add_child(root, "page", "cq:Page").unwrap();
//! session.tree_mut().set_property(page, "title", "Home").unwrap();
//! session.commit().unwrap();
//!
//! assert_eq!(
//!     session.committed().property(page, "title").unwrap(),
//!     Some(&PropertyValue::from("Home"))
//! );
//! ```

#![warn(unreachable_pub)]

mod error;
mod options;
mod path;
mod record;
mod session;
mod tree;
mod value;

pub use error::StoreError;
pub use options::StoreOptions;
pub use path::{NodePath, PathError, PARENT_SEGMENT};
pub use record::{NodeRecord, RecordError, DEFAULT_TYPE};
pub use session::{MemorySession, Session};
pub use tree::{NodeId, Tree};
pub use value::{PropertyValue, ValueKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
