//! Remodel Core - fixed-point tree rewriting
//!
//! Drives a ranked rule set over a document tree until no rule matches:
//! - One rule application per pass, at the first matching node in pre-order
//! - Sibling order preserved across passes
//! - Settled nodes are never tested twice
//! - One commit on success, discard on any error
//!
//! # Core Concepts
//!
//! - [`TreeRewriter`]: Immutable driver, shareable across threads
//! - [`RewriteConfig`]: Pass limit guarding against circular rule sets
//! - [`RewriteReport`]: Passes run and rules applied
//! - [`EngineConfig`]: YAML/JSON configuration assembling rules and limits
//!
//! # Example
//!
//! ```rust
//! use remodel_core::{EngineConfig, TreeRewriter};
//! use remodel_rules::ColumnControlConfig;
//! use remodel_tree::{MemorySession, Session, Tree};
//!
//! let config = EngineConfig::new()
//!     .with_column_control(ColumnControlConfig::new("2;cq-colctrl-lt0", &["default=[6,6]"]));
//! let rewriter: TreeRewriter = config.rewriter().unwrap();
//!
//! let mut session = MemorySession::new(Tree::new("content", "nt:unstructured"));
//! let root = session.tree().root();
//! let report = rewriter.rewrite_with_report(&mut session, root).unwrap();
//! assert!(report.is_unchanged());
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod rewriter;

pub use config::{load_record, EngineConfig};
pub use error::ConfigError;
pub use rewriter::{PassState, RewriteConfig, RewriteReport, TreeRewriter, DEFAULT_MAX_PASSES};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running rewrites
    pub use crate::{EngineConfig, RewriteConfig, RewriteReport, TreeRewriter};
    pub use remodel_rules::{Rule, RuleSet, RewriteError};
    pub use remodel_tree::{MemorySession, NodeId, NodeRecord, Session, Tree};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
