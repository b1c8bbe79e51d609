//! Node paths for addressing within a tree
//!
//! Provides [`NodePath`] for relative (`items/title`, `./items`, `../x`) and
//! absolute (`/content/page`) addressing of nodes and properties.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Segment that walks up to the parent node
pub const PARENT_SEGMENT: &str = "..";

/// Path between nodes of a tree
///
/// Segments are node names; `..` walks to the parent. `.` segments are
/// dropped while parsing, so `./items` and `items` are the same path.
///
/// # Examples
/// - `items/item0` → two child steps
/// - `/content/page` → absolute, resolved from the tree root
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodePath {
    absolute: bool,
    segments: Vec<String>,
}

impl NodePath {
    /// Create relative path from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<String>) -> Self {
        Self {
            absolute: false,
            segments,
        }
    }

    /// Create path from a single segment
    #[inline]
    #[must_use]
    pub fn single(segment: impl Into<String>) -> Self {
        Self::new(vec![segment.into()])
    }

    /// Empty relative path (the node itself)
    #[inline]
    #[must_use]
    pub fn current() -> Self {
        Self::default()
    }

    /// Parse a path string
    ///
    /// # Errors
    /// Returns error on empty inner segments or reserved characters
    #[inline]
    pub fn parse(s: &str) -> Result<Self, PathError> {
        s.parse()
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Check if path has no segments
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Check if path starts at the tree root
    #[inline]
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Get parent path (if not empty)
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            None
        } else {
            Some(Self {
                absolute: self.absolute,
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            })
        }
    }

    /// Get last segment (if not empty)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Append a segment, returning new path
    #[inline]
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.segments.push(segment.into());
        new
    }

    /// Append another relative path, returning new path
    #[must_use]
    pub fn join(&self, other: &Self) -> Self {
        let mut new = self.clone();
        new.segments.extend(other.segments.iter().cloned());
        new
    }

    /// Split into the node part and the trailing property name
    ///
    /// `items/title` → (`items`, `title`). Returns `None` for an empty path
    /// or when the last segment is `..`.
    #[must_use]
    pub fn split_property(&self) -> Option<(Self, &str)> {
        let name = self.last()?;
        if name == PARENT_SEGMENT {
            return None;
        }
        Some((self.parent().unwrap_or_default(), name))
    }

    /// Iterator over segments from first to last
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }
}

impl Display for NodePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.absolute {
            write!(f, "/{}", self.segments.join("/"))
        } else if self.segments.is_empty() {
            write!(f, ".")
        } else {
            write!(f, "{}", self.segments.join("/"))
        }
    }
}

impl FromStr for NodePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (absolute, body) = match trimmed.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        if body.is_empty() {
            return Ok(Self {
                absolute,
                segments: Vec::new(),
            });
        }

        let mut segments = Vec::new();
        for seg in body.split('/') {
            if seg.is_empty() {
                return Err(PathError::EmptySegment(s.to_string()));
            }
            if seg == "." {
                continue;
            }
            if seg.contains(['[', ']', '*', '|']) {
                return Err(PathError::InvalidSegment(seg.to_string()));
            }
            segments.push(seg.to_string());
        }
        Ok(Self { absolute, segments })
    }
}

impl From<Vec<String>> for NodePath {
    fn from(segments: Vec<String>) -> Self {
        Self::new(segments)
    }
}

/// Errors related to node paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Empty segment in path
    #[error("path '{0}' contains an empty segment")]
    EmptySegment(String),

    /// Reserved characters in a segment
    #[error("invalid segment: {0} (must not contain '[', ']', '*' or '|')")]
    InvalidSegment(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_parse_relative() {
        let path: NodePath = "./items/item0".parse().unwrap();
        assert!(!path.is_absolute());
        assert_eq!(path.segments(), &["items", "item0"]);
        assert_eq!(path.to_string(), "items/item0");
    }

    #[test]
    fn path_parse_absolute() {
        let path: NodePath = "/content/page".parse().unwrap();
        assert!(path.is_absolute());
        assert_eq!(path.len(), 2);
        assert_eq!(path.to_string(), "/content/page");
    }

    #[test]
    fn path_parse_current() {
        assert!(NodePath::parse(".").unwrap().is_empty());
        assert!(NodePath::parse("").unwrap().is_empty());
        assert_eq!(NodePath::current().to_string(), ".");
    }

    #[test]
    fn path_keeps_parent_segments() {
        let path = NodePath::parse("../sibling").unwrap();
        assert_eq!(path.segments(), &["..", "sibling"]);
    }

    #[test]
    fn path_allows_namespaced_names() {
        let path = NodePath::parse("cq:responsive/default").unwrap();
        assert_eq!(path.iter().next(), Some("cq:responsive"));
    }

    #[test]
    fn path_rejects_empty_segment() {
        assert!(matches!(
            NodePath::parse("a//b"),
            Err(PathError::EmptySegment(_))
        ));
    }

    #[test]
    fn path_rejects_reserved_chars() {
        assert!(matches!(
            NodePath::parse("items[1]"),
            Err(PathError::InvalidSegment(_))
        ));
    }

    #[test]
    fn path_split_property() {
        let path = NodePath::parse("items/jcr:title").unwrap();
        let (node, name) = path.split_property().unwrap();
        assert_eq!(node.segments(), &["items"]);
        assert_eq!(name, "jcr:title");

        let single = NodePath::parse("./title").unwrap();
        let (node, name) = single.split_property().unwrap();
        assert!(node.is_empty());
        assert_eq!(name, "title");

        assert!(NodePath::current().split_property().is_none());
        assert!(NodePath::parse("..").unwrap().split_property().is_none());
    }

    #[test]
    fn path_parent_and_child() {
        let path = NodePath::single("a").child("b");
        assert_eq!(path.parent().unwrap(), NodePath::single("a"));
        assert_eq!(path.last(), Some("b"));
        assert!(NodePath::current().parent().is_none());
    }

    #[test]
    fn path_join() {
        let joined = NodePath::single("a").join(&NodePath::parse("b/c").unwrap());
        assert_eq!(joined.to_string(), "a/b/c");
    }
}
