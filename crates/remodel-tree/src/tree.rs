//! Arena-backed content tree
//!
//! Nodes live in a slot arena and are addressed by [`NodeId`]. Parent and
//! child links are plain ids, so moving a node is a reassignment of one
//! child-list entry.
//!
//! # Identity
//! - Slots are never reused within one tree. A [`NodeId`] of a removed node
//!   stays invalid for the lifetime of the tree.
//! - Every mutation bumps [`Tree::revision`].

use std::fmt;

use indexmap::IndexMap;

use crate::error::StoreError;
use crate::options::StoreOptions;
use crate::path::{NodePath, PARENT_SEGMENT};
use crate::record::NodeRecord;
use crate::value::PropertyValue;

/// Stable handle to a node of one [`Tree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Slot index of this handle
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    name: String,
    type_tag: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    properties: IndexMap<String, PropertyValue>,
}

impl NodeData {
    fn new(name: &str, type_tag: &str, parent: Option<NodeId>) -> Self {
        Self {
            name: name.to_string(),
            type_tag: type_tag.to_string(),
            parent,
            children: Vec::new(),
            properties: IndexMap::new(),
        }
    }
}

/// Ordered tree of named, typed nodes with properties
#[derive(Debug, Clone)]
pub struct Tree {
    slots: Vec<Option<NodeData>>,
    root: NodeId,
    live: usize,
    revision: u64,
    options: StoreOptions,
}

impl Tree {
    /// Create tree with a single root node and default options
    #[must_use]
    pub fn new(root_name: &str, type_tag: &str) -> Self {
        Self::with_options(root_name, type_tag, StoreOptions::default())
    }

    /// Create tree with a single root node
    #[must_use]
    pub fn with_options(root_name: &str, type_tag: &str, options: StoreOptions) -> Self {
        Self {
            slots: vec![Some(NodeData::new(root_name, type_tag, None))],
            root: NodeId(0),
            live: 1,
            revision: 0,
            options,
        }
    }

    /// Build a tree whose root is the given record
    ///
    /// # Errors
    /// Returns error if the record has duplicate sibling names
    pub fn from_record(record: &NodeRecord, options: StoreOptions) -> Result<Self, StoreError> {
        let mut tree = Self::with_options(&record.name, &record.type_tag, options);
        let root = tree.root;
        tree.fill(root, record)?;
        tree.revision = 0;
        Ok(tree)
    }

    /// Root node
    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Store options this tree was created with
    #[inline]
    #[must_use]
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Mutation counter
    #[inline]
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of live nodes
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.live
    }

    /// Check if a handle points to a live node
    #[inline]
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.slots.get(id.0), Some(Some(_)))
    }

    fn get(&self, id: NodeId) -> Result<&NodeData, StoreError> {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(StoreError::NodeNotFound(id))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut NodeData, StoreError> {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(StoreError::NodeNotFound(id))
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    // ---- reads ----

    /// Node name
    ///
    /// # Errors
    /// Returns error if the node does not exist
    pub fn name(&self, id: NodeId) -> Result<&str, StoreError> {
        Ok(&self.get(id)?.name)
    }

    /// Node type tag
    ///
    /// # Errors
    /// Returns error if the node does not exist
    pub fn type_tag(&self, id: NodeId) -> Result<&str, StoreError> {
        Ok(&self.get(id)?.type_tag)
    }

    /// Parent node, `None` for the root
    ///
    /// # Errors
    /// Returns error if the node does not exist
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, StoreError> {
        Ok(self.get(id)?.parent)
    }

    /// Children in order
    ///
    /// # Errors
    /// Returns error if the node does not exist
    pub fn children(&self, id: NodeId) -> Result<&[NodeId], StoreError> {
        Ok(&self.get(id)?.children)
    }

    /// Child by name
    ///
    /// # Errors
    /// Returns error if the node does not exist
    pub fn child(&self, id: NodeId, name: &str) -> Result<Option<NodeId>, StoreError> {
        let data = self.get(id)?;
        Ok(data
            .children
            .iter()
            .copied()
            .find(|c| self.get(*c).is_ok_and(|d| d.name == name)))
    }

    /// Check if a child with this name exists
    ///
    /// # Errors
    /// Returns error if the node does not exist
    pub fn has_child(&self, id: NodeId, name: &str) -> Result<bool, StoreError> {
        Ok(self.child(id, name)?.is_some())
    }

    /// Position among siblings, `None` for the root
    ///
    /// # Errors
    /// Returns error if the node does not exist
    pub fn index_of(&self, id: NodeId) -> Result<Option<usize>, StoreError> {
        let Some(parent) = self.get(id)?.parent else {
            return Ok(None);
        };
        Ok(self.get(parent)?.children.iter().position(|c| *c == id))
    }

    /// All properties in order
    ///
    /// # Errors
    /// Returns error if the node does not exist
    pub fn properties(&self, id: NodeId) -> Result<&IndexMap<String, PropertyValue>, StoreError> {
        Ok(&self.get(id)?.properties)
    }

    /// Property by name
    ///
    /// # Errors
    /// Returns error if the node does not exist
    pub fn property(&self, id: NodeId, name: &str) -> Result<Option<&PropertyValue>, StoreError> {
        Ok(self.get(id)?.properties.get(name))
    }

    /// Property addressed by a path whose last segment is the property name
    ///
    /// `items/title` reads `title` on child `items`. Missing intermediate
    /// nodes yield `None`.
    ///
    /// # Errors
    /// Returns error if the start node does not exist
    pub fn property_at(
        &self,
        id: NodeId,
        path: &NodePath,
    ) -> Result<Option<&PropertyValue>, StoreError> {
        let Some((node_path, name)) = path.split_property() else {
            self.get(id)?;
            return Ok(None);
        };
        match self.resolve(id, &node_path)? {
            Some(node) => self.property(node, name),
            None => Ok(None),
        }
    }

    /// Resolve a path relative to `id` (or from the root when absolute)
    ///
    /// Absolute paths start with the root name: `/content/page`. Below an
    /// unnamed root they start with its children.
    ///
    /// # Errors
    /// Returns error if the start node does not exist
    pub fn resolve(&self, id: NodeId, path: &NodePath) -> Result<Option<NodeId>, StoreError> {
        self.get(id)?;
        let mut segments = path.iter();
        let mut current = if path.is_absolute() && self.get(self.root)?.name.is_empty() {
            self.root
        } else if path.is_absolute() {
            match segments.next() {
                None => return Ok(Some(self.root)),
                Some(first) if first == self.get(self.root)?.name => self.root,
                Some(_) => return Ok(None),
            }
        } else {
            id
        };
        for seg in segments {
            let next = if seg == PARENT_SEGMENT {
                self.get(current)?.parent
            } else {
                self.child(current, seg)?
            };
            match next {
                Some(n) => current = n,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Absolute path of a node, e.g. `/content/page`
    ///
    /// # Errors
    /// Returns error if the node does not exist
    pub fn path(&self, id: NodeId) -> Result<String, StoreError> {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            let data = self.get(node)?;
            names.push(data.name.as_str());
            current = data.parent;
        }
        names.reverse();
        let joined = names.join("/");
        // an unnamed root is the store root itself
        if joined.starts_with('/') {
            Ok(joined)
        } else {
            Ok(format!("/{joined}"))
        }
    }

    /// Subtree of `id` in pre-order, `id` first
    ///
    /// # Errors
    /// Returns error if the node does not exist
    pub fn descendants(&self, id: NodeId) -> Result<Vec<NodeId>, StoreError> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            let data = self.get(node)?;
            out.push(node);
            stack.extend(data.children.iter().rev().copied());
        }
        Ok(out)
    }

    /// Check if `ancestor` is `id` or one of its ancestors
    ///
    /// # Errors
    /// Returns error if `id` does not exist
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> Result<bool, StoreError> {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return Ok(true);
            }
            current = self.get(node)?.parent;
        }
        Ok(false)
    }

    /// Check if a property name is system-managed
    #[inline]
    #[must_use]
    pub fn is_protected(&self, name: &str) -> bool {
        self.options.is_protected(name)
    }

    /// Check if the children of this node are order-sensitive
    ///
    /// # Errors
    /// Returns error if the node does not exist
    pub fn is_orderable(&self, id: NodeId) -> Result<bool, StoreError> {
        Ok(self.options.is_orderable(&self.get(id)?.type_tag))
    }

    /// Name based on `hint` that no child of `parent` uses yet
    ///
    /// Tries `hint`, then `hint0`, `hint1`, ...
    ///
    /// # Errors
    /// Returns error if the parent does not exist
    pub fn unique_child_name(&self, parent: NodeId, hint: &str) -> Result<String, StoreError> {
        if !self.has_child(parent, hint)? {
            return Ok(hint.to_string());
        }
        let mut counter = 0_usize;
        loop {
            let candidate = format!("{hint}{counter}");
            if !self.has_child(parent, &candidate)? {
                return Ok(candidate);
            }
            counter += 1;
        }
    }

    /// Detached copy of a subtree
    ///
    /// # Errors
    /// Returns error if the node does not exist
    pub fn export(&self, id: NodeId) -> Result<NodeRecord, StoreError> {
        let data = self.get(id)?;
        let mut record = NodeRecord::new(data.name.clone(), data.type_tag.clone());
        record.properties = data.properties.clone();
        for child in &data.children {
            record.children.push(self.export(*child)?);
        }
        Ok(record)
    }

    // ---- writes ----

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(Some(data));
        self.live += 1;
        id
    }

    fn collision(&self, parent: NodeId, name: &str) -> Result<StoreError, StoreError> {
        Ok(StoreError::NameCollision {
            parent: self.path(parent)?,
            name: name.to_string(),
        })
    }

    fn ensure_name_free(
        &self,
        parent: NodeId,
        name: &str,
        except: Option<NodeId>,
    ) -> Result<(), StoreError> {
        match self.child(parent, name)? {
            Some(existing) if Some(existing) != except => Err(self.collision(parent, name)?),
            _ => Ok(()),
        }
    }

    /// Set the type tag of a node
    ///
    /// # Errors
    /// Returns error if the node does not exist
    pub fn set_type_tag(&mut self, id: NodeId, type_tag: &str) -> Result<(), StoreError> {
        self.get_mut(id)?.type_tag = type_tag.to_string();
        self.touch();
        Ok(())
    }

    /// Set a property, returning the previous value
    ///
    /// # Errors
    /// Returns error if the node does not exist
    pub fn set_property(
        &mut self,
        id: NodeId,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Result<Option<PropertyValue>, StoreError> {
        let previous = self.get_mut(id)?.properties.insert(name.into(), value.into());
        self.touch();
        Ok(previous)
    }

    /// Remove a property, returning its value
    ///
    /// # Errors
    /// Returns error if the node does not exist
    pub fn remove_property(
        &mut self,
        id: NodeId,
        name: &str,
    ) -> Result<Option<PropertyValue>, StoreError> {
        let previous = self.get_mut(id)?.properties.shift_remove(name);
        if previous.is_some() {
            self.touch();
        }
        Ok(previous)
    }

    /// Append a new child
    ///
    /// # Errors
    /// Returns error if the parent does not exist or the name is taken
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: &str,
        type_tag: &str,
    ) -> Result<NodeId, StoreError> {
        let len = self.get(parent)?.children.len();
        self.insert_child(parent, len, name, type_tag)
    }

    /// Insert a new child at `index` (clamped to the child count)
    ///
    /// # Errors
    /// Returns error if the parent does not exist or the name is taken
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        name: &str,
        type_tag: &str,
    ) -> Result<NodeId, StoreError> {
        self.ensure_name_free(parent, name, None)?;
        let id = self.alloc(NodeData::new(name, type_tag, Some(parent)));
        let children = &mut self.get_mut(parent)?.children;
        let at = index.min(children.len());
        children.insert(at, id);
        self.touch();
        Ok(id)
    }

    /// Create a parentless node outside the root's subtree
    ///
    /// Detached nodes are staging space: children can be added below them
    /// and the node can later become the root through [`Tree::replace_root`]
    /// or be dropped with [`Tree::remove`].
    pub fn create_detached(&mut self, name: &str, type_tag: &str) -> NodeId {
        let id = self.alloc(NodeData::new(name, type_tag, None));
        self.touch();
        id
    }

    /// Make `id` the root, dropping the previous root's subtree
    ///
    /// `id` is unlinked from its parent first, so it may live below the old
    /// root or below a detached node.
    ///
    /// # Errors
    /// Returns error if the node does not exist
    pub fn replace_root(&mut self, id: NodeId) -> Result<(), StoreError> {
        let old = self.root;
        if id == old {
            return Ok(());
        }
        if let Some(parent) = self.get(id)?.parent {
            self.get_mut(parent)?.children.retain(|c| *c != id);
            self.get_mut(id)?.parent = None;
        }
        self.root = id;
        if self.contains(old) {
            self.free(old)?;
        }
        self.touch();
        Ok(())
    }

    /// Remove a node and its whole subtree
    ///
    /// Removing the root leaves an empty tree whose [`Tree::root`] no longer
    /// resolves.
    ///
    /// # Errors
    /// Returns error if the node does not exist
    pub fn remove(&mut self, id: NodeId) -> Result<(), StoreError> {
        if let Some(parent) = self.get(id)?.parent {
            self.get_mut(parent)?.children.retain(|c| *c != id);
        }
        self.free(id)?;
        self.touch();
        Ok(())
    }

    fn free(&mut self, id: NodeId) -> Result<(), StoreError> {
        let doomed = self.descendants(id)?;
        for node in doomed {
            if let Some(slot) = self.slots.get_mut(node.0) {
                *slot = None;
                self.live -= 1;
            }
        }
        Ok(())
    }

    /// Rename a node
    ///
    /// # Errors
    /// Returns error if the node does not exist or a sibling has the name
    pub fn rename(&mut self, id: NodeId, new_name: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.get(id)?.parent {
            self.ensure_name_free(parent, new_name, Some(id))?;
        }
        self.get_mut(id)?.name = new_name.to_string();
        self.touch();
        Ok(())
    }

    /// Move a node to the end of another parent's children
    ///
    /// # Errors
    /// See [`Tree::move_to_index`]
    pub fn move_to(&mut self, id: NodeId, new_parent: NodeId) -> Result<(), StoreError> {
        self.move_to_index(id, new_parent, usize::MAX)
    }

    /// Move a node under `new_parent` at `index` (clamped)
    ///
    /// # Errors
    /// Returns error if either node does not exist, `id` is the root, the
    /// target is inside the moved subtree, or the name is taken
    pub fn move_to_index(
        &mut self,
        id: NodeId,
        new_parent: NodeId,
        index: usize,
    ) -> Result<(), StoreError> {
        let Some(old_parent) = self.get(id)?.parent else {
            return Err(StoreError::invalid_operation(
                self.path(id)?,
                "the root cannot be moved",
            ));
        };
        if self.is_ancestor_or_self(id, new_parent)? {
            return Err(StoreError::invalid_operation(
                self.path(id)?,
                format!("cannot move below itself ({})", self.path(new_parent)?),
            ));
        }
        let name = self.get(id)?.name.clone();
        self.ensure_name_free(new_parent, &name, Some(id))?;

        self.get_mut(old_parent)?.children.retain(|c| *c != id);
        let children = &mut self.get_mut(new_parent)?.children;
        let at = index.min(children.len());
        children.insert(at, id);
        self.get_mut(id)?.parent = Some(new_parent);
        self.touch();
        Ok(())
    }

    /// Reorder a node before the named sibling, or to the end with `None`
    ///
    /// # Errors
    /// Returns error if the node is the root or the sibling does not exist
    pub fn order_before(&mut self, id: NodeId, before: Option<&str>) -> Result<(), StoreError> {
        let Some(parent) = self.get(id)?.parent else {
            return Err(StoreError::invalid_operation(
                self.path(id)?,
                "the root cannot be reordered",
            ));
        };
        let sibling = match before {
            Some(name) => match self.child(parent, name)? {
                Some(sibling) if sibling == id => return Ok(()),
                Some(sibling) => Some(sibling),
                None => {
                    return Err(StoreError::ChildNotFound {
                        parent: self.path(parent)?,
                        name: name.to_string(),
                    })
                }
            },
            None => None,
        };

        let children = &mut self.get_mut(parent)?.children;
        let old = children.iter().position(|c| *c == id);
        children.retain(|c| *c != id);
        let at = match sibling {
            Some(s) => children.iter().position(|c| *c == s).unwrap_or(children.len()),
            None => children.len(),
        };
        children.insert(at, id);
        if old != Some(at) {
            self.touch();
        }
        Ok(())
    }

    /// Insert a detached record under `parent`, keeping its name
    ///
    /// `index` of `None` appends.
    ///
    /// # Errors
    /// Returns error if the parent does not exist or a name is taken
    pub fn import(
        &mut self,
        parent: NodeId,
        index: Option<usize>,
        record: &NodeRecord,
    ) -> Result<NodeId, StoreError> {
        self.import_named(parent, index, &record.name, record)
    }

    /// Insert a detached record under `parent` with a different top-level name
    ///
    /// # Errors
    /// Returns error if the parent does not exist or a name is taken
    pub fn import_named(
        &mut self,
        parent: NodeId,
        index: Option<usize>,
        name: &str,
        record: &NodeRecord,
    ) -> Result<NodeId, StoreError> {
        let at = match index {
            Some(i) => i,
            None => self.get(parent)?.children.len(),
        };
        let id = self.insert_child(parent, at, name, &record.type_tag)?;
        self.fill(id, record)?;
        Ok(id)
    }

    fn fill(&mut self, id: NodeId, record: &NodeRecord) -> Result<(), StoreError> {
        self.get_mut(id)?.properties = record.properties.clone();
        for child in &record.children {
            let child_id = self.add_child(id, &child.name, &child.type_tag)?;
            self.fill(child_id, child)?;
        }
        self.touch();
        Ok(())
    }

    /// Deep-copy a subtree under `parent` with the given name
    ///
    /// # Errors
    /// Returns error if a node does not exist or the name is taken
    pub fn copy(
        &mut self,
        source: NodeId,
        parent: NodeId,
        index: Option<usize>,
        name: &str,
    ) -> Result<NodeId, StoreError> {
        let record = self.export(source)?;
        self.import_named(parent, index, name, &record)
    }
}
