//! In-memory [`ContentTree`] adapter.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use super::{ContentNode, ContentTree, PropertyValue, is_within, normalize, parent_path};
use crate::constants::{FILE_TYPE, PROP_DATA, UNSTRUCTURED_TYPE};
use crate::core::Result;

#[derive(Debug, Default)]
struct Nodes {
    by_path: BTreeMap<String, ContentNode>,
    // Child paths per parent, in insertion order.
    children: HashMap<String, Vec<String>>,
}

impl Nodes {
    fn insert(&mut self, node: ContentNode) {
        let path = node.path.clone();
        if let Some(parent) = parent_path(&path) {
            if !self.by_path.contains_key(&parent) {
                self.insert(ContentNode::new(parent.clone(), UNSTRUCTURED_TYPE));
            }
            let siblings = self.children.entry(parent).or_default();
            if !siblings.contains(&path) {
                siblings.push(path.clone());
            }
        }
        self.by_path.insert(path, node);
    }

    fn remove(&mut self, path: &str) -> bool {
        let existed = self.by_path.contains_key(path);
        self.by_path.retain(|p, _| !is_within(p, path));
        self.children.retain(|p, _| !is_within(p, path));
        if let Some(siblings) = parent_path(path).and_then(|parent| self.children.get_mut(&parent)) {
            siblings.retain(|p| p != path);
        }
        existed
    }
}

/// A content tree held entirely in memory.
///
/// Inserting a node creates missing ancestors as `nt:unstructured` nodes.
/// Children are listed in insertion order. The tree can be mutated through a
/// shared reference so tests can change content underneath a running
/// [`Librarian`](crate::librarian::Librarian) and then deliver the matching
/// change events.
///
/// ```
/// use pagelib::content::{ContentNode, ContentTree, MemoryContentTree};
///
/// let tree = MemoryContentTree::new()
///     .with(ContentNode::new("/apps/site/clientlibs", "cq:ClientLibraryFolder")
///         .with_property("categories", ["site.base"]))
///     .with_file("/apps/site/clientlibs/css.txt", "style.css");
///
/// assert!(tree.node("/apps/site").unwrap().is_some());
/// assert_eq!(tree.read_text("/apps/site/clientlibs/css.txt").unwrap().as_deref(), Some("style.css"));
/// ```
#[derive(Debug)]
pub struct MemoryContentTree {
    nodes: RwLock<Nodes>,
}

impl Default for MemoryContentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryContentTree {
    /// Create a tree containing only the root node.
    pub fn new() -> Self {
        let mut nodes = Nodes::default();
        nodes.insert(ContentNode::new("/", UNSTRUCTURED_TYPE));
        Self {
            nodes: RwLock::new(nodes),
        }
    }

    /// Builder: add a node.
    #[must_use]
    pub fn with(self, node: ContentNode) -> Self {
        self.insert(node);
        self
    }

    /// Builder: add a node of the given type with properties.
    #[must_use]
    pub fn with_node<I, K, V>(self, path: &str, node_type: &str, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<PropertyValue>,
    {
        let node = properties
            .into_iter()
            .fold(ContentNode::new(path, node_type), |node, (k, v)| node.with_property(k, v));
        self.with(node)
    }

    /// Builder: add an `nt:file` node holding `text`.
    #[must_use]
    pub fn with_file(self, path: &str, text: &str) -> Self {
        self.write_file(path, text);
        self
    }

    /// Add or replace a node.
    pub fn insert(&self, node: ContentNode) {
        self.nodes.write().unwrap_or_else(PoisonError::into_inner).insert(node);
    }

    /// Add or replace a file node.
    pub fn write_file(&self, path: &str, text: &str) {
        self.insert(ContentNode::new(path, FILE_TYPE).with_property(PROP_DATA, text));
    }

    /// Set one property on an existing node. Returns `false` when the node is missing.
    pub fn set_property(&self, path: &str, name: &str, value: impl Into<PropertyValue>) -> bool {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        match nodes.by_path.get_mut(&normalize(path)) {
            Some(node) => {
                node.properties.insert(name.to_string(), value.into());
                true
            }
            None => false,
        }
    }

    /// Remove a node and its subtree. Returns `false` when the node was missing.
    pub fn remove(&self, path: &str) -> bool {
        self.nodes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&normalize(path))
    }

    /// Number of nodes, the root included.
    pub fn len(&self) -> usize {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner).by_path.len()
    }

    /// Whether only the root exists.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

impl ContentTree for MemoryContentTree {
    fn node(&self, path: &str) -> Result<Option<ContentNode>> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        Ok(nodes.by_path.get(&normalize(path)).cloned())
    }

    fn children(&self, path: &str) -> Result<Vec<ContentNode>> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        let children = nodes
            .children
            .get(&normalize(path))
            .map(|paths| paths.iter().filter_map(|p| nodes.by_path.get(p).cloned()).collect())
            .unwrap_or_default();
        Ok(children)
    }
}
