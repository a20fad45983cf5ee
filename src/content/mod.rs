//! Access to the content tree that library folders, components and pages live in.
//!
//! The content tree itself is an external collaborator: pagelib only needs to
//! look up nodes, list children, run a descendant query and read file text.
//! [`ContentTree`] captures exactly that surface. Two adapters ship with the
//! crate:
//!
//! - [`MemoryContentTree`] - an in-memory tree, mutable at runtime, used by
//!   tests and by embedders that already hold content in memory
//! - [`FsContentTree`] - a directory-backed tree where every directory is a
//!   node and an optional `.content.toml` holds its properties
//!
//! # Paths
//!
//! Paths are absolute, `/`-separated strings. The helpers in this module
//! ([`normalize`], [`join`], [`parent_path`], [`is_within`]) operate on those
//! strings only and never touch the filesystem.
//!
//! # Containers
//!
//! Pages keep their content in a `jcr:content` child. [`container_path`] and
//! [`canonical_root`] are the single place where the node-versus-container
//! distinction is handled; the resolver and the event classifier both go
//! through them.

pub mod fs;
pub mod memory;

pub use fs::FsContentTree;
pub use memory::MemoryContentTree;

use serde::Serialize;
use std::collections::BTreeMap;

use crate::constants::{CONTAINER_NODE, PROP_DATA, PROP_RESOURCE_SUPER_TYPE, PROP_RESOURCE_TYPE};
use crate::core::Result;

/// A property value: a single string or an ordered list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Single-valued property
    String(String),
    /// Multi-valued property
    Strings(Vec<String>),
}

impl PropertyValue {
    /// Read the value as a list. A single string is a one-element list.
    pub fn as_strings(&self) -> Vec<String> {
        match self {
            Self::String(value) => vec![value.clone()],
            Self::Strings(values) => values.clone(),
        }
    }

    /// Read the value as a single string; lists yield their first element.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            Self::Strings(values) => values.first().map(String::as_str),
        }
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
        Self::Strings(values)
    }
}

impl<const N: usize> From<[&str; N]> for PropertyValue {
    fn from(values: [&str; N]) -> Self {
        Self::Strings(values.iter().map(|v| (*v).to_string()).collect())
    }
}

/// One node of the content tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentNode {
    /// Absolute path
    pub path: String,
    /// Primary node type (`cq:ClientLibraryFolder`, `cq:Component`, `nt:file`, ...)
    pub node_type: String,
    /// Property map
    pub properties: BTreeMap<String, PropertyValue>,
}

impl ContentNode {
    /// Create a node without properties.
    pub fn new(path: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            path: normalize(&path.into()),
            node_type: node_type.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style property setter.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Last path segment; empty for the root.
    pub fn name(&self) -> &str {
        node_name(&self.path)
    }

    /// Whether the node has the given primary type.
    pub fn is_type(&self, node_type: &str) -> bool {
        self.node_type == node_type
    }

    /// Whether the property is present.
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Single string value of a property.
    pub fn string(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(PropertyValue::as_str)
    }

    /// List value of a property; empty when absent.
    pub fn strings(&self, name: &str) -> Vec<String> {
        self.properties.get(name).map(PropertyValue::as_strings).unwrap_or_default()
    }

    /// `sling:resourceType` of the node.
    pub fn resource_type(&self) -> Option<&str> {
        self.string(PROP_RESOURCE_TYPE)
    }

    /// `sling:resourceSuperType` of the node.
    pub fn resource_super_type(&self) -> Option<&str> {
        self.string(PROP_RESOURCE_SUPER_TYPE)
    }
}

/// Read access to a content tree.
///
/// Implementations must be safe to share between the refresh worker and
/// concurrent compile requests.
pub trait ContentTree: Send + Sync {
    /// Look up a node. `Ok(None)` when the path does not exist.
    fn node(&self, path: &str) -> Result<Option<ContentNode>>;

    /// Direct children of a node in a stable order. Empty when the node is missing.
    fn children(&self, path: &str) -> Result<Vec<ContentNode>>;

    /// Every descendant of `root` (excluding `root`) accepted by `filter`, in pre-order.
    fn descendants(
        &self,
        root: &str,
        filter: &dyn Fn(&ContentNode) -> bool,
    ) -> Result<Vec<ContentNode>> {
        let mut found = Vec::new();
        let mut stack: Vec<ContentNode> = self.children(root)?.into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            let children = self.children(&node.path)?;
            stack.extend(children.into_iter().rev());
            if filter(&node) {
                found.push(node);
            }
        }
        Ok(found)
    }

    /// Text payload of a file node: its `jcr:data` property or that of its
    /// `jcr:content` child.
    fn read_text(&self, path: &str) -> Result<Option<String>> {
        if let Some(node) = self.node(path)? {
            if let Some(data) = node.string(PROP_DATA) {
                return Ok(Some(data.to_string()));
            }
            if let Some(content) = self.node(&join(path, CONTAINER_NODE))? {
                return Ok(content.string(PROP_DATA).map(str::to_string));
            }
        }
        Ok(None)
    }
}

/// Normalize a path: leading `/`, no empty, `.` or `..` segments, no trailing `/`.
///
/// `..` above the root is dropped.
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Join `relative` onto `base`. An absolute `relative` replaces `base`.
pub fn join(base: &str, relative: &str) -> String {
    if relative.starts_with('/') {
        normalize(relative)
    } else {
        normalize(&format!("{base}/{relative}"))
    }
}

/// Parent of a path; `None` for the root.
pub fn parent_path(path: &str) -> Option<String> {
    let path = normalize(path);
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/".to_string()),
        Some(idx) => Some(path[..idx].to_string()),
        None => None,
    }
}

/// Last segment of a path.
pub fn node_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or_default()
}

/// Whether `path` equals `prefix` or lies underneath it, segment-wise.
///
/// `/a/b` is within `/a` but `/ab` is not.
pub fn is_within(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return path.starts_with('/');
    }
    path == prefix
        || (path.starts_with(prefix) && path.as_bytes().get(prefix.len()) == Some(&b'/'))
}

/// Truncate `path` right after its first `jcr:content` segment.
///
/// Returns `None` when the path crosses no container.
///
/// ```
/// use pagelib::content::container_path;
///
/// assert_eq!(
///     container_path("/content/site/home/jcr:content/par/text").as_deref(),
///     Some("/content/site/home/jcr:content")
/// );
/// assert_eq!(container_path("/content/site/home"), None);
/// ```
pub fn container_path(path: &str) -> Option<String> {
    let normalized = normalize(path);
    let mut current = String::new();
    for segment in normalized.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        if segment == CONTAINER_NODE {
            return Some(current);
        }
    }
    None
}

/// Map a compile root to the node whose subtree is compiled.
///
/// A path that already crosses a container is used as-is. Otherwise the
/// node's `jcr:content` child is used when present, so `/content/home` and
/// `/content/home/jcr:content` compile (and cache) identically.
pub fn canonical_root(tree: &dyn ContentTree, path: &str) -> Result<String> {
    let normalized = normalize(path);
    if container_path(&normalized).is_some() {
        return Ok(normalized);
    }
    let container = join(&normalized, CONTAINER_NODE);
    if tree.node(&container)?.is_some() {
        Ok(container)
    } else {
        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("a//b/./c/../d/"), "/a/b/d");
        assert_eq!(normalize("/../x"), "/x");
        assert_eq!(normalize(""), "/");
    }

    #[test]
    fn test_join_and_parent() {
        assert_eq!(join("/apps/lib", "css/site.css"), "/apps/lib/css/site.css");
        assert_eq!(join("/apps/lib", "/etc/shared.css"), "/etc/shared.css");
        assert_eq!(parent_path("/apps/lib").as_deref(), Some("/apps"));
        assert_eq!(parent_path("/apps").as_deref(), Some("/"));
        assert_eq!(parent_path("/"), None);
    }

    #[test]
    fn test_is_within_is_segment_aware() {
        assert!(is_within("/content/a/b", "/content/a"));
        assert!(is_within("/content/a", "/content/a"));
        assert!(!is_within("/content/ab", "/content/a"));
        assert!(is_within("/anything", "/"));
    }

    #[test]
    fn test_container_path_for_property_path() {
        assert_eq!(
            container_path("/content/home/jcr:content/par/jcr:title").as_deref(),
            Some("/content/home/jcr:content")
        );
    }

    #[test]
    fn test_canonical_root_prefers_container_child() {
        let tree = MemoryContentTree::new()
            .with(ContentNode::new("/content/home", "cq:Page"))
            .with(ContentNode::new("/content/home/jcr:content", "cq:PageContent"))
            .with(ContentNode::new("/content/bare", "nt:unstructured"));

        assert_eq!(canonical_root(&tree, "/content/home").unwrap(), "/content/home/jcr:content");
        assert_eq!(canonical_root(&tree, "/content/bare").unwrap(), "/content/bare");
        assert_eq!(
            canonical_root(&tree, "/content/home/jcr:content/par").unwrap(),
            "/content/home/jcr:content/par"
        );
    }

    #[test]
    fn test_property_value_list_reading() {
        let node = ContentNode::new("/x", "nt:unstructured")
            .with_property("single", "a")
            .with_property("many", ["b", "c"]);
        assert_eq!(node.strings("single"), vec!["a"]);
        assert_eq!(node.strings("many"), vec!["b", "c"]);
        assert_eq!(node.string("many"), Some("b"));
        assert!(node.strings("missing").is_empty());
    }
}
