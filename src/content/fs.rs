//! Directory-backed [`ContentTree`] adapter.
//!
//! Layout conventions:
//!
//! - every directory is a node; its name is the last path segment
//! - an optional `.content.toml` inside a directory holds the node's
//!   properties, with `jcr:primaryType` selecting the node type
//!   (`nt:unstructured` when absent)
//! - every regular file is an `nt:file` node whose text is the file contents
//!
//! ```toml
//! # apps/site/clientlibs/base/.content.toml
//! "jcr:primaryType" = "cq:ClientLibraryFolder"
//! categories = ["site.base"]
//! dependencies = ["vendor.jquery"]
//! runModes = ["author", "publish"]
//! ```
//!
//! Strings and arrays map to [`PropertyValue`]; any other TOML value is kept
//! in its TOML text form.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::trace;
use walkdir::WalkDir;

use super::{ContentNode, ContentTree, PropertyValue, join, normalize};
use crate::constants::{
    CONTAINER_NODE, FILE_TYPE, NODE_PROPERTIES_FILE, PROP_DATA, PROP_PRIMARY_TYPE,
    UNSTRUCTURED_TYPE,
};
use crate::core::{LibraryError, Result};

/// A content tree rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct FsContentTree {
    root: PathBuf,
}

impl FsContentTree {
    /// Create a tree over `root`. The directory must exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(LibraryError::ContentNotFound {
                path: root.display().to_string(),
            });
        }
        Ok(Self { root })
    }

    /// Directory this tree reads from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn fs_path(&self, path: &str) -> PathBuf {
        normalize(path)
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }

    fn content_path(&self, fs_path: &Path) -> String {
        let relative = fs_path.strip_prefix(&self.root).unwrap_or(fs_path);
        let segments: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        format!("/{}", segments.join("/"))
    }

    fn read_node(&self, path: &str, fs_path: &Path) -> Result<Option<ContentNode>> {
        let metadata = match fs::metadata(fs_path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LibraryError::content_access(path, e)),
        };

        if metadata.is_file() {
            return Ok(Some(ContentNode::new(path, FILE_TYPE)));
        }

        let props_file = fs_path.join(NODE_PROPERTIES_FILE);
        if !props_file.is_file() {
            return Ok(Some(ContentNode::new(path, UNSTRUCTURED_TYPE)));
        }

        trace!("Reading properties from {}", props_file.display());
        let text =
            fs::read_to_string(&props_file).map_err(|e| LibraryError::content_access(path, e))?;
        let table: toml::Table =
            toml::from_str(&text).map_err(|e| LibraryError::content_access(path, e))?;

        let mut node_type = UNSTRUCTURED_TYPE.to_string();
        let mut node = ContentNode::new(path, UNSTRUCTURED_TYPE);
        for (name, value) in table {
            if name == PROP_PRIMARY_TYPE {
                if let toml::Value::String(t) = value {
                    node_type = t;
                }
                continue;
            }
            node.properties.insert(name, property_value(value));
        }
        node.node_type = node_type;
        Ok(Some(node))
    }
}

fn property_value(value: toml::Value) -> PropertyValue {
    match value {
        toml::Value::String(s) => PropertyValue::String(s),
        toml::Value::Array(items) => PropertyValue::Strings(
            items
                .into_iter()
                .map(|item| match item {
                    toml::Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
        ),
        other => PropertyValue::String(other.to_string()),
    }
}

fn is_properties_file(path: &Path) -> bool {
    path.file_name().is_some_and(|name| name == NODE_PROPERTIES_FILE)
}

impl ContentTree for FsContentTree {
    fn node(&self, path: &str) -> Result<Option<ContentNode>> {
        let path = normalize(path);
        self.read_node(&path, &self.fs_path(&path))
    }

    fn children(&self, path: &str) -> Result<Vec<ContentNode>> {
        let path = normalize(path);
        let dir = self.fs_path(&path);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries: Vec<PathBuf> = fs::read_dir(&dir)
            .map_err(|e| LibraryError::content_access(&path, e))?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|p| !is_properties_file(p))
            .collect();
        entries.sort();

        let mut children = Vec::with_capacity(entries.len());
        for entry in entries {
            let child_path = self.content_path(&entry);
            if let Some(node) = self.read_node(&child_path, &entry)? {
                children.push(node);
            }
        }
        Ok(children)
    }

    fn descendants(
        &self,
        root: &str,
        filter: &dyn Fn(&ContentNode) -> bool,
    ) -> Result<Vec<ContentNode>> {
        let root = normalize(root);
        let dir = self.fs_path(&root);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| LibraryError::content_access(&root, e))?;
            if is_properties_file(entry.path()) {
                continue;
            }
            let path = self.content_path(entry.path());
            if let Some(node) = self.read_node(&path, entry.path())? {
                if filter(&node) {
                    found.push(node);
                }
            }
        }
        Ok(found)
    }

    fn read_text(&self, path: &str) -> Result<Option<String>> {
        let path = normalize(path);
        let fs_path = self.fs_path(&path);
        if fs_path.is_file() {
            return fs::read_to_string(&fs_path)
                .map(Some)
                .map_err(|e| LibraryError::content_access(&path, e));
        }
        if let Some(node) = self.read_node(&path, &fs_path)? {
            if let Some(data) = node.string(PROP_DATA) {
                return Ok(Some(data.to_string()));
            }
            let container = self.fs_path(&join(&path, CONTAINER_NODE));
            if container.is_file() {
                return fs::read_to_string(&container)
                    .map(Some)
                    .map_err(|e| LibraryError::content_access(&path, e));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, text: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn test_directory_with_properties_file() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "apps/lib/.content.toml",
            "\"jcr:primaryType\" = \"cq:ClientLibraryFolder\"\ncategories = [\"a\", \"b\"]\nallowProxy = true\n",
        );
        let tree = FsContentTree::new(temp.path()).unwrap();

        let node = tree.node("/apps/lib").unwrap().unwrap();
        assert_eq!(node.node_type, "cq:ClientLibraryFolder");
        assert_eq!(node.strings("categories"), vec!["a", "b"]);
        assert_eq!(node.string("allowProxy"), Some("true"));
        assert!(!node.has_property(PROP_PRIMARY_TYPE));
    }

    #[test]
    fn test_children_sorted_and_properties_file_hidden() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "lib/js.txt", "a.js");
        write(temp.path(), "lib/css.txt", "a.css");
        write(temp.path(), "lib/.content.toml", "");
        let tree = FsContentTree::new(temp.path()).unwrap();

        let names: Vec<_> = tree
            .children("/lib")
            .unwrap()
            .iter()
            .map(|n| n.name().to_string())
            .collect();
        assert_eq!(names, vec!["css.txt", "js.txt"]);
        assert_eq!(tree.read_text("/lib/css.txt").unwrap().as_deref(), Some("a.css"));
    }

    #[test]
    fn test_descendants_filters_by_type() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "apps/a/.content.toml", "\"jcr:primaryType\" = \"cq:Component\"\n");
        write(temp.path(), "apps/a/b/.content.toml", "\"jcr:primaryType\" = \"cq:Component\"\n");
        write(temp.path(), "apps/a/file.html", "<p/>");
        let tree = FsContentTree::new(temp.path()).unwrap();

        let found: Vec<_> = tree
            .descendants("/apps", &|n| n.is_type("cq:Component"))
            .unwrap()
            .into_iter()
            .map(|n| n.path)
            .collect();
        assert_eq!(found, vec!["/apps/a", "/apps/a/b"]);
    }

    #[test]
    fn test_missing_paths() {
        let temp = TempDir::new().unwrap();
        let tree = FsContentTree::new(temp.path()).unwrap();
        assert!(tree.node("/nope").unwrap().is_none());
        assert!(tree.children("/nope").unwrap().is_empty());
        assert!(tree.read_text("/nope").unwrap().is_none());
        assert!(FsContentTree::new(temp.path().join("absent")).is_err());
    }

    #[test]
    fn test_malformed_properties_file_is_an_access_error() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "bad/.content.toml", "categories = [");
        let tree = FsContentTree::new(temp.path()).unwrap();
        assert!(matches!(tree.node("/bad"), Err(LibraryError::ContentAccess { .. })));
    }
}
