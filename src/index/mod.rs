//! Immutable index snapshots.
//!
//! An [`IndexSnapshot`] holds every library and registered component found in
//! one full scan of the content tree. Snapshots are never modified: the
//! [`Librarian`](crate::librarian::Librarian) builds a new one off to the side
//! and swaps the shared reference, so compile requests always see one
//! consistent state.
//!
//! # Build
//!
//! 1. Every configured library root is scanned for `cq:ClientLibraryFolder`
//!    nodes, in root order and then tree pre-order (discovery order)
//! 2. Each folder becomes a [`Library`]; its include files are read
//! 3. The components root is scanned into a [`ComponentIndex`]
//!
//! Any content-tree error aborts the whole build; there is no partially built
//! snapshot.

mod statistics;

pub use statistics::{IndexStatistics, StatisticsBuilder};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::component::ComponentIndex;
use crate::config::LibrarianConfig;
use crate::constants::LIBRARY_FOLDER_TYPE;
use crate::content::{ContentTree, normalize, parent_path};
use crate::core::{LibraryError, Result};
use crate::library::Library;

/// One consistent view of all libraries and components.
#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    libraries: Vec<Arc<Library>>,
    by_category: HashMap<String, Vec<Arc<Library>>>,
    by_path: HashMap<String, Arc<Library>>,
    components: ComponentIndex,
    statistics: IndexStatistics,
}

impl IndexSnapshot {
    /// Scan the content tree and build a snapshot.
    pub fn build(tree: &dyn ContentTree, config: &LibrarianConfig) -> Result<Self> {
        let mut stats = StatisticsBuilder::new();

        let mut seen = HashSet::new();
        let mut libraries = Vec::new();
        for root in &config.library_roots {
            let folders = tree.descendants(root, &|node| node.is_type(LIBRARY_FOLDER_TYPE))?;
            debug!("Found {} library folders under {}", folders.len(), root);
            for folder in folders {
                if !seen.insert(folder.path.clone()) {
                    continue;
                }
                let library = Library::from_node(tree, &folder)?;
                stats.record_library(&library);
                libraries.push(library);
            }
        }

        let components = ComponentIndex::build(tree, &config.components_root)?;
        stats.record_components(&components);

        let snapshot = Self::from_parts(libraries, components, stats.build());
        info!("Built library index: {}", snapshot.statistics);
        Ok(snapshot)
    }

    /// Assemble a snapshot from already built parts.
    pub fn from_parts(
        libraries: Vec<Library>,
        components: ComponentIndex,
        statistics: IndexStatistics,
    ) -> Self {
        let libraries: Vec<Arc<Library>> = libraries.into_iter().map(Arc::new).collect();
        let mut by_category: HashMap<String, Vec<Arc<Library>>> = HashMap::new();
        let mut by_path = HashMap::new();
        for library in &libraries {
            for category in library.categories() {
                by_category
                    .entry(category.clone())
                    .or_default()
                    .push(Arc::clone(library));
            }
            by_path.insert(library.path().to_string(), Arc::clone(library));
        }

        Self {
            libraries,
            by_category,
            by_path,
            components,
            statistics,
        }
    }

    /// Number of indexed libraries.
    pub fn library_count(&self) -> usize {
        self.libraries.len()
    }

    /// Libraries carrying `category`, in discovery order.
    ///
    /// # Errors
    ///
    /// [`LibraryError::InvalidCategory`] when no library carries it.
    pub fn libraries_for_category(&self, category: &str) -> Result<&[Arc<Library>]> {
        self.by_category
            .get(category)
            .map(Vec::as_slice)
            .ok_or_else(|| LibraryError::InvalidCategory {
                category: category.to_string(),
            })
    }

    /// Every category with its libraries, sorted by category name; each list
    /// keeps discovery order.
    pub fn libraries_by_category(&self) -> BTreeMap<String, Vec<Arc<Library>>> {
        self.by_category
            .iter()
            .map(|(category, libraries)| (category.clone(), libraries.clone()))
            .collect()
    }

    /// The library whose folder is exactly `path`.
    pub fn library_at(&self, path: &str) -> Option<&Arc<Library>> {
        self.by_path.get(&normalize(path))
    }

    /// The library whose folder is `path` or its nearest ancestor.
    pub fn library_containing(&self, path: &str) -> Option<&Arc<Library>> {
        let mut current = Some(normalize(path));
        while let Some(path) = current {
            if let Some(library) = self.by_path.get(&path) {
                return Some(library);
            }
            current = parent_path(&path);
        }
        None
    }

    /// All libraries in discovery order.
    pub fn all_libraries(&self) -> &[Arc<Library>] {
        &self.libraries
    }

    /// The component index.
    pub fn components(&self) -> &ComponentIndex {
        &self.components
    }

    /// Statistics of the build that produced this snapshot.
    pub fn statistics(&self) -> &IndexStatistics {
        &self.statistics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentNode, MemoryContentTree};

    fn folder(path: &str, categories: &[&str]) -> ContentNode {
        ContentNode::new(path, LIBRARY_FOLDER_TYPE)
            .with_property("categories", categories.iter().map(|c| (*c).to_string()).collect::<Vec<_>>())
    }

    fn config() -> LibrarianConfig {
        LibrarianConfig::default()
    }

    #[test]
    fn test_build_indexes_all_roots_in_order() {
        let tree = MemoryContentTree::new()
            .with(folder("/libs/vendor", &["shared"]))
            .with(folder("/apps/site/clientlibs", &["site", "shared"]))
            .with(folder("/etc/designs/x", &["design"]));

        let snapshot = IndexSnapshot::build(&tree, &config()).unwrap();
        assert_eq!(snapshot.library_count(), 3);

        let shared: Vec<_> = snapshot
            .libraries_for_category("shared")
            .unwrap()
            .iter()
            .map(|l| l.path().to_string())
            .collect();
        assert_eq!(shared, vec!["/apps/site/clientlibs", "/libs/vendor"]);

        let stats = snapshot.statistics();
        assert_eq!(stats.library_count, 3);
        assert_eq!(stats.category_count, 3);
    }

    #[test]
    fn test_unknown_category_is_invalid() {
        let snapshot = IndexSnapshot::default();
        assert!(matches!(
            snapshot.libraries_for_category("missing"),
            Err(LibraryError::InvalidCategory { .. })
        ));
    }

    #[test]
    fn test_library_containing_walks_ancestors() {
        let tree = MemoryContentTree::new()
            .with(folder("/apps/lib", &["a"]))
            .with_file("/apps/lib/css/site.css", "body{}");
        let snapshot = IndexSnapshot::build(&tree, &config()).unwrap();

        assert!(snapshot.library_at("/apps/lib").is_some());
        assert!(snapshot.library_at("/apps/lib/css").is_none());
        assert_eq!(
            snapshot.library_containing("/apps/lib/css/site.css").map(|l| l.path()),
            Some("/apps/lib")
        );
        assert!(snapshot.library_containing("/apps/other").is_none());
    }

    #[test]
    fn test_by_category_map_is_sorted() {
        let tree = MemoryContentTree::new()
            .with(folder("/apps/b", &["zeta", "shared"]))
            .with(folder("/apps/a", &["alpha", "shared"]));
        let snapshot = IndexSnapshot::build(&tree, &config()).unwrap();
        let by_category = snapshot.libraries_by_category();
        let keys: Vec<_> = by_category.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["alpha", "shared", "zeta"]);

        // Within a category: discovery order, not path order
        let shared: Vec<_> = by_category["shared"].iter().map(|l| l.path()).collect();
        let discovered: Vec<_> = snapshot.all_libraries().iter().map(|l| l.path()).collect();
        assert_eq!(shared, discovered);
    }
}
