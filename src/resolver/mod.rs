//! Inclusion resolution and bundle compilation.
//!
//! The resolver turns a compilation root into an ordered list of libraries
//! and, from there, into one concatenated bundle.
//!
//! # Algorithm
//!
//! 1. **Flatten**: collect the distinct component resource types under the
//!    root, grafting in embedded components ([`flatten`])
//! 2. **Required categories**: union the dependency categories of every
//!    registered component type; unregistered types contribute nothing
//! 3. **Inclusion**: starting from the libraries of the required categories,
//!    follow `dependencies` ([`EdgeType::DependsOn`]) and `embed`
//!    ([`EdgeType::Embeds`]) transitively. Each edge orders its target first
//! 4. **Conditional dependencies**: added as ordering edges only between
//!    libraries already included
//! 5. **Filter**: drop libraries not eligible for the active run modes or the
//!    requested brand, bridging edges through dropped libraries
//! 6. **Order**: [`DependencyGraph::ordering`], dependencies first
//! 7. **Compile**: read each library's sources for the asset type, run LESS
//!    and Sass sources through the [`Preprocessor`], join with newlines
//!
//! A [`Resolver`] borrows an immutable [`IndexSnapshot`] and holds no mutable
//! state, so any number of resolvers can run concurrently.

pub mod dependency_graph;
pub mod export;
pub mod flatten;

pub use dependency_graph::{DependencyGraph, EdgeType};
pub use export::{GraphEdge, GraphExport, GraphNode};

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::content::{ContentTree, canonical_root};
use crate::core::{AssetType, LibraryError, Result};
use crate::index::IndexSnapshot;
use crate::library::Library;
use crate::preprocessor::{PassthroughPreprocessor, Preprocessor};

/// Resolves and compiles roots against one index snapshot.
pub struct Resolver<'a> {
    tree: &'a dyn ContentTree,
    snapshot: &'a IndexSnapshot,
    run_modes: &'a BTreeSet<String>,
    preprocessor: &'a dyn Preprocessor,
}

impl<'a> Resolver<'a> {
    /// Create a resolver that passes stylesheet sources through unprocessed.
    pub fn new(
        tree: &'a dyn ContentTree,
        snapshot: &'a IndexSnapshot,
        run_modes: &'a BTreeSet<String>,
    ) -> Self {
        Self {
            tree,
            snapshot,
            run_modes,
            preprocessor: &PassthroughPreprocessor,
        }
    }

    /// Use `preprocessor` for LESS and Sass sources.
    #[must_use]
    pub fn with_preprocessor(mut self, preprocessor: &'a dyn Preprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    /// Canonical form of a compilation root; errors when it does not exist.
    pub fn canonical_root(&self, root: &str) -> Result<String> {
        let canonical = canonical_root(self.tree, root)?;
        if self.tree.node(&canonical)?.is_none() {
            return Err(LibraryError::ContentNotFound {
                path: root.to_string(),
            });
        }
        Ok(canonical)
    }

    /// Component resource types rendered under `root`.
    pub fn component_types(&self, root: &str) -> Result<Vec<String>> {
        let root = self.canonical_root(root)?;
        flatten::component_types(self.tree, self.snapshot.components(), &root)
    }

    /// Categories required by the components under `root`, in discovery order.
    pub fn required_categories(&self, root: &str) -> Result<Vec<String>> {
        let components = self.snapshot.components();
        let mut seen = HashSet::new();
        let mut categories = Vec::new();
        for resource_type in self.component_types(root)? {
            if let Some(component) = components.component(&resource_type) {
                for category in &component.dependencies {
                    if seen.insert(category.clone()) {
                        categories.push(category.clone());
                    }
                }
            }
        }
        debug!("Root {} requires categories {:?}", root, categories);
        Ok(categories)
    }

    fn libraries_for(&self, category: &str, unknown: &mut HashSet<String>) -> &'a [Arc<Library>] {
        match self.snapshot.libraries_for_category(category) {
            Ok(libraries) => libraries,
            Err(e) => {
                if unknown.insert(category.to_string()) {
                    warn!("{}, ignoring", e);
                }
                &[]
            }
        }
    }

    /// Unfiltered inclusion graph for a set of categories.
    ///
    /// Unknown categories are logged and contribute nothing.
    pub fn library_graph(&self, categories: &[String]) -> DependencyGraph<Arc<Library>> {
        let mut unknown = HashSet::new();
        let mut graph = DependencyGraph::new();
        let mut queue = VecDeque::new();
        let mut expanded = HashSet::new();

        for category in categories {
            for library in self.libraries_for(category, &mut unknown) {
                graph.add_node(Arc::clone(library));
                queue.push_back(Arc::clone(library));
            }
        }

        while let Some(library) = queue.pop_front() {
            if !expanded.insert(library.path().to_string()) {
                continue;
            }
            let edges = library
                .dependencies()
                .iter()
                .map(|c| (c, EdgeType::DependsOn))
                .chain(library.embedded_categories().iter().map(|c| (c, EdgeType::Embeds)));
            for (category, edge_type) in edges {
                for target in self.libraries_for(category, &mut unknown) {
                    graph.add_edge(Arc::clone(&library), Arc::clone(target), edge_type);
                    queue.push_back(Arc::clone(target));
                }
            }
        }

        let included: Vec<Arc<Library>> = graph.nodes().cloned().collect();
        for library in &included {
            for category in library.conditional_dependencies() {
                for target in self.libraries_for(category, &mut unknown) {
                    if graph.contains(target) {
                        graph.add_edge(Arc::clone(library), Arc::clone(target), EdgeType::DependsOn);
                    }
                }
            }
        }

        graph
    }

    /// Run-mode and brand filter applied to an inclusion graph.
    pub fn filter_graph(
        &self,
        graph: &DependencyGraph<Arc<Library>>,
        brand: Option<&str>,
    ) -> DependencyGraph<Arc<Library>> {
        graph.filtered(|library| {
            library.is_included_for_run_modes(self.run_modes) && library.is_included_for_brand(brand)
        })
    }

    /// Filtered inclusion graph for `root` and `brand`.
    pub fn dependency_graph(
        &self,
        root: &str,
        brand: Option<&str>,
    ) -> Result<DependencyGraph<Arc<Library>>> {
        let categories = self.required_categories(root)?;
        let graph = self.library_graph(&categories);
        let filtered = self.filter_graph(&graph, brand);
        debug!(
            "Resolved {} libraries for {} ({} after run-mode/brand filtering)",
            graph.node_count(),
            root,
            filtered.node_count()
        );
        Ok(filtered)
    }

    /// Ordered libraries for `root`, dependencies first.
    pub fn resolve(&self, root: &str, brand: Option<&str>) -> Result<Vec<Arc<Library>>> {
        Ok(self.dependency_graph(root, brand)?.ordering())
    }

    /// Compile the bundle of `asset_type` for `root`.
    ///
    /// Returns an empty string when no resolved library has sources of that
    /// type. A preprocessor failure aborts the whole compile.
    pub fn compile(&self, root: &str, asset_type: AssetType, brand: Option<&str>) -> Result<String> {
        let libraries = self.resolve(root, brand)?;
        self.concatenate(&libraries, asset_type)
    }

    /// Concatenate the sources of `libraries` in the given order.
    pub fn concatenate(&self, libraries: &[Arc<Library>], asset_type: AssetType) -> Result<String> {
        let mut parts = Vec::new();

        for library in libraries {
            for source in library.sources(asset_type) {
                let Some(text) = self.tree.read_text(&source.path)? else {
                    warn!(
                        "Source {} of library {} does not exist, skipping",
                        source.path,
                        library.path()
                    );
                    continue;
                };
                if source.syntax.needs_preprocessing() {
                    parts.push(self.preprocessor.compile(&text, &source.path, source.syntax)?);
                } else {
                    parts.push(text);
                }
            }
        }

        debug!(
            "Concatenated {} bundle from {} libraries ({} files)",
            asset_type,
            libraries.len(),
            parts.len()
        );
        Ok(parts.join("\n"))
    }
}
