//! JSON export of the component/category/library graph of a root.
//!
//! ```json
//! {
//!   "nodes": [
//!     { "type": "component", "id": "site/page", "resourceType": "site/page", "dependencies": ["site"] },
//!     { "type": "library", "id": "/apps/site/clientlibs", "path": "/apps/site/clientlibs", ... },
//!     { "type": "category", "id": "site", "name": "site" }
//!   ],
//!   "edges": [
//!     { "from": "site/page", "to": "site", "type": "dependsOn" },
//!     { "from": "/apps/site/clientlibs", "to": "site", "type": "memberOf" }
//!   ]
//! }
//! ```

use serde::Serialize;

use super::{EdgeType, Resolver};
use crate::core::{AssetType, Result};

/// One node of the exported graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GraphNode {
    /// A category name
    Category {
        /// Node identifier (the category)
        id: String,
        /// Category name
        name: String,
    },
    /// A resolved library
    #[serde(rename_all = "camelCase")]
    Library {
        /// Node identifier (the library path)
        id: String,
        /// Library folder path
        path: String,
        /// Include files found for the library
        include_paths: Vec<String>,
        /// Every source file of the library
        resource_paths: Vec<String>,
        /// Categories the library belongs to
        categories: Vec<String>,
        /// Embedded categories
        embeds: Vec<String>,
        /// Dependency categories
        dependencies: Vec<String>,
        /// Composite run-mode strings
        run_modes: Vec<String>,
        /// Brands
        brands: Vec<String>,
    },
    /// A component type found under the root
    #[serde(rename_all = "camelCase")]
    Component {
        /// Node identifier (the resource type)
        id: String,
        /// Resource type
        resource_type: String,
        /// Definition path; absent for unregistered types
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        /// Resource super type
        #[serde(skip_serializing_if = "Option::is_none")]
        resource_super_type: Option<String>,
        /// Dependency categories
        dependencies: Vec<String>,
    },
}

impl GraphNode {
    /// Node identifier.
    pub fn id(&self) -> &str {
        match self {
            Self::Category { id, .. } | Self::Library { id, .. } | Self::Component { id, .. } => id,
        }
    }
}

/// A directed edge between two node identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    /// Source node identifier
    pub from: String,
    /// Target node identifier
    pub to: String,
    /// Relationship
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
}

/// Graph document for one root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphExport {
    /// Components, then libraries, then categories
    pub nodes: Vec<GraphNode>,
    /// Component, membership, dependency and embed edges
    pub edges: Vec<GraphEdge>,
}

impl GraphExport {
    /// Build the export for `root` and `brand`.
    pub fn build(resolver: &Resolver<'_>, root: &str, brand: Option<&str>) -> Result<Self> {
        let mut export = Self::default();
        let mut categories: Vec<String> = Vec::new();

        let components = resolver.snapshot.components();
        for resource_type in resolver.component_types(root)? {
            match components.component(&resource_type) {
                Some(component) => {
                    for dependency in &component.dependencies {
                        export.edge(&component.resource_type, dependency, EdgeType::DependsOn);
                        note(dependency, &mut categories);
                    }
                    export.nodes.push(GraphNode::Component {
                        id: component.resource_type.clone(),
                        resource_type: component.resource_type.clone(),
                        path: Some(component.path.clone()),
                        resource_super_type: component.resource_super_type.clone(),
                        dependencies: component.dependencies.clone(),
                    });
                }
                None => export.nodes.push(GraphNode::Component {
                    id: resource_type.clone(),
                    resource_type,
                    path: None,
                    resource_super_type: None,
                    dependencies: Vec::new(),
                }),
            }
        }

        for library in resolver.dependency_graph(root, brand)?.nodes() {
            let path = library.path().to_string();
            for category in library.categories() {
                export.edge(&path, category, EdgeType::MemberOf);
                note(category, &mut categories);
            }
            for dependency in library.dependencies() {
                export.edge(&path, dependency, EdgeType::DependsOn);
                note(dependency, &mut categories);
            }
            for embed in library.embedded_categories() {
                export.edge(&path, embed, EdgeType::Embeds);
                note(embed, &mut categories);
            }

            let resource_paths = AssetType::ALL
                .iter()
                .flat_map(|t| library.sources(*t))
                .map(|s| s.path.clone())
                .collect();
            export.nodes.push(GraphNode::Library {
                id: path.clone(),
                path,
                include_paths: library.include_files().to_vec(),
                resource_paths,
                categories: library.categories().iter().cloned().collect(),
                embeds: library.embedded_categories().to_vec(),
                dependencies: library.dependencies().to_vec(),
                run_modes: library.run_mode_groups().iter().map(ToString::to_string).collect(),
                brands: library.brands().iter().cloned().collect(),
            });
        }

        export.nodes.extend(categories.into_iter().map(|category| GraphNode::Category {
            id: category.clone(),
            name: category,
        }));

        Ok(export)
    }

    fn edge(&mut self, from: &str, to: &str, edge_type: EdgeType) {
        self.edges.push(GraphEdge {
            from: from.to_string(),
            to: to.to_string(),
            edge_type,
        });
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn note(category: &str, categories: &mut Vec<String>) {
    if !categories.iter().any(|c| c == category) {
        categories.push(category.to_string());
    }
}
