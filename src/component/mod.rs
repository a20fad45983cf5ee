//! Component dependency index.
//!
//! Maps component resource types to the library categories they declare.
//! A component that declares no `dependencies` of its own inherits the set of
//! the nearest ancestor along its `sling:resourceSuperType` chain that does.
//!
//! Components can also graft other components into the subtree they render
//! through embed descriptors of the form `relativePath:resourceType`. Those
//! are parsed here and expanded by the resolver when flattening a root.
//!
//! The index is always rebuilt from a full scan of the components root.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::constants::{
    COMPONENT_TYPE, EMBED_DESCRIPTOR_DELIMITER, PROP_DEPENDENCIES, PROP_EMBED,
};
use crate::content::{ContentNode, ContentTree, is_within, normalize};
use crate::core::Result;

/// A component grafted into a subtree without being materialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedComponent {
    /// Path relative to the embedding node
    pub relative_path: String,
    /// Resource type of the grafted component
    pub resource_type: String,
}

impl EmbeddedComponent {
    /// Parse a `relativePath:resourceType` descriptor.
    ///
    /// Returns `None` unless the descriptor has exactly two non-empty parts.
    ///
    /// ```
    /// use pagelib::component::EmbeddedComponent;
    ///
    /// let embedded = EmbeddedComponent::parse("header:site/components/header").unwrap();
    /// assert_eq!(embedded.relative_path, "header");
    /// assert!(EmbeddedComponent::parse("a:b:c").is_none());
    /// ```
    pub fn parse(descriptor: &str) -> Option<Self> {
        let parts: Vec<&str> = descriptor.split(EMBED_DESCRIPTOR_DELIMITER).map(str::trim).collect();
        match parts.as_slice() {
            [relative_path, resource_type] if !relative_path.is_empty() && !resource_type.is_empty() => {
                Some(Self {
                    relative_path: (*relative_path).to_string(),
                    resource_type: (*resource_type).to_string(),
                })
            }
            _ => None,
        }
    }
}

/// A component type and the categories it depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependentComponent {
    /// Resource type (path relative to the components root)
    pub resource_type: String,
    /// Path of the component definition
    pub path: String,
    /// Resource super type, if declared
    pub resource_super_type: Option<String>,
    /// Declared or inherited dependency categories, in declaration order
    pub dependencies: Vec<String>,
    /// Resource type the dependencies were inherited from
    pub inherited_from: Option<String>,
    /// Embedded component descriptors
    pub embedded_components: Vec<EmbeddedComponent>,
}

impl DependentComponent {
    /// Whether the component depends on `category`.
    pub fn depends_on(&self, category: &str) -> bool {
        self.dependencies.iter().any(|c| c == category)
    }
}

/// All registered components of one index build.
#[derive(Debug, Clone, Default)]
pub struct ComponentIndex {
    root: String,
    components: Vec<Arc<DependentComponent>>,
    by_type: HashMap<String, usize>,
    skipped_descriptors: usize,
}

impl ComponentIndex {
    /// Scan `components_root` and build the index.
    ///
    /// Malformed embed descriptors are skipped with a warning and counted.
    pub fn build(tree: &dyn ContentTree, components_root: &str) -> Result<Self> {
        let root = normalize(components_root);
        let nodes = tree.descendants(&root, &|node| node.is_type(COMPONENT_TYPE))?;

        let mut definitions: HashMap<String, &ContentNode> = HashMap::new();
        for node in &nodes {
            definitions.insert(relative_type(&root, &node.path), node);
        }

        let mut index = Self {
            root: root.clone(),
            ..Self::default()
        };

        for node in &nodes {
            let resource_type = relative_type(&root, &node.path);

            let mut embedded_components = Vec::new();
            for descriptor in node.strings(PROP_EMBED) {
                match EmbeddedComponent::parse(&descriptor) {
                    Some(embedded) if !embedded_components.contains(&embedded) => {
                        embedded_components.push(embedded);
                    }
                    Some(_) => {}
                    None => {
                        warn!(
                            "Embed descriptor '{}' in component {} is malformed, skipping",
                            descriptor, node.path
                        );
                        index.skipped_descriptors += 1;
                    }
                }
            }

            let (dependencies, inherited_from) = if node.has_property(PROP_DEPENDENCIES) {
                (Some(node.strings(PROP_DEPENDENCIES)), None)
            } else {
                match inherited_dependencies(&root, node, &definitions) {
                    Some((deps, from)) => (Some(deps), Some(from)),
                    None => (None, None),
                }
            };

            if dependencies.is_none() && embedded_components.is_empty() {
                continue;
            }

            let mut dependencies = dependencies.unwrap_or_default();
            let mut seen = HashSet::new();
            dependencies.retain(|c| seen.insert(c.clone()));

            let component = DependentComponent {
                resource_type: resource_type.clone(),
                path: node.path.clone(),
                resource_super_type: node.resource_super_type().map(str::to_string),
                dependencies,
                inherited_from,
                embedded_components,
            };
            debug!(
                "Registered component {} with {} dependencies",
                component.resource_type,
                component.dependencies.len()
            );
            index.by_type.insert(resource_type, index.components.len());
            index.components.push(Arc::new(component));
        }

        Ok(index)
    }

    /// Look up a component by resource type.
    ///
    /// Absolute types under the components root are accepted too.
    pub fn component(&self, resource_type: &str) -> Option<&Arc<DependentComponent>> {
        let key = if resource_type.starts_with('/') && is_within(resource_type, &self.root) {
            relative_type(&self.root, resource_type)
        } else {
            resource_type.trim_matches('/').to_string()
        };
        self.by_type.get(&key).map(|&idx| &self.components[idx])
    }

    /// The component defined at `path`.
    pub fn component_at(&self, path: &str) -> Option<&Arc<DependentComponent>> {
        let path = normalize(path);
        self.components.iter().find(|c| c.path == path)
    }

    /// Root the resource types are relative to.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Components depending on `category`, in discovery order.
    pub fn components_for_category(&self, category: &str) -> Vec<Arc<DependentComponent>> {
        self.components
            .iter()
            .filter(|c| c.depends_on(category))
            .cloned()
            .collect()
    }

    /// Components keyed by their definition path.
    pub fn components_by_path(&self) -> BTreeMap<String, Arc<DependentComponent>> {
        self.components
            .iter()
            .map(|c| (c.path.clone(), Arc::clone(c)))
            .collect()
    }

    /// All components in discovery order.
    pub fn components(&self) -> &[Arc<DependentComponent>] {
        &self.components
    }

    /// Number of registered components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether no component is registered.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Embed descriptors skipped as malformed during the build.
    pub const fn skipped_descriptors(&self) -> usize {
        self.skipped_descriptors
    }
}

fn relative_type(root: &str, path: &str) -> String {
    if root == "/" {
        return path.trim_start_matches('/').to_string();
    }
    path.strip_prefix(root)
        .unwrap_or(path)
        .trim_start_matches('/')
        .to_string()
}

/// Walk the super-type chain to the nearest ancestor declaring dependencies.
fn inherited_dependencies(
    root: &str,
    node: &ContentNode,
    definitions: &HashMap<String, &ContentNode>,
) -> Option<(Vec<String>, String)> {
    let mut visited = HashSet::new();
    visited.insert(relative_type(root, &node.path));

    let mut next = node.resource_super_type().map(str::to_string);
    while let Some(super_type) = next {
        let key = if super_type.starts_with('/') {
            relative_type(root, &super_type)
        } else {
            super_type.trim_matches('/').to_string()
        };
        if !visited.insert(key.clone()) {
            warn!(
                "Resource super type loop at '{}' while resolving component {}",
                key, node.path
            );
            return None;
        }
        let ancestor = definitions.get(&key)?;
        if ancestor.has_property(PROP_DEPENDENCIES) {
            return Some((ancestor.strings(PROP_DEPENDENCIES), key));
        }
        next = ancestor.resource_super_type().map(str::to_string);
    }
    None
}
