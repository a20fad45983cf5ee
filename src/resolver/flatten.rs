//! Flattening a content subtree into the component types it renders.

use std::collections::{HashSet, VecDeque};
use tracing::{debug, warn};

use crate::component::{ComponentIndex, EmbeddedComponent};
use crate::content::ContentTree;
use crate::core::{LibraryError, Result};

/// Distinct resource types under `root` (inclusive), in tree pre-order,
/// followed by the types grafted in through embed descriptors.
///
/// Embedded components are expanded recursively: a grafted component's own
/// embeds are grafted too. Each type is expanded once.
pub fn component_types(
    tree: &dyn ContentTree,
    components: &ComponentIndex,
    root: &str,
) -> Result<Vec<String>> {
    let root_node = tree.node(root)?.ok_or_else(|| LibraryError::ContentNotFound {
        path: root.to_string(),
    })?;

    let mut seen = HashSet::new();
    let mut types = Vec::new();
    let mut pending = VecDeque::new();

    let descendants = tree.descendants(root, &|node| node.resource_type().is_some())?;
    for node in std::iter::once(&root_node).chain(descendants.iter()) {
        if let Some(resource_type) = node.resource_type() {
            if seen.insert(resource_type.to_string()) {
                types.push(resource_type.to_string());
                pending.push_back(resource_type.to_string());
            }
        }
    }

    while let Some(resource_type) = pending.pop_front() {
        let Some(component) = components.component(&resource_type) else {
            continue;
        };
        for embedded in &component.embedded_components {
            if !stays_inside(embedded) {
                warn!(
                    "Embedded component path '{}' in {} leaves the subtree, ignoring",
                    embedded.relative_path, component.resource_type
                );
                continue;
            }
            if seen.insert(embedded.resource_type.clone()) {
                debug!(
                    "Grafting {} at {} from {}",
                    embedded.resource_type, embedded.relative_path, component.resource_type
                );
                types.push(embedded.resource_type.clone());
                pending.push_back(embedded.resource_type.clone());
            }
        }
    }

    Ok(types)
}

/// Whether an embed descriptor's relative path stays under the embedding node.
fn stays_inside(embedded: &EmbeddedComponent) -> bool {
    let path = &embedded.relative_path;
    !path.starts_with('/') && !path.split('/').any(|segment| segment == "..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::COMPONENT_TYPE;
    use crate::content::{ContentNode, MemoryContentTree};

    fn page_tree() -> MemoryContentTree {
        MemoryContentTree::new()
            .with(
                ContentNode::new("/apps/site/page", COMPONENT_TYPE)
                    .with_property("dependencies", ["site.page"])
                    .with_property("embed", ["header:site/header", "../escape:site/evil"]),
            )
            .with(
                ContentNode::new("/apps/site/header", COMPONENT_TYPE)
                    .with_property("dependencies", ["site.header"])
                    .with_property("embed", ["nav:site/nav", "back:site/page"]),
            )
            .with(ContentNode::new("/apps/site/nav", COMPONENT_TYPE).with_property("dependencies", ["site.nav"]))
            .with(
                ContentNode::new("/content/home/jcr:content", "cq:PageContent")
                    .with_property("sling:resourceType", "site/page"),
            )
            .with(
                ContentNode::new("/content/home/jcr:content/par/text", "nt:unstructured")
                    .with_property("sling:resourceType", "foundation/text"),
            )
    }

    #[test]
    fn test_flatten_expands_embeds_recursively() {
        let tree = page_tree();
        let index = ComponentIndex::build(&tree, "/apps").unwrap();
        let types = component_types(&tree, &index, "/content/home/jcr:content").unwrap();
        assert_eq!(types, vec!["site/page", "foundation/text", "site/header", "site/nav"]);
    }

    #[test]
    fn test_missing_root_is_not_found() {
        let tree = page_tree();
        let index = ComponentIndex::default();
        assert!(matches!(
            component_types(&tree, &index, "/content/missing"),
            Err(LibraryError::ContentNotFound { .. })
        ));
    }
}
