//! Ordered classification rules.

use tracing::{debug, trace};

use super::{BatchPlan, ChangeEvent, DomainAction, EventKind};
use crate::constants::{
    COMPONENT_TYPE, CONTAINER_NODE, CSS_INCLUDE_FILE, JS_INCLUDE_FILE,
    LIBRARY_DEFINITION_PROPERTIES, LIBRARY_FOLDER_TYPE, PROP_DEPENDENCIES, PROP_EMBED,
    PROP_RESOURCE_SUPER_TYPE,
};
use crate::content::{ContentTree, container_path, is_within, node_name, parent_path};
use crate::index::IndexSnapshot;

/// Everything a rule may look at.
///
/// The snapshot knows what existed before the change (removed nodes can only
/// be recognised there); the tree shows what exists now.
#[derive(Clone, Copy)]
pub struct EventContext<'a> {
    /// Index state before the batch is applied
    pub snapshot: &'a IndexSnapshot,
    /// Current content
    pub tree: &'a dyn ContentTree,
    /// Configured library roots
    pub library_roots: &'a [String],
}

impl EventContext<'_> {
    fn node_type(&self, path: &str) -> Option<String> {
        match self.tree.node(path) {
            Ok(node) => node.map(|n| n.node_type),
            Err(e) => {
                debug!(target: "events", "Could not read {}: {}", path, e);
                None
            }
        }
    }

    fn is_library_folder(&self, path: &str) -> bool {
        self.snapshot.library_at(path).is_some()
            || self.node_type(path).as_deref() == Some(LIBRARY_FOLDER_TYPE)
    }

    fn is_component(&self, path: &str) -> bool {
        self.snapshot.components().component_at(path).is_some()
            || self.node_type(path).as_deref() == Some(COMPONENT_TYPE)
    }

    fn covers_library(&self, path: &str) -> bool {
        self.snapshot
            .all_libraries()
            .iter()
            .any(|library| is_within(library.path(), path))
    }

    fn covers_component(&self, path: &str) -> bool {
        self.snapshot
            .components()
            .components()
            .iter()
            .any(|component| is_within(&component.path, path))
    }

    /// Whether `path` lies in a library folder or is listed by some
    /// library's include file, wherever it lives.
    fn is_library_source(&self, path: &str) -> bool {
        if self.snapshot.library_containing(path).is_some() {
            return true;
        }
        let file = file_node(path);
        self.snapshot
            .all_libraries()
            .iter()
            .any(|library| library.references(&file))
    }

    fn in_definition_area(&self, path: &str) -> bool {
        self.library_roots
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.snapshot.components().root()))
            .filter(|root| !root.is_empty())
            .any(|root| is_within(path, root))
    }
}

/// One classification rule: when `matches`, the event means `action`.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    /// Rule name, for logs
    pub name: &'static str,
    /// Predicate
    pub matches: fn(&EventContext<'_>, &ChangeEvent) -> bool,
    /// Action constructor
    pub action: fn(&EventContext<'_>, &ChangeEvent) -> DomainAction,
}

/// Maps events to actions; the first matching rule wins.
#[derive(Debug, Clone)]
pub struct EventClassifier {
    rules: Vec<Rule>,
}

impl Default for EventClassifier {
    fn default() -> Self {
        Self::new(standard_rules())
    }
}

impl EventClassifier {
    /// Classify with `rules`, tried in order. Events no rule matches are ignored.
    pub const fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Classify one event.
    pub fn classify(&self, ctx: &EventContext<'_>, event: &ChangeEvent) -> DomainAction {
        for rule in &self.rules {
            if (rule.matches)(ctx, event) {
                let action = (rule.action)(ctx, event);
                trace!(target: "events", "{} matched rule '{}': {:?}", event, rule.name, action);
                return action;
            }
        }
        DomainAction::Ignored
    }

    /// Classify a whole batch into one plan.
    pub fn plan<'e>(
        &self,
        ctx: &EventContext<'_>,
        events: impl IntoIterator<Item = &'e ChangeEvent>,
    ) -> BatchPlan {
        let mut plan = BatchPlan::default();
        for event in events {
            plan.record(self.classify(ctx, event));
        }
        plan
    }
}

/// Node a change applies to: the owning node for property events.
fn owner(event: &ChangeEvent) -> String {
    if event.kind.is_property() {
        parent_path(&event.path).unwrap_or_else(|| "/".to_string())
    } else {
        event.path.clone()
    }
}

/// Path removed by an event: the old path of a move, the path of a removal.
fn removed_path(event: &ChangeEvent) -> Option<&str> {
    match event.kind {
        EventKind::NodeRemoved => Some(&event.path),
        EventKind::NodeMoved => event.moved_from.as_deref(),
        _ => None,
    }
}

/// File node for a path inside a file (`<file>/jcr:content`).
fn file_node(path: &str) -> String {
    if node_name(path) == CONTAINER_NODE {
        parent_path(path).unwrap_or_else(|| "/".to_string())
    } else {
        path.to_string()
    }
}

fn canonical(path: &str) -> String {
    container_path(path).unwrap_or_else(|| path.to_string())
}

fn library_definition(_: &EventContext<'_>, _: &ChangeEvent) -> DomainAction {
    DomainAction::LibraryDefinitionChanged
}

fn component_definition(_: &EventContext<'_>, _: &ChangeEvent) -> DomainAction {
    DomainAction::ComponentDefinitionChanged
}

fn ignored(_: &EventContext<'_>, _: &ChangeEvent) -> DomainAction {
    DomainAction::Ignored
}

/// The built-in rule list.
pub fn standard_rules() -> Vec<Rule> {
    vec![
        Rule {
            name: "transaction-marker",
            matches: |_, e| e.kind == EventKind::TransactionEnd,
            action: ignored,
        },
        Rule {
            name: "library-definition-property",
            matches: |ctx, e| {
                e.kind.is_property()
                    && LIBRARY_DEFINITION_PROPERTIES.contains(&node_name(&e.path))
                    && ctx.is_library_folder(&owner(e))
            },
            action: library_definition,
        },
        Rule {
            name: "library-removed",
            matches: |ctx, e| removed_path(e).is_some_and(|path| ctx.covers_library(path)),
            action: library_definition,
        },
        Rule {
            name: "library-added",
            matches: |ctx, e| {
                matches!(e.kind, EventKind::NodeAdded | EventKind::NodeMoved)
                    && ctx.node_type(&e.path).as_deref() == Some(LIBRARY_FOLDER_TYPE)
            },
            action: library_definition,
        },
        Rule {
            name: "include-file",
            matches: |ctx, e| {
                let file = file_node(&owner(e));
                let name = node_name(&file);
                (name == CSS_INCLUDE_FILE || name == JS_INCLUDE_FILE)
                    && parent_path(&file).is_some_and(|folder| ctx.is_library_folder(&folder))
            },
            action: library_definition,
        },
        Rule {
            name: "library-source",
            matches: |ctx, e| ctx.is_library_source(&owner(e)),
            action: |_, _| DomainAction::LibrarySourceChanged,
        },
        Rule {
            name: "component-definition-property",
            matches: |ctx, e| {
                let name = node_name(&e.path);
                e.kind.is_property()
                    && [PROP_DEPENDENCIES, PROP_EMBED, PROP_RESOURCE_SUPER_TYPE].contains(&name)
                    && ctx.is_component(&owner(e))
            },
            action: component_definition,
        },
        Rule {
            name: "component-node",
            matches: |ctx, e| {
                removed_path(e).is_some_and(|path| ctx.covers_component(path))
                    || (matches!(e.kind, EventKind::NodeAdded | EventKind::NodeMoved)
                        && ctx.node_type(&e.path).as_deref() == Some(COMPONENT_TYPE))
            },
            action: component_definition,
        },
        Rule {
            name: "definition-area",
            matches: |ctx, e| ctx.in_definition_area(&owner(e)),
            action: ignored,
        },
        Rule {
            name: "content",
            matches: |_, _| true,
            action: |_, e| DomainAction::ContentChanged {
                path: canonical(&owner(e)),
                moved_from: e.moved_from.as_deref().map(canonical),
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LibrarianConfig;
    use crate::content::{ContentNode, MemoryContentTree};

    fn site() -> (MemoryContentTree, IndexSnapshot, LibrarianConfig) {
        let tree = MemoryContentTree::new()
            .with(ContentNode::new("/apps/site/clientlibs", LIBRARY_FOLDER_TYPE).with_property("categories", ["site"]))
            .with_file("/apps/site/clientlibs/css.txt", "site.css")
            .with_file("/apps/site/clientlibs/site.css", "a{}")
            .with(ContentNode::new("/apps/site/page", COMPONENT_TYPE).with_property("dependencies", ["site"]))
            .with(
                ContentNode::new("/content/home/jcr:content", "cq:PageContent")
                    .with_property("sling:resourceType", "site/page"),
            );
        let config = LibrarianConfig::default();
        let snapshot = IndexSnapshot::build(&tree, &config).unwrap();
        (tree, snapshot, config)
    }

    fn classify(event: ChangeEvent) -> DomainAction {
        let (tree, snapshot, config) = site();
        let ctx = EventContext {
            snapshot: &snapshot,
            tree: &tree,
            library_roots: &config.library_roots,
        };
        EventClassifier::default().classify(&ctx, &event)
    }

    #[test]
    fn test_library_property_changes_definition() {
        let event = ChangeEvent::new(EventKind::PropertyChanged, "/apps/site/clientlibs/dependencies");
        assert_eq!(classify(event), DomainAction::LibraryDefinitionChanged);
    }

    #[test]
    fn test_library_removal_uses_snapshot() {
        assert_eq!(
            classify(ChangeEvent::new(EventKind::NodeRemoved, "/apps/site")),
            DomainAction::LibraryDefinitionChanged
        );
    }

    #[test]
    fn test_include_file_data_changes_definition() {
        let event = ChangeEvent::new(EventKind::PropertyChanged, "/apps/site/clientlibs/css.txt/jcr:content/jcr:data");
        assert_eq!(classify(event), DomainAction::LibraryDefinitionChanged);
    }

    #[test]
    fn test_source_file_only_clears() {
        let event = ChangeEvent::new(EventKind::PropertyChanged, "/apps/site/clientlibs/site.css/jcr:content/jcr:data");
        assert_eq!(classify(event), DomainAction::LibrarySourceChanged);
    }

    #[test]
    fn test_source_outside_library_folder_clears() {
        let tree = MemoryContentTree::new()
            .with(ContentNode::new("/apps/site/clientlibs", LIBRARY_FOLDER_TYPE).with_property("categories", ["site"]))
            .with_file("/apps/site/clientlibs/css.txt", "site.css\n/libs/shared/normalize.css")
            .with_file("/apps/site/clientlibs/site.css", "a{}")
            .with_file("/libs/shared/normalize.css", "html{}");
        let config = LibrarianConfig::default();
        let snapshot = IndexSnapshot::build(&tree, &config).unwrap();
        let ctx = EventContext {
            snapshot: &snapshot,
            tree: &tree,
            library_roots: &config.library_roots,
        };
        let classifier = EventClassifier::default();

        let edit = ChangeEvent::new(EventKind::PropertyChanged, "/libs/shared/normalize.css/jcr:content/jcr:data");
        assert_eq!(classifier.classify(&ctx, &edit), DomainAction::LibrarySourceChanged);
        let removal = ChangeEvent::new(EventKind::NodeRemoved, "/libs/shared/normalize.css");
        assert_eq!(classifier.classify(&ctx, &removal), DomainAction::LibrarySourceChanged);

        let unrelated = ChangeEvent::new(EventKind::PropertyChanged, "/libs/shared/reset.css/jcr:content/jcr:data");
        assert_eq!(classifier.classify(&ctx, &unrelated), DomainAction::Ignored);
    }

    #[test]
    fn test_component_dependencies() {
        let event = ChangeEvent::new(EventKind::PropertyChanged, "/apps/site/page/dependencies");
        assert_eq!(classify(event), DomainAction::ComponentDefinitionChanged);
        let event = ChangeEvent::new(EventKind::PropertyChanged, "/apps/site/page/jcr:title");
        assert_eq!(classify(event), DomainAction::Ignored);
    }

    #[test]
    fn test_content_changes_are_scoped_to_container() {
        let event = ChangeEvent::new(EventKind::PropertyChanged, "/content/home/jcr:content/par/text/text");
        assert_eq!(
            classify(event),
            DomainAction::ContentChanged {
                path: "/content/home/jcr:content".into(),
                moved_from: None,
            }
        );

        let event = ChangeEvent::moved("/content/old/jcr:content/par", "/content/home/jcr:content/par");
        assert_eq!(
            classify(event),
            DomainAction::ContentChanged {
                path: "/content/home/jcr:content".into(),
                moved_from: Some("/content/old/jcr:content".into()),
            }
        );

        let event = ChangeEvent::new(EventKind::NodeRemoved, "/content/plain/child");
        assert_eq!(
            classify(event),
            DomainAction::ContentChanged {
                path: "/content/plain/child".into(),
                moved_from: None,
            }
        );
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let (tree, snapshot, config) = site();
        let ctx = EventContext {
            snapshot: &snapshot,
            tree: &tree,
            library_roots: &config.library_roots,
        };
        let classifier = EventClassifier::new(vec![
            Rule {
                name: "everything-ignored",
                matches: |_, _| true,
                action: ignored,
            },
            Rule {
                name: "never-reached",
                matches: |_, _| true,
                action: library_definition,
            },
        ]);
        let event = ChangeEvent::new(EventKind::PropertyChanged, "/apps/site/clientlibs/categories");
        assert_eq!(classifier.classify(&ctx, &event), DomainAction::Ignored);
        assert_eq!(classifier.rules().len(), 2);
    }
}
