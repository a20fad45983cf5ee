//! Change events and the cache/index actions they imply.
//!
//! Raw structural notifications arrive as an ordered stream of
//! [`ChangeEvent`]s. Each event is mapped to a [`DomainAction`] by the
//! [`EventClassifier`]; actions accumulate into a [`BatchPlan`] until a
//! [`EventKind::TransactionEnd`] marker closes the batch, and the plan is then
//! applied exactly once:
//!
//! ```text
//! events ─▶ EventBatcher ─(TransactionEnd)─▶ classify ─▶ BatchPlan
//!                                                         │
//!                   clear cache ◀── or ── invalidate roots ┤
//!                                                         └─▶ one refresh request
//! ```

mod classifier;

pub use classifier::{EventClassifier, EventContext, Rule, standard_rules};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::content::normalize;

/// Kind of a structural change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    /// A node was created
    NodeAdded,
    /// A node was moved; `moved_from` holds the old path
    NodeMoved,
    /// A node was deleted
    NodeRemoved,
    /// A property was created
    PropertyAdded,
    /// A property value changed
    PropertyChanged,
    /// A property was deleted
    PropertyRemoved,
    /// Closes the current batch
    TransactionEnd,
}

impl EventKind {
    /// Whether the event path names a property rather than a node.
    pub const fn is_property(self) -> bool {
        matches!(
            self,
            Self::PropertyAdded | Self::PropertyChanged | Self::PropertyRemoved
        )
    }

    /// Whether the event path names a node.
    pub const fn is_node(self) -> bool {
        matches!(self, Self::NodeAdded | Self::NodeMoved | Self::NodeRemoved)
    }
}

/// One structural change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// What happened
    pub kind: EventKind,
    /// Node path, or node path plus property name for property events
    pub path: String,
    /// Old path of a moved node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moved_from: Option<String>,
}

impl ChangeEvent {
    /// Create an event.
    pub fn new(kind: EventKind, path: &str) -> Self {
        Self {
            kind,
            path: normalize(path),
            moved_from: None,
        }
    }

    /// A node move from `from` to `to`.
    pub fn moved(from: &str, to: &str) -> Self {
        Self {
            kind: EventKind::NodeMoved,
            path: normalize(to),
            moved_from: Some(normalize(from)),
        }
    }

    /// The batch-closing marker.
    pub fn transaction_end() -> Self {
        Self::new(EventKind::TransactionEnd, "/")
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.moved_from {
            Some(from) => write!(f, "{:?} {} -> {}", self.kind, from, self.path),
            None => write!(f, "{:?} {}", self.kind, self.path),
        }
    }
}

/// What a classified event means for the cache and the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainAction {
    /// A library folder or one of its include files changed: clear and refresh
    LibraryDefinitionChanged,
    /// A component's dependencies, embeds or super type changed: clear and refresh
    ComponentDefinitionChanged,
    /// A source file inside a library changed: clear only
    LibrarySourceChanged,
    /// Content changed: invalidate the roots covering these paths
    ContentChanged {
        /// Canonical path of the changed content
        path: String,
        /// Canonical old path of a moved node
        moved_from: Option<String>,
    },
    /// Nothing to do
    Ignored,
}

/// Actions accumulated over one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPlan {
    /// Drop every cached bundle
    pub clear_cache: bool,
    /// Rebuild the index
    pub refresh_index: bool,
    /// Paths whose covering cached roots are invalidated
    pub invalidate: BTreeSet<String>,
}

impl BatchPlan {
    /// Fold one action into the plan.
    pub fn record(&mut self, action: DomainAction) {
        match action {
            DomainAction::LibraryDefinitionChanged | DomainAction::ComponentDefinitionChanged => {
                self.clear_cache = true;
                self.refresh_index = true;
            }
            DomainAction::LibrarySourceChanged => self.clear_cache = true,
            DomainAction::ContentChanged { path, moved_from } => {
                self.invalidate.insert(path);
                self.invalidate.extend(moved_from);
            }
            DomainAction::Ignored => {}
        }
    }

    /// Whether applying the plan would do nothing.
    pub fn is_empty(&self) -> bool {
        !self.clear_cache && !self.refresh_index && self.invalidate.is_empty()
    }
}

/// Splits an event stream into transaction batches.
///
/// Events after the last [`EventKind::TransactionEnd`] stay pending until a
/// later marker arrives.
#[derive(Debug, Default)]
pub struct EventBatcher {
    pending: Vec<ChangeEvent>,
}

impl EventBatcher {
    /// Create an empty batcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add events; returns every batch they complete, markers excluded.
    pub fn push(&mut self, events: impl IntoIterator<Item = ChangeEvent>) -> Vec<Vec<ChangeEvent>> {
        let mut complete = Vec::new();
        for event in events {
            if event.kind == EventKind::TransactionEnd {
                complete.push(std::mem::take(&mut self.pending));
            } else {
                self.pending.push(event);
            }
        }
        complete
    }

    /// Events waiting for a marker.
    pub fn pending(&self) -> &[ChangeEvent] {
        &self.pending
    }
}
