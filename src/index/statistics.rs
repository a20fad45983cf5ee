//! Per-rebuild index statistics.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use crate::component::ComponentIndex;
use crate::library::Library;

/// Counters describing one index snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatistics {
    /// Number of library folders indexed
    pub library_count: usize,
    /// Number of distinct categories advertised
    pub category_count: usize,
    /// Number of registered components
    pub component_count: usize,
    /// Embed descriptors skipped as malformed
    pub skipped_embed_descriptors: usize,
    /// Wall time of the rebuild
    pub build_duration: Duration,
}

impl fmt::Display for IndexStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} libraries, {} categories, {} components ({} malformed embed descriptors) in {:.2?}",
            self.library_count,
            self.category_count,
            self.component_count,
            self.skipped_embed_descriptors,
            self.build_duration
        )
    }
}

/// Accumulates statistics while one snapshot is built.
///
/// Each rebuild creates its own builder, so concurrent or failed rebuilds
/// never leak counts into each other.
#[derive(Debug)]
pub struct StatisticsBuilder {
    started: Instant,
    library_count: usize,
    categories: HashSet<String>,
    component_count: usize,
    skipped_embed_descriptors: usize,
}

impl Default for StatisticsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StatisticsBuilder {
    /// Start timing a rebuild.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            library_count: 0,
            categories: HashSet::new(),
            component_count: 0,
            skipped_embed_descriptors: 0,
        }
    }

    /// Count one library and its categories.
    pub fn record_library(&mut self, library: &Library) {
        self.library_count += 1;
        self.categories.extend(library.categories().iter().cloned());
    }

    /// Count the components of a finished component index.
    pub fn record_components(&mut self, components: &ComponentIndex) {
        self.component_count = components.len();
        self.skipped_embed_descriptors = components.skipped_descriptors();
    }

    /// Finish and stop the clock.
    pub fn build(self) -> IndexStatistics {
        IndexStatistics {
            library_count: self.library_count,
            category_count: self.categories.len(),
            component_count: self.component_count,
            skipped_embed_descriptors: self.skipped_embed_descriptors,
            build_duration: self.started.elapsed(),
        }
    }
}
