//! Run-mode groups.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use crate::constants::RUN_MODE_DELIMITER;

/// A set of run-mode tokens that must all be active.
///
/// A library lists composite run-mode strings such as `author.dev`; each
/// string becomes one group. Groups are AND within and OR across.
///
/// ```
/// use pagelib::library::RunModeGroup;
/// use std::collections::BTreeSet;
///
/// let group = RunModeGroup::from_composite("author.dev").unwrap();
/// let active: BTreeSet<String> = ["author", "dev", "local"].iter().map(|s| s.to_string()).collect();
/// assert!(group.matches(&active));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RunModeGroup {
    modes: BTreeSet<String>,
}

impl RunModeGroup {
    /// Create a group from tokens.
    pub fn new<I, S>(modes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            modes: modes.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a composite run-mode string. Empty tokens are ignored; a string
    /// without tokens yields `None`.
    pub fn from_composite(composite: &str) -> Option<Self> {
        let modes: BTreeSet<String> = composite
            .split(RUN_MODE_DELIMITER)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect();
        if modes.is_empty() { None } else { Some(Self { modes }) }
    }

    /// True iff every mode of this group is active.
    pub fn matches(&self, active: &BTreeSet<String>) -> bool {
        self.modes.is_subset(active)
    }

    /// Tokens of the group.
    pub fn modes(&self) -> &BTreeSet<String> {
        &self.modes
    }
}

impl fmt::Display for RunModeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.modes.iter().map(String::as_str).collect();
        f.write_str(&joined.join("."))
    }
}
