//! Client libraries: folders of CSS/JS/LESS/Sass sources tagged with categories.
//!
//! A [`Library`] is built once from a library folder's properties and include
//! files and never patched afterwards; a changed folder produces a new
//! library during the next full index rebuild.
//!
//! # Properties
//!
//! | Property | Meaning |
//! |---|---|
//! | `categories` | names this library answers to |
//! | `dependencies` | categories that must be included and ordered first |
//! | `conditionalDependencies` | categories ordered first only when already included |
//! | `embed` | categories pulled in and ordered first, like dependencies |
//! | `runModes` | composite run-mode strings, one [`RunModeGroup`] each |
//! | `brands` | brands this library belongs to; empty means every brand |
//!
//! List properties are deduplicated keeping the first occurrence.

pub mod include;
pub mod run_mode;

pub use include::parse_include_file;
pub use run_mode::RunModeGroup;

use serde::Serialize;
use std::collections::BTreeSet;

use crate::constants::{
    CSS_INCLUDE_FILE, DEFAULT_BRAND, JS_INCLUDE_FILE, PROP_BRANDS, PROP_CATEGORIES,
    PROP_CONDITIONAL_DEPENDENCIES, PROP_DEPENDENCIES, PROP_EMBED, PROP_RUN_MODES,
};
use crate::content::{ContentNode, ContentTree, join};
use crate::core::{AssetType, Result};
use crate::preprocessor::SourceSyntax;

/// One source file listed in an include file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourceFile {
    /// Absolute content path
    pub path: String,
    /// Syntax derived from the extension
    pub syntax: SourceSyntax,
}

impl SourceFile {
    /// Create a source entry, deriving the syntax from the path.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let syntax = SourceSyntax::from_path(&path);
        Self { path, syntax }
    }
}

/// An immutable library definition.
///
/// Equality and hashing are by value, so two rebuilds of an unchanged folder
/// produce equal libraries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    path: String,
    categories: BTreeSet<String>,
    dependencies: Vec<String>,
    conditional_dependencies: Vec<String>,
    embedded_categories: Vec<String>,
    run_mode_groups: BTreeSet<RunModeGroup>,
    brands: BTreeSet<String>,
    css_sources: Vec<SourceFile>,
    js_sources: Vec<SourceFile>,
    include_files: Vec<String>,
}

fn dedupe<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = BTreeSet::new();
    items
        .into_iter()
        .map(Into::into)
        .map(|item: String| item.trim().to_string())
        .filter(|item| !item.is_empty() && seen.insert(item.clone()))
        .collect()
}

impl Library {
    /// Create an empty library at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            categories: BTreeSet::new(),
            dependencies: Vec::new(),
            conditional_dependencies: Vec::new(),
            embedded_categories: Vec::new(),
            run_mode_groups: BTreeSet::new(),
            brands: BTreeSet::new(),
            css_sources: Vec::new(),
            js_sources: Vec::new(),
            include_files: Vec::new(),
        }
    }

    /// Build a library from a library-folder node, reading its include files.
    pub fn from_node(tree: &dyn ContentTree, node: &ContentNode) -> Result<Self> {
        let mut library = Self::new(node.path.clone())
            .with_categories(node.strings(PROP_CATEGORIES))
            .with_dependencies(node.strings(PROP_DEPENDENCIES))
            .with_conditional_dependencies(node.strings(PROP_CONDITIONAL_DEPENDENCIES))
            .with_embedded_categories(node.strings(PROP_EMBED))
            .with_run_modes(node.strings(PROP_RUN_MODES))
            .with_brands(node.strings(PROP_BRANDS));

        for (asset_type, file) in [(AssetType::Css, CSS_INCLUDE_FILE), (AssetType::Js, JS_INCLUDE_FILE)] {
            let include_path = join(&node.path, file);
            if let Some(text) = tree.read_text(&include_path)? {
                let sources = parse_include_file(&node.path, &text);
                library.include_files.push(include_path);
                library = library.with_sources(asset_type, sources);
            }
        }

        Ok(library)
    }

    /// Builder: categories (set semantics).
    #[must_use]
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories.extend(dedupe(categories));
        self
    }

    /// Builder: ordered dependency categories.
    #[must_use]
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dedupe(dependencies);
        self
    }

    /// Builder: ordered conditional dependency categories.
    #[must_use]
    pub fn with_conditional_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conditional_dependencies = dedupe(dependencies);
        self
    }

    /// Builder: ordered embedded categories.
    #[must_use]
    pub fn with_embedded_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.embedded_categories = dedupe(categories);
        self
    }

    /// Builder: composite run-mode strings, one group each.
    #[must_use]
    pub fn with_run_modes<I, S>(mut self, composites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.run_mode_groups
            .extend(composites.into_iter().filter_map(|c| RunModeGroup::from_composite(c.as_ref())));
        self
    }

    /// Builder: brands.
    #[must_use]
    pub fn with_brands<I, S>(mut self, brands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.brands.extend(dedupe(brands));
        self
    }

    /// Builder: source files for one asset type.
    #[must_use]
    pub fn with_sources<I, S>(mut self, asset_type: AssetType, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sources = paths.into_iter().map(SourceFile::new);
        match asset_type {
            AssetType::Css => self.css_sources.extend(sources),
            AssetType::Js => self.js_sources.extend(sources),
        }
        self
    }

    /// Path of the library folder.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Categories this library answers to.
    pub fn categories(&self) -> &BTreeSet<String> {
        &self.categories
    }

    /// Dependency categories in declaration order.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Conditional dependency categories in declaration order.
    pub fn conditional_dependencies(&self) -> &[String] {
        &self.conditional_dependencies
    }

    /// Embedded categories in declaration order.
    pub fn embedded_categories(&self) -> &[String] {
        &self.embedded_categories
    }

    /// Run-mode groups; empty means unconditional.
    pub fn run_mode_groups(&self) -> &BTreeSet<RunModeGroup> {
        &self.run_mode_groups
    }

    /// Brands; empty means every brand.
    pub fn brands(&self) -> &BTreeSet<String> {
        &self.brands
    }

    /// Include files that were found for this library.
    pub fn include_files(&self) -> &[String] {
        &self.include_files
    }

    /// Source files compiled into the bundle of `asset_type`.
    pub fn sources(&self, asset_type: AssetType) -> &[SourceFile] {
        match asset_type {
            AssetType::Css => &self.css_sources,
            AssetType::Js => &self.js_sources,
        }
    }

    /// Whether the library declares any stylesheet source.
    pub fn has_css(&self) -> bool {
        !self.css_sources.is_empty()
    }

    /// Whether the library declares any script source.
    pub fn has_js(&self) -> bool {
        !self.js_sources.is_empty()
    }

    /// Whether any stylesheet source is LESS.
    pub fn has_less(&self) -> bool {
        self.css_sources.iter().any(|s| s.syntax == SourceSyntax::Less)
    }

    /// Whether any stylesheet source is Sass.
    pub fn has_sass(&self) -> bool {
        self.css_sources.iter().any(|s| s.syntax == SourceSyntax::Sass)
    }

    /// Whether the library answers to `category`.
    pub fn has_category(&self, category: &str) -> bool {
        self.categories.contains(category)
    }

    /// Run-mode eligibility: no groups, or any one group fully active.
    pub fn is_included_for_run_modes(&self, active: &BTreeSet<String>) -> bool {
        self.run_mode_groups.is_empty() || self.run_mode_groups.iter().any(|g| g.matches(active))
    }

    /// Brand eligibility. No requested brand means the `default` brand.
    pub fn is_included_for_brand(&self, brand: Option<&str>) -> bool {
        self.brands.is_empty() || self.brands.contains(brand.unwrap_or(DEFAULT_BRAND))
    }

    /// Whether a content path is one of this library's include files or sources.
    pub fn references(&self, path: &str) -> bool {
        self.include_files.iter().any(|p| p == path)
            || self.css_sources.iter().chain(&self.js_sources).any(|s| s.path == path)
    }
}

impl std::fmt::Display for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}
