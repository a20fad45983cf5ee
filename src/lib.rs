//! pagelib - dependency-ordered front-end library bundles
//!
//! A content repository holds *library folders* (CSS, JS, LESS and Sass
//! sources tagged with categories) and *components* that declare which
//! categories they need. pagelib works out, for any content subtree, which
//! libraries that subtree requires, orders them so every dependency comes
//! first, and compiles them into one bundle per asset type. Bundles are cached
//! per `(root, asset type, brand)` and invalidated precisely as the content
//! changes.
//!
//! # Architecture Overview
//!
//! ```text
//!  change events ─▶ events::EventClassifier ─▶ BatchPlan ─┬─▶ cache invalidate / clear
//!                                                          └─▶ index refresh (coalesced)
//!
//!  compile(root) ─▶ snapshot ─▶ flatten ─▶ categories ─▶ graph ─▶ filter ─▶ order ─▶ concat
//!                       ▲                                                            │
//!                       └──────────── librarian::Librarian ◀──── cache ◀─────────────┘
//! ```
//!
//! # Core Modules
//!
//! ## Model
//! - [`content`] - content tree abstraction with in-memory and directory adapters
//! - [`library`] - library folders, run-mode groups and include files
//! - [`component`] - component dependency index and embed descriptors
//! - [`index`] - immutable snapshots of all libraries and components
//!
//! ## Engine
//! - [`resolver`] - dependency graph, inclusion resolution and compilation
//! - [`preprocessor`] - LESS/Sass compilation through external commands
//! - [`cache`] - compiled-bundle cache with memory and file-system stores
//! - [`events`] - change-event classification and batching
//! - [`librarian`] - the long-lived service tying it all together
//!
//! ## Supporting
//! - [`config`] - `pagelib.toml` configuration
//! - [`cli`] - command-line interface
//! - [`core`] - errors and asset types
//! - [`constants`] - property names and fixed values

// Model
pub mod component;
pub mod constants;
pub mod content;
pub mod index;
pub mod library;

// Engine
pub mod cache;
pub mod events;
pub mod librarian;
pub mod preprocessor;
pub mod resolver;

// Supporting modules
pub mod cli;
pub mod config;
pub mod core;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
