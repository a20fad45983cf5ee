//! Core types shared by every pagelib module.
//!
//! - [`LibraryError`] / [`Result`]: the crate's error type and its alias
//! - [`CompilationError`]: preprocessor failures with optional source position
//! - [`ErrorContext`] / [`user_friendly_error`]: CLI-facing error rendering
//! - [`AssetType`]: the bundle kinds (CSS, JS) a root can be compiled into

pub mod asset;
pub mod error;

pub use asset::AssetType;
pub use error::{CompilationError, ErrorContext, LibraryError, Result, user_friendly_error};
