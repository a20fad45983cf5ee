//! Stylesheet preprocessors.
//!
//! LESS and Sass sources are turned into CSS by an external preprocessor
//! before concatenation. pagelib treats the preprocessor as an opaque
//! `compile(source) -> text` function behind the [`Preprocessor`] trait; two
//! implementations ship with the crate:
//!
//! - [`PassthroughPreprocessor`] returns every source unchanged
//! - [`CommandPreprocessor`] pipes sources through external commands such as
//!   `lessc -` or `sass --stdin`
//!
//! Any failure is a [`CompilationError`] and aborts the whole bundle.

mod command;

pub use command::CommandPreprocessor;

use serde::Serialize;
use std::fmt;

use crate::core::CompilationError;

/// Source language of a stylesheet or script file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSyntax {
    /// Plain CSS or JavaScript; never preprocessed
    Plain,
    /// LESS
    Less,
    /// Sass, both `.scss` and indented `.sass`
    Sass,
}

impl SourceSyntax {
    /// Derive the syntax from a file extension.
    ///
    /// ```
    /// use pagelib::preprocessor::SourceSyntax;
    ///
    /// assert_eq!(SourceSyntax::from_path("/apps/lib/site.less"), SourceSyntax::Less);
    /// assert_eq!(SourceSyntax::from_path("/apps/lib/theme.SCSS"), SourceSyntax::Sass);
    /// assert_eq!(SourceSyntax::from_path("/apps/lib/app.js"), SourceSyntax::Plain);
    /// ```
    pub fn from_path(path: &str) -> Self {
        let extension = path
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "less" => Self::Less,
            "scss" | "sass" => Self::Sass,
            _ => Self::Plain,
        }
    }

    /// Whether sources of this syntax go through a preprocessor.
    pub const fn needs_preprocessing(self) -> bool {
        !matches!(self, Self::Plain)
    }
}

impl fmt::Display for SourceSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Plain => "plain",
            Self::Less => "less",
            Self::Sass => "sass",
        })
    }
}

/// Compiles one preprocessed source file to plain text.
pub trait Preprocessor: Send + Sync {
    /// Compile `source`, read from `origin`, written in `syntax`.
    fn compile(
        &self,
        source: &str,
        origin: &str,
        syntax: SourceSyntax,
    ) -> Result<String, CompilationError>;
}

/// Returns every source unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughPreprocessor;

impl Preprocessor for PassthroughPreprocessor {
    fn compile(
        &self,
        source: &str,
        _origin: &str,
        _syntax: SourceSyntax,
    ) -> Result<String, CompilationError> {
        Ok(source.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough() {
        let output = PassthroughPreprocessor
            .compile("@x: 1;", "/a.less", SourceSyntax::Less)
            .unwrap();
        assert_eq!(output, "@x: 1;");
    }

    #[test]
    fn test_extensionless_path_is_plain() {
        assert_eq!(SourceSyntax::from_path("/apps/lib/README"), SourceSyntax::Plain);
        assert!(!SourceSyntax::Plain.needs_preprocessing());
        assert!(SourceSyntax::Sass.needs_preprocessing());
    }
}
