//! Asset types a bundle can be compiled for.

use serde::{Deserialize, Serialize};

use crate::core::LibraryError;

/// The kind of bundle being compiled.
///
/// LESS and Sass sources are listed in a library's CSS include file and
/// compile into the [`AssetType::Css`] bundle.
///
/// ```
/// use pagelib::core::AssetType;
///
/// let css: AssetType = "css".parse().unwrap();
/// assert_eq!(css, AssetType::Css);
/// assert_eq!(css.content_type(), "text/css");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    /// Stylesheets: plain CSS plus preprocessed LESS and Sass.
    Css,
    /// Scripts.
    Js,
}

impl AssetType {
    /// All asset types, in a stable order.
    pub const ALL: [Self; 2] = [Self::Css, Self::Js];

    /// File extension of the compiled bundle, without the dot.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::Js => "js",
        }
    }

    /// MIME type of the compiled bundle.
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Css => "text/css",
            Self::Js => "application/x-javascript",
        }
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for AssetType {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_lowercase().as_str() {
            "css" => Ok(Self::Css),
            "js" => Ok(Self::Js),
            other => Err(LibraryError::Config {
                reason: format!("unknown asset type '{other}', expected 'css' or 'js'"),
            }),
        }
    }
}
