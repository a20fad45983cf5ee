//! Error handling for pagelib
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** ([`LibraryError`]) so callers can tell a fatal
//!    compilation failure from a degradable cache fault
//! 2. **User-friendly messages** ([`ErrorContext`]) with suggestions for CLI users
//!
//! # Fatal and non-fatal errors
//!
//! | Variant | Raised by | Effect |
//! |---|---|---|
//! | [`LibraryError::Compilation`] | preprocessor, resolver | aborts that one compile, nothing is cached |
//! | [`LibraryError::Lookup`] | cache read | caller falls back to live compilation |
//! | [`LibraryError::Caching`] | cache write/invalidate | logged, compiled text still returned |
//! | [`LibraryError::InvalidCategory`] | category lookup | treated as a no-op contribution |
//! | [`LibraryError::IndexRefresh`] | index rebuild | previous snapshot stays live |
//!
//! Library code returns [`Result`]; the CLI wraps everything in [`anyhow::Error`] and
//! converts it back with [`user_friendly_error`] right before printing.

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, LibraryError>;

/// A failure reported by a text preprocessor, or an internal invariant
/// violation detected while assembling a bundle.
///
/// Location fields are optional because not every preprocessor reports them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationError {
    /// Human readable message.
    pub message: String,
    /// Path of the source file being compiled, when known.
    pub origin: Option<String>,
    /// 1-based line of the failure.
    pub line: Option<usize>,
    /// 1-based column of the failure.
    pub column: Option<usize>,
    /// Excerpt of the offending source.
    pub extract: Option<String>,
}

impl CompilationError {
    /// Create an error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            origin: None,
            line: None,
            column: None,
            extract: None,
        }
    }

    /// Attach the source file the error came from.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Attach a line/column position.
    #[must_use]
    pub const fn at(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// Attach a source excerpt.
    #[must_use]
    pub fn with_extract(mut self, extract: impl Into<String>) -> Self {
        self.extract = Some(extract.into());
        self
    }
}

impl fmt::Display for CompilationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        match (&self.origin, self.line, self.column) {
            (Some(origin), Some(line), Some(column)) => write!(f, " ({origin}:{line}:{column})"),
            (Some(origin), Some(line), None) => write!(f, " ({origin}:{line})"),
            (Some(origin), None, _) => write!(f, " ({origin})"),
            (None, Some(line), Some(column)) => write!(f, " (line {line}, column {column})"),
            _ => Ok(()),
        }
    }
}

impl std::error::Error for CompilationError {}

/// The main error type for pagelib operations.
#[derive(Error, Debug)]
pub enum LibraryError {
    /// Preprocessor failure or broken compile invariant. Fatal to one compile call.
    #[error("Library compilation failed: {0}")]
    Compilation(#[from] CompilationError),

    /// Cache read fault. The caller should compile live instead.
    #[error("Cached library lookup failed for {key}: {reason}")]
    Lookup {
        /// Cache key in path form
        key: String,
        /// Storage failure description
        reason: String,
    },

    /// Cache write or invalidation fault. Never fatal to a compile.
    #[error("Library caching failed during {operation}: {reason}")]
    Caching {
        /// Operation that failed (put, invalidate, clear)
        operation: String,
        /// Storage failure description
        reason: String,
    },

    /// A requested category matches no known library.
    #[error("No library declares category '{category}'")]
    InvalidCategory {
        /// The unknown category
        category: String,
    },

    /// A content path does not exist.
    #[error("Content not found: {path}")]
    ContentNotFound {
        /// Requested path
        path: String,
    },

    /// The content tree could not be read.
    #[error("Failed to read content at {path}: {reason}")]
    ContentAccess {
        /// Path being read
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// The index rebuild failed; the previous snapshot remains live.
    #[error("Index refresh failed: {reason}")]
    IndexRefresh {
        /// Underlying failure
        reason: String,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration: {reason}")]
    Config {
        /// What is wrong
        reason: String,
    },

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LibraryError {
    /// Whether this error must abort the operation that raised it.
    ///
    /// Cache faults and unknown categories degrade to a miss or a no-op.
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Lookup { .. } | Self::Caching { .. } | Self::InvalidCategory { .. }
        )
    }

    pub(crate) fn content_access(path: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::ContentAccess {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn caching(operation: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Caching {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }
}

/// Error wrapper with user-facing details and a suggestion.
///
/// ```rust,no_run
/// use pagelib::core::{ErrorContext, LibraryError};
///
/// let context = ErrorContext::new(LibraryError::ContentNotFound { path: "/content/home".into() })
///     .with_suggestion("Check the --content directory");
/// context.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: LibraryError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Wrap an error without suggestion or details.
    #[must_use]
    pub const fn new(error: LibraryError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr: message in red, details in yellow, suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with a suggestion where one is known.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let chain = format!("{error:#}");
    match error.downcast::<LibraryError>() {
        Ok(library_error) => create_error_context(library_error),
        Err(other) => match other.downcast::<std::io::Error>() {
            Ok(io_error) => {
                let suggestion = match io_error.kind() {
                    std::io::ErrorKind::NotFound => {
                        "Check that the file or directory exists and the path is correct"
                    }
                    std::io::ErrorKind::PermissionDenied => {
                        "Check file ownership and permissions of the content and cache directories"
                    }
                    _ => "Re-run with --verbose for more detail",
                };
                ErrorContext::new(LibraryError::Io(io_error))
                    .with_suggestion(suggestion)
                    .with_details(chain)
            }
            Err(other) => ErrorContext::new(LibraryError::Config {
                reason: other.to_string(),
            })
            .with_details(chain),
        },
    }
}

fn create_error_context(error: LibraryError) -> ErrorContext {
    match &error {
        LibraryError::Compilation(inner) => {
            let details = inner
                .extract
                .as_ref()
                .map(|extract| format!("Near: {extract}"));
            let context = ErrorContext::new(error)
                .with_suggestion("Fix the reported source file; no partial bundle was produced");
            match details {
                Some(details) => context.with_details(details),
                None => context,
            }
        }
        LibraryError::ContentNotFound { .. } => ErrorContext::new(error)
            .with_suggestion("Check the root path and the --content directory")
            .with_details("Compilation roots are resolved against the content tree"),
        LibraryError::Toml(_) | LibraryError::Config { .. } => ErrorContext::new(error)
            .with_suggestion("Check pagelib.toml or the property files for syntax errors"),
        LibraryError::IndexRefresh { .. } => ErrorContext::new(error)
            .with_details("The previously built index is still being served"),
        LibraryError::Lookup { .. } | LibraryError::Caching { .. } => ErrorContext::new(error)
            .with_suggestion("Run with --no-cache or clear the cache directory"),
        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compilation_error_display_with_location() {
        let error = CompilationError::new("Unrecognised input")
            .with_origin("/apps/site/clientlibs/base/style.less")
            .at(12, 4);
        assert_eq!(
            error.to_string(),
            "Unrecognised input (/apps/site/clientlibs/base/style.less:12:4)"
        );
    }

    #[test]
    fn test_compilation_error_display_without_location() {
        assert_eq!(CompilationError::new("boom").to_string(), "boom");
    }

    #[test]
    fn test_fatality() {
        assert!(LibraryError::Compilation(CompilationError::new("x")).is_fatal());
        assert!(!LibraryError::caching("put", "disk full").is_fatal());
        assert!(
            !LibraryError::InvalidCategory {
                category: "missing".into()
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_user_friendly_error_keeps_library_error() {
        let error = anyhow::Error::from(LibraryError::ContentNotFound {
            path: "/content/home".into(),
        });
        let context = user_friendly_error(error);
        assert!(matches!(context.error, LibraryError::ContentNotFound { .. }));
        assert!(context.suggestion.is_some());
    }

    #[test]
    fn test_user_friendly_error_wraps_foreign_errors() {
        let context = user_friendly_error(anyhow::anyhow!("something odd"));
        assert!(context.to_string().contains("something odd"));
    }
}
