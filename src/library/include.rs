//! Include-file parsing.
//!
//! `css.txt` and `js.txt` list one source path per line:
//!
//! ```text
//! #base=css
//! reset.css
//! site.less
//! // comments and blank lines are skipped
//! /libs/vendor/normalize.css
//! ```
//!
//! Relative entries resolve against the library folder plus the most recent
//! `#base=` directive; absolute entries are kept as-is.

use crate::constants::INCLUDE_BASE_DIRECTIVE;
use crate::content::join;

/// Parse include-file text into normalized absolute source paths.
pub fn parse_include_file(library_path: &str, text: &str) -> Vec<String> {
    let mut base = library_path.to_string();
    let mut paths = Vec::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        if let Some(dir) = line.strip_prefix(INCLUDE_BASE_DIRECTIVE) {
            base = join(library_path, dir.trim());
            continue;
        }
        if line.starts_with("//") || line.starts_with('#') {
            continue;
        }
        let path = join(&base, line);
        if !paths.contains(&path) {
            paths.push(path);
        }
    }

    paths
}
