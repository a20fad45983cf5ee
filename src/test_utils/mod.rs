//! Test utilities for pagelib
//!
//! Logging setup plus ready-made content repositories, shared by unit tests
//! and (through the `test-utils` feature) integration tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use pagelib::test_utils::{fixtures, init_test_logging};
//!
//! init_test_logging(None);
//! let tree = fixtures::sample_site();
//! ```

pub mod fixtures;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. With `None`, logging is enabled only
/// when `RUST_LOG` is set:
///
/// ```bash
/// RUST_LOG=librarian=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true) // targets such as "cache" and "librarian"
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}
