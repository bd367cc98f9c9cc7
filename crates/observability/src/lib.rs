//! Process-wide tracing setup shared by binaries, tests and benches.

/// Initialize structured JSON logging, filtered by `RUST_LOG` (default `info`).
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Like [`init`], but falls back to `default_directives` when `RUST_LOG` is unset.
pub fn init_with_filter(default_directives: &str) {
    tracing::init_with_filter(default_directives);
}

/// Subscriber configuration (filters, formatting).
pub mod tracing;
