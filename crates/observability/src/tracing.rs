//! Tracing subscriber initialization.
//!
//! Events are emitted as one JSON object per line with timestamps. Span fields recorded
//! by `#[instrument]` (carrier, range and shop ids) are carried on every event inside
//! the span.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_DIRECTIVES: &str = "info";

/// Initialize tracing with `RUST_LOG` or [`DEFAULT_DIRECTIVES`].
pub fn init() {
    init_with_filter(DEFAULT_DIRECTIVES);
}

/// Initialize tracing with `RUST_LOG` or the given directives.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_with_filter(default_directives: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_current_span(true)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_a_no_op() {
        init_with_filter("debug");
        init();
        ::tracing::info!("still usable after repeated init");
    }
}
