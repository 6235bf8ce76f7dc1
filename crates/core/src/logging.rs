//! Logging initialization.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,inflight=debug";

/// Initialize the global `tracing` subscriber.
///
/// Filtering follows `RUST_LOG` when present and falls back to
/// [`DEFAULT_FILTER`]. Frame and pass spans emitted by the scheduler show up
/// as span context on each event.
///
/// # Example
/// ```
/// inflight_core::init_logging();
/// tracing::info!("frame loop starting");
/// ```
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}
