//! Logging setup
//!
//! One `Registry` with an `EnvFilter` (from `RUST_LOG` when set) and a `fmt`
//! layer. Safe to call more than once; later calls are ignored.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

pub const DEFAULT_FILTER: &str = "signal_agency=info";

/// Install the global subscriber. Returns `false` when one was already set.
pub fn init_logging(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    Registry::default()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .is_ok()
}
