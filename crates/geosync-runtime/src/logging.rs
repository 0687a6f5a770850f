#![forbid(unsafe_code)]

//! Subscriber installation for hosts without their own `tracing` setup.
//!
//! Enabled with the `logging` feature. Filtering follows `RUST_LOG` when set,
//! otherwise `default_directive` (for example `"geosync_runtime=debug"`).

use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
