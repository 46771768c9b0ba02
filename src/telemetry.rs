//! Tracing setup for binaries and tests.
//!
//! The engine itself only emits `tracing` events; installing a subscriber is
//! the embedding application's call. This helper wires the conventional
//! fmt-plus-env-filter stack for programs that do not need anything fancier.

use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; only the first call installs anything.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
