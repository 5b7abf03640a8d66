//! Tracing bootstrap for binaries and tests embedding taskloom.
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is the host's choice. This helper wires up the usual fmt layer driven by
//! `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
