//! Logging bootstrap
//!
//! The engine only emits `tracing` events; installing a subscriber is left to
//! the embedding application. [`init_logging`] is the default one.

use tracing_subscriber::EnvFilter;

/// Installs a compact fmt subscriber.
///
/// `RUST_LOG` wins over `filter` when set. Returns `false` if a global
/// subscriber was already installed, which makes repeated calls harmless.
pub fn init_logging(filter: &str) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false) // resource and field are carried as event fields
        .compact()
        .try_init()
        .is_ok()
}
