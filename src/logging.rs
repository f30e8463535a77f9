//! Tracing subscriber setup
//!
//! Library code only emits `tracing` events; the embedding application calls
//! [`init`] once (or installs its own subscriber).

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `COLLAGE_LOG=collage_editor=debug`
pub const LOG_ENV: &str = "COLLAGE_LOG";

/// Install a formatted subscriber filtered by [`LOG_ENV`] (default `info`).
///
/// Returns `false` when a global subscriber was already installed.
pub fn init() -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
