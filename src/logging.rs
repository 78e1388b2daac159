//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Filter directives are read from this variable.
pub const LOG_ENV: &str = "PMU_LOG";

/// Install a stderr fmt subscriber filtered by `PMU_LOG` (default `warn`).
///
/// Does nothing if a global subscriber is already set.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
