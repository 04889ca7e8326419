//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Environment variable overriding the log filter.
pub const LOG_ENV: &str = "VECSTORE_LOG";

/// Install a stderr fmt subscriber at `default_level` (`info`, `debug`,
/// `vecstore=trace,sqlx=warn`, ...) unless `VECSTORE_LOG` is set.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_logging(default_level: &str) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok()
}
