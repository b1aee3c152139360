//! Tracing subscriber setup for the CLI.
//!
//! The library only emits events; installing a subscriber is the binary's job.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Environment variable that overrides the level derived from `-v` flags.
pub const LOG_ENV: &str = "LABELFORGE_LOG";

/// Map the number of `-v` flags to a default level.
pub fn level_for_verbosity(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install a stderr fmt subscriber.
///
/// `LABELFORGE_LOG` takes any `EnvFilter` directive (e.g. `labelforge=debug`).
/// Returns an error if a global subscriber is already set.
pub fn init_logging(verbosity: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(level_for_verbosity(verbosity).as_str()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
}
