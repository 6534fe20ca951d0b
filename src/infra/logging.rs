//! Tracing subscriber setup for the `kup` binary.
//!
//! Logs go to stderr as `LEVEL message key=value`, without timestamps, so
//! stdout stays clean for tables and JSON.

use tracing_subscriber::EnvFilter;

use crate::cli::LogLevel;

/// Install the global subscriber. `RUST_LOG` wins over `level` when set.
/// Calling this twice is harmless; the second call is ignored.
pub fn init(
    level: LogLevel,
    no_color: bool,
)
{
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(false)
        .without_time()
        .try_init();
}
