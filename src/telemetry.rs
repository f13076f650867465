//! Logging setup for the `vmctl` binary.
//!
//! Diagnostics go to stderr through `tracing`; stdout is reserved for command
//! results. `RUST_LOG` wins over the verbosity flag when it is set.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Maps the number of `-v` flags to the crate's log level.
#[must_use]
pub const fn level_for_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Builds the filter used when `RUST_LOG` is unset or invalid.
#[must_use]
pub fn default_filter(verbosity: u8) -> EnvFilter {
    let level = level_for_verbosity(verbosity);
    EnvFilter::new(format!("warn,vmctl={level}"))
}

/// Installs the global subscriber. Repeated calls are ignored.
pub fn init(verbosity: u8) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbosity));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}
