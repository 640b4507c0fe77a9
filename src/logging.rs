//! Diagnostic logging setup.
//!
//! Engine events go through `tracing` to stderr, so they never mix with the
//! guarded command's stdout. The level comes from `-v` flags unless
//! `SINGLERUN_LOG` holds a filter directive (e.g. `singlerun=debug`).

use tracing_subscriber::EnvFilter;

/// Environment variable overriding the verbosity flags.
pub const LOG_ENV: &str = "SINGLERUN_LOG";

/// Default filter for a verbosity count.
fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn build_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)))
}

/// Install the global subscriber. Safe to call more than once.
pub fn init(verbosity: u8) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
