//! Logging setup.
//!
//! `RUST_LOG` wins when it is set and valid; otherwise the `logging.level`
//! setting applies to every target. Output goes to stderr so the console and
//! the terminal client keep stdout for the operator.

use tracing_subscriber::EnvFilter;

/// Normalized filter directive for a configured level name.
pub fn level_directive(level: &str) -> &'static str {
    match level.trim().to_lowercase().as_str() {
        "error" => "error",
        "warn" | "warning" => "warn",
        "debug" => "debug",
        "trace" => "trace",
        "off" => "off",
        _ => "info",
    }
}

pub fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_directive(default_level)))
}

/// Install the global subscriber. Later calls are no-ops, which lets tests
/// and the client subcommand call it freely.
pub fn init(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(default_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
