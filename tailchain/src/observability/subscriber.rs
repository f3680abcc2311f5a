//! Tracing subscriber initialization for processes embedding the chain.

use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Output format for log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// One JSON object per record.
    Json,
}

/// Builds the filter from `RUST_LOG`, falling back to `default_directive`.
fn build_env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Installs a global subscriber writing to stderr.
///
/// Returns false if a global subscriber was already installed, in which
/// case the existing one is left in place.
pub fn init_tracing(format: LogFormat, default_directive: &str) -> bool {
    let filter = build_env_filter(default_directive);
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    result.is_ok()
}
