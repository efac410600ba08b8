//! Tracing subscriber setup
//!
//! Logs go to stderr; stdout is reserved for query results.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogConfig, LogFormat};

const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Install the global subscriber
///
/// `RUST_LOG` wins over the configured level; each `-v` raises the configured
/// level by one step.
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init(config: &LogConfig, verbose: u8, format: LogFormat) -> eyre::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(raise(&config.level, verbose)));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?,
    }

    Ok(())
}

/// `level` raised by `steps`, capped at trace
fn raise(level: &str, steps: u8) -> &'static str {
    let base = LEVELS
        .iter()
        .position(|l| l.eq_ignore_ascii_case(level.trim()))
        .unwrap_or(2);
    LEVELS[(base + usize::from(steps)).min(LEVELS.len() - 1)]
}
