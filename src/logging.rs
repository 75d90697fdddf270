//! Structured logging setup.
//!
//! Logs go to stderr so CLI output on stdout stays machine-readable.
//! `RUST_LOG` overrides the configured level.

use anyhow::{bail, Result};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

pub fn init(config: &LoggingConfig) -> Result<()> {
    let level = parse_level(&config.level)?;
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let result = match config.format.as_str() {
        "json" => builder.json().with_current_span(true).try_init(),
        _ => builder.compact().try_init(),
    };

    // A subscriber may already be installed (tests, embedding binaries).
    if let Err(e) = result {
        tracing::debug!(error = %e, "tracing subscriber already set");
    }
    Ok(())
}

fn parse_level(level: &str) -> Result<LevelFilter> {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" | "warning" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        "off" => Ok(LevelFilter::OFF),
        other => bail!("Unknown logging.level: '{}'", other),
    }
}
