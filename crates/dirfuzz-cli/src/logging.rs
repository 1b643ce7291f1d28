//! Structured logging to stderr, so stdout stays free for reports.

use dirfuzz_config::{LogFormat, LoggingConfig};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Environment variables consulted for a filter, in order, before the
/// configured level.
const FILTER_VARS: [&str; 2] = ["DIRFUZZ_LOG", "RUST_LOG"];

pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = build_env_filter(config)?;
    let base_subscriber = Registry::default().with(filter);

    match config.format {
        LogFormat::Json => base_subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
        LogFormat::Text => base_subscriber
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
    }
    Ok(())
}

fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, Box<dyn std::error::Error>> {
    for var in FILTER_VARS {
        if let Ok(directives) = std::env::var(var) {
            if !directives.trim().is_empty() {
                return Ok(EnvFilter::try_new(directives)?);
            }
        }
    }
    Ok(EnvFilter::try_new(&config.level)?)
}
