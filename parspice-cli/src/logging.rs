//! Tracing setup for the controller and worker processes
//!
//! Everything logs to stderr: stdout of the controller carries command
//! output, and workers share their parent's stderr.

use anyhow::{anyhow, Result};
use parspice_config::{LogFormat, LoggingConfig};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn env_filter(config: &LoggingConfig, log_level: Option<&String>) -> EnvFilter {
    match log_level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| {
            eprintln!("Invalid log level '{}', falling back to '{}'", level, config.level);
            EnvFilter::new(config.level.to_string())
        }),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.to_string())),
    }
}

/// Initialize tracing from configuration. An explicit `log_level` wins over
/// `RUST_LOG`, which wins over the configured level.
pub fn init_tracing(config: &LoggingConfig, log_level: Option<&String>) -> Result<()> {
    let filter = env_filter(config, log_level);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    result.map_err(|e| anyhow!("Failed to initialize tracing: {}", e))?;

    debug!("Tracing initialized ({:?} format)", config.format);
    Ok(())
}

/// Initialize tracing for a worker process. Never fails: a worker without
/// logging still does its job.
pub fn init_worker_tracing(config: &LoggingConfig, log_level: Option<&String>) {
    if let Err(e) = init_tracing(config, log_level) {
        eprintln!("{}", e);
    }
}
