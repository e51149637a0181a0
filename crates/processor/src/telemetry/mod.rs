//! Logging setup for the stream processor
//!
//! The processor logs through `tracing` everywhere. [`init_logging`] installs
//! a global `tracing-subscriber` with either compact or JSON output.
//!
//! ```rust,no_run
//! use retail_processor::config::LoggingConfig;
//! use retail_processor::telemetry::init_logging;
//!
//! # fn example() -> retail_processor::error::Result<()> {
//! init_logging(&LoggingConfig::default())?;
//! # Ok(())
//! # }
//! ```

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{ProcessorError, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Build the filter: `RUST_LOG` when set, the configured level otherwise
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| ProcessorError::Configuration {
            source: format!("invalid log level '{}': {}", config.level, e).into(),
        }),
    }
}

/// Install the global subscriber
///
/// Fails if the level is not a valid filter directive or a global subscriber
/// is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;
    let registry = Registry::default().with(filter);

    let installed = match config.format {
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init(),
    };

    installed.map_err(|e| ProcessorError::Configuration {
        source: format!("failed to install logger: {}", e).into(),
    })
}
