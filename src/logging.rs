//! Logging initialization built on tracing-subscriber

use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

/// Logging configuration for the application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON formatting for structured logs
    pub json_format: bool,
    /// Enable span close events for operation timing
    pub span_tracing: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            span_tracing: false,
        }
    }
}

/// Initialize the logging system with the given configuration
///
/// The `RUST_LOG` environment variable overrides the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))?;

    let registry = Registry::default().with(filter);

    if config.json_format {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(config.span_tracing)
            .with_span_list(config.span_tracing);
        registry.with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_span_events(if config.span_tracing {
                FmtSpan::CLOSE
            } else {
                FmtSpan::NONE
            })
            .compact();
        registry.with(fmt_layer).init();
    }

    tracing::debug!("Logging initialized with level: {}", config.level);
    Ok(())
}
