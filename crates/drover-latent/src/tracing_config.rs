//! Logging setup.
//!
//! Supports:
//! - Console output (development)
//! - JSON structured logging (production)

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Tracing output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable console output (for development).
    Console,
    /// JSON structured logging (for production).
    Json,
}

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level filter (e.g., "info", "drover_latent=debug").
    pub log_level: String,
    /// Output format (console or JSON).
    pub format: TracingFormat,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: TracingFormat::Console,
        }
    }
}

impl TracingConfig {
    pub fn new(log_level: String, format: TracingFormat) -> Self {
        Self { log_level, format }
    }

    /// Raise the level for `-v` style flags: 1 is info, 2 debug, 3+ trace.
    ///
    /// Never lowers a configured level. Filter directives that are not a
    /// plain level are kept as they are.
    pub fn with_verbosity(mut self, verbose: u8) -> Self {
        let requested = match verbose {
            0 => return self,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };
        if let Ok(current) = self.log_level.parse::<Level>() {
            if requested > current {
                self.log_level = requested.as_str().to_ascii_lowercase();
            }
        }
        self
    }
}

/// Install the global tracing subscriber.
///
/// Fails instead of panicking if a subscriber is already installed.
pub fn init_tracing(config: TracingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_new(&config.log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = match config.format {
        TracingFormat::Console => fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .pretty()
            .boxed(),
        TracingFormat::Json => fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .json()
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::debug!(format = ?config.format, "tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.format, TracingFormat::Console);
    }

    #[test]
    fn test_verbosity_only_raises() {
        let warn = TracingConfig::new("warn".to_string(), TracingFormat::Json);
        assert_eq!(warn.clone().with_verbosity(0).log_level, "warn");
        assert_eq!(warn.clone().with_verbosity(1).log_level, "info");
        assert_eq!(warn.clone().with_verbosity(2).log_level, "debug");
        assert_eq!(warn.with_verbosity(5).log_level, "trace");

        let debug = TracingConfig::new("debug".to_string(), TracingFormat::Console);
        assert_eq!(debug.with_verbosity(1).log_level, "debug");

        let directive =
            TracingConfig::new("drover_latent=debug".to_string(), TracingFormat::Console);
        assert_eq!(directive.with_verbosity(2).log_level, "drover_latent=debug");
    }

    #[test]
    fn test_second_init_fails() {
        let config = TracingConfig::new("warn".to_string(), TracingFormat::Json);
        let _ = init_tracing(config.clone());
        assert!(init_tracing(config).is_err());
    }
}
