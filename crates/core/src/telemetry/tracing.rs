//! Tracing subscriber configuration and initialization

use crate::error::ShelfError;
use tracing::{span, Level, Span};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "movie_shelf_sync=debug,movie_shelf_core=info";

/// Configuration for the process-wide tracing subscriber
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Service name attached to the startup event
    pub service_name: String,

    /// `EnvFilter` directives used when `RUST_LOG` is not set
    pub filter: String,

    /// Enable console (fmt) output
    pub enable_console: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "movie-shelf".to_string(),
            filter: DEFAULT_FILTER.to_string(),
            enable_console: true,
        }
    }
}

impl TracingConfig {
    /// Create config from environment variables
    ///
    /// - SERVICE_NAME: Service identifier
    /// - MOVIE_SHELF_LOG_FILTER: Fallback filter directives
    /// - MOVIE_SHELF_LOG_CONSOLE: "false" or "0" disables console output
    pub fn from_env() -> Self {
        let service_name =
            std::env::var("SERVICE_NAME").unwrap_or_else(|_| "movie-shelf".to_string());

        let filter =
            std::env::var("MOVIE_SHELF_LOG_FILTER").unwrap_or_else(|_| DEFAULT_FILTER.to_string());

        let enable_console = std::env::var("MOVIE_SHELF_LOG_CONSOLE")
            .map(|v| !(v == "false" || v == "0"))
            .unwrap_or(true);

        Self {
            service_name,
            filter,
            enable_console,
        }
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over the configured filter. Calling this twice returns
/// an error instead of panicking.
pub fn init_tracing(config: TracingConfig) -> Result<(), ShelfError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| ShelfError::TelemetryError(format!("Invalid log filter: {}", e)))?;

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if config.enable_console {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_line_number(true);

        subscriber
            .with(fmt_layer)
            .try_init()
            .map_err(|e| ShelfError::TelemetryError(e.to_string()))?;
    } else {
        subscriber
            .try_init()
            .map_err(|e| ShelfError::TelemetryError(e.to_string()))?;
    }

    tracing::info!(service_name = %config.service_name, "Tracing initialized");

    Ok(())
}

/// Create a remote store operation span
///
/// ```rust
/// use movie_shelf_core::telemetry::store_op_span;
///
/// let _span = store_op_span("GET", "users/42/favorites");
/// ```
pub fn store_op_span(operation: &str, path: &str) -> Span {
    span!(
        Level::DEBUG,
        "store.request",
        store.operation = %operation,
        store.path = %path,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_config_default() {
        let config = TracingConfig::default();
        assert_eq!(config.service_name, "movie-shelf");
        assert_eq!(config.filter, DEFAULT_FILTER);
        assert!(config.enable_console);
    }

    #[test]
    fn test_tracing_config_from_env() {
        std::env::set_var("MOVIE_SHELF_LOG_CONSOLE", "0");
        std::env::set_var("MOVIE_SHELF_LOG_FILTER", "warn");

        let config = TracingConfig::from_env();
        assert!(!config.enable_console);
        assert_eq!(config.filter, "warn");

        std::env::remove_var("MOVIE_SHELF_LOG_CONSOLE");
        std::env::remove_var("MOVIE_SHELF_LOG_FILTER");
    }

    #[test]
    fn test_store_op_span() {
        let span = store_op_span("PUT", "users/1/favorites");
        let _guard = span.enter();
    }

    #[test]
    fn test_init_tracing_twice_is_an_error() {
        let config = TracingConfig {
            enable_console: false,
            ..TracingConfig::default()
        };

        // The first call may lose a race with another test; the second never succeeds.
        let _ = init_tracing(config.clone());
        assert!(matches!(
            init_tracing(config),
            Err(ShelfError::TelemetryError(_))
        ));
    }
}
