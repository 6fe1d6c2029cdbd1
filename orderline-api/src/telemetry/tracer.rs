//! Tracing Subscriber Initialization
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and either a
//! human-readable or a JSON formatter.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::constants::{DEFAULT_LOG_LEVEL, DEFAULT_SERVICE_NAME};
use crate::error::{ApiError, ApiResult};

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub log_level: String,
    /// Human-readable output instead of JSON lines
    pub pretty: bool,
    /// Service name attached to the startup log line
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            pretty: true,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create TelemetryConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `ORDERLINE_LOG_LEVEL`: Filter directive (default: info)
    /// - `ORDERLINE_LOG_PRETTY`: `false` or `0` selects JSON output (default: true)
    /// - `ORDERLINE_SERVICE_NAME`: Service name (default: orderline)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            log_level: std::env::var("ORDERLINE_LOG_LEVEL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.log_level),
            pretty: std::env::var("ORDERLINE_LOG_PRETTY")
                .map(|s| !matches!(s.trim().to_lowercase().as_str(), "false" | "0"))
                .unwrap_or(defaults.pretty),
            service_name: std::env::var("ORDERLINE_SERVICE_NAME")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.service_name),
        }
    }

    /// `RUST_LOG` wins over the configured level.
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.log_level))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
    }
}

/// Initialize the global tracing subscriber.
///
/// Call once at startup, before anything logs. Fails if a global subscriber
/// is already installed.
pub fn init_tracer(config: &TelemetryConfig) -> ApiResult<()> {
    let registry = tracing_subscriber::registry().with(config.env_filter());

    let installed = if config.pretty {
        registry.with(fmt::layer().with_target(true)).try_init()
    } else {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init()
    };
    installed.map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = %config.service_name,
        version = env!("CARGO_PKG_VERSION"),
        pretty = config.pretty,
        "Telemetry initialized"
    );

    Ok(())
}
