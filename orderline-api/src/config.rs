//! Service Configuration Module
//!
//! Configuration for the HTTP server, the message stream and the ingestion
//! loop. Everything is loaded from `ORDERLINE_*` environment variables with
//! defaults suitable for local development. Malformed values fall back to the
//! default; only a malformed bind address is reported as an error.

use std::net::SocketAddr;
use std::time::Duration;

use crate::backoff::Backoff;
use crate::constants::*;
use crate::error::{ApiError, ApiResult};

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ============================================================================
// SERVER CONFIGURATION
// ============================================================================

/// HTTP listener and process lifecycle settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the read API binds to.
    pub http_addr: SocketAddr,
    /// How long tasks get to finish after the shutdown signal.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
        }
    }
}

impl ServerConfig {
    /// Create ServerConfig from environment variables.
    ///
    /// Environment variables:
    /// - `ORDERLINE_HTTP_ADDR`: Listen address (default: 0.0.0.0:8081). A bare
    ///   `:port` binds all interfaces.
    /// - `ORDERLINE_SHUTDOWN_GRACE_SECS`: Drain grace period (default: 10)
    pub fn from_env() -> ApiResult<Self> {
        let raw = env_string("ORDERLINE_HTTP_ADDR").unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string());
        Ok(Self {
            http_addr: parse_bind_addr(&raw)?,
            shutdown_grace: Duration::from_secs(
                env_parse("ORDERLINE_SHUTDOWN_GRACE_SECS").unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS),
            ),
        })
    }
}

/// Parse `host:port` or `:port`.
pub fn parse_bind_addr(raw: &str) -> ApiResult<SocketAddr> {
    let candidate = if raw.starts_with(':') {
        format!("0.0.0.0{}", raw)
    } else {
        raw.to_string()
    };
    candidate
        .parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", raw, e)))
}

// ============================================================================
// STREAM CONFIGURATION
// ============================================================================

/// Where order messages are consumed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub brokers: Vec<String>,
    pub topic: String,
    pub group_id: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            brokers: vec![DEFAULT_KAFKA_BROKERS.to_string()],
            topic: DEFAULT_KAFKA_TOPIC.to_string(),
            group_id: DEFAULT_KAFKA_GROUP_ID.to_string(),
        }
    }
}

impl StreamConfig {
    /// Create StreamConfig from environment variables.
    ///
    /// Environment variables:
    /// - `ORDERLINE_KAFKA_BROKERS`: Comma-separated bootstrap servers (default: localhost:9092)
    /// - `ORDERLINE_KAFKA_TOPIC`: Topic name (default: orders)
    /// - `ORDERLINE_KAFKA_GROUP_ID`: Consumer group (default: orders-consumer)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let brokers: Vec<String> = env_string("ORDERLINE_KAFKA_BROKERS")
            .map(|s| {
                s.split(',')
                    .map(|b| b.trim().to_string())
                    .filter(|b| !b.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            brokers: if brokers.is_empty() {
                defaults.brokers
            } else {
                brokers
            },
            topic: env_string("ORDERLINE_KAFKA_TOPIC").unwrap_or(defaults.topic),
            group_id: env_string("ORDERLINE_KAFKA_GROUP_ID").unwrap_or(defaults.group_id),
        }
    }

    /// Brokers in the `bootstrap.servers` format.
    pub fn bootstrap_servers(&self) -> String {
        self.brokers.join(",")
    }
}

// ============================================================================
// INGESTION CONFIGURATION
// ============================================================================

/// Capped exponential backoff parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Build a fresh backoff from these parameters.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.initial_backoff, self.max_backoff, self.backoff_multiplier)
    }
}

/// Pauses taken by the ingestion loop.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    /// After a malformed message or a transient fetch error.
    pub decode_retry: RetryConfig,
    /// After a failed store write.
    pub store_retry: RetryConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let max_backoff = Duration::from_millis(DEFAULT_MAX_BACKOFF_MS);
        Self {
            decode_retry: RetryConfig {
                initial_backoff: Duration::from_millis(DEFAULT_DECODE_BACKOFF_MS),
                max_backoff,
                backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            },
            store_retry: RetryConfig {
                initial_backoff: Duration::from_millis(DEFAULT_STORE_BACKOFF_MS),
                max_backoff,
                backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            },
        }
    }
}

impl IngestConfig {
    /// Create IngestConfig from environment variables.
    ///
    /// Environment variables:
    /// - `ORDERLINE_INGEST_DECODE_BACKOFF_MS`: First pause after a malformed message (default: 300)
    /// - `ORDERLINE_INGEST_STORE_BACKOFF_MS`: First pause after a failed write (default: 500)
    /// - `ORDERLINE_INGEST_MAX_BACKOFF_MS`: Pause cap (default: 30000)
    /// - `ORDERLINE_INGEST_BACKOFF_MULTIPLIER`: Growth factor, at least 1.0 (default: 2.0)
    pub fn from_env() -> Self {
        let max_backoff = Duration::from_millis(
            env_parse("ORDERLINE_INGEST_MAX_BACKOFF_MS").unwrap_or(DEFAULT_MAX_BACKOFF_MS),
        );
        let backoff_multiplier = env_parse::<f64>("ORDERLINE_INGEST_BACKOFF_MULTIPLIER")
            .filter(|m| m.is_finite() && *m >= 1.0)
            .unwrap_or(DEFAULT_BACKOFF_MULTIPLIER);

        Self {
            decode_retry: RetryConfig {
                initial_backoff: Duration::from_millis(
                    env_parse("ORDERLINE_INGEST_DECODE_BACKOFF_MS")
                        .unwrap_or(DEFAULT_DECODE_BACKOFF_MS),
                ),
                max_backoff,
                backoff_multiplier,
            },
            store_retry: RetryConfig {
                initial_backoff: Duration::from_millis(
                    env_parse("ORDERLINE_INGEST_STORE_BACKOFF_MS")
                        .unwrap_or(DEFAULT_STORE_BACKOFF_MS),
                ),
                max_backoff,
                backoff_multiplier,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    struct EnvVarGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
            Self { key, original }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.original.as_deref() {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn test_ingest_config_defaults() {
        let config = IngestConfig::default();
        assert_eq!(config.decode_retry.initial_backoff, Duration::from_millis(300));
        assert_eq!(config.store_retry.initial_backoff, Duration::from_millis(500));
        assert_eq!(config.store_retry.max_backoff, Duration::from_secs(30));
        assert_eq!(config.store_retry.backoff_multiplier, 2.0);
    }

    #[test]
    fn test_ingest_config_from_env() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _store = EnvVarGuard::set("ORDERLINE_INGEST_STORE_BACKOFF_MS", Some("50"));
        let _max = EnvVarGuard::set("ORDERLINE_INGEST_MAX_BACKOFF_MS", Some("400"));
        let _mult = EnvVarGuard::set("ORDERLINE_INGEST_BACKOFF_MULTIPLIER", Some("0.5"));
        let _decode = EnvVarGuard::set("ORDERLINE_INGEST_DECODE_BACKOFF_MS", Some("soon"));

        let config = IngestConfig::from_env();
        assert_eq!(config.store_retry.initial_backoff, Duration::from_millis(50));
        assert_eq!(config.store_retry.max_backoff, Duration::from_millis(400));
        assert_eq!(config.store_retry.backoff_multiplier, 2.0);
        assert_eq!(config.decode_retry.initial_backoff, Duration::from_millis(300));
    }

    #[test]
    fn test_stream_config_splits_brokers() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _brokers = EnvVarGuard::set("ORDERLINE_KAFKA_BROKERS", Some("k1:9092, k2:9092,,"));
        let _topic = EnvVarGuard::set("ORDERLINE_KAFKA_TOPIC", None);

        let config = StreamConfig::from_env();
        assert_eq!(config.brokers, vec!["k1:9092", "k2:9092"]);
        assert_eq!(config.bootstrap_servers(), "k1:9092,k2:9092");
        assert_eq!(config.topic, "orders");
    }

    #[test]
    fn test_stream_config_defaults_when_unset() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _brokers = EnvVarGuard::set("ORDERLINE_KAFKA_BROKERS", Some(" "));
        let config = StreamConfig::from_env();
        assert_eq!(config, StreamConfig::default());
    }

    #[test]
    fn test_parse_bind_addr() {
        assert_eq!(
            parse_bind_addr(":8081").unwrap(),
            SocketAddr::from(([0, 0, 0, 0], 8081))
        );
        assert_eq!(
            parse_bind_addr("127.0.0.1:9000").unwrap(),
            SocketAddr::from(([127, 0, 0, 1], 9000))
        );
        assert!(parse_bind_addr("localhost").is_err());
    }

    #[test]
    fn test_server_config_rejects_bad_addr() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _addr = EnvVarGuard::set("ORDERLINE_HTTP_ADDR", Some("not an address"));
        assert!(ServerConfig::from_env().is_err());
    }

    #[test]
    fn test_server_config_defaults() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _addr = EnvVarGuard::set("ORDERLINE_HTTP_ADDR", None);
        let _grace = EnvVarGuard::set("ORDERLINE_SHUTDOWN_GRACE_SECS", None);
        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.http_addr, SocketAddr::from(([0, 0, 0, 0], 8081)));
        assert_eq!(config.shutdown_grace, Duration::from_secs(10));
    }
}
