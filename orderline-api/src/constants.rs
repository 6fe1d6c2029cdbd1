//! Constants for orderline API
//!
//! Default values for configuration read from the environment.

// ============================================================================
// HTTP SERVER
// ============================================================================

/// Default listen address for the read API
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8081";

/// Default grace period for draining tasks on shutdown (seconds)
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

// ============================================================================
// STREAM
// ============================================================================

/// Default Kafka bootstrap servers
pub const DEFAULT_KAFKA_BROKERS: &str = "localhost:9092";

/// Default topic carrying order messages
pub const DEFAULT_KAFKA_TOPIC: &str = "orders";

/// Default consumer group
pub const DEFAULT_KAFKA_GROUP_ID: &str = "orders-consumer";

// ============================================================================
// INGESTION BACKOFF
// ============================================================================

/// First pause after a malformed message or a failed fetch (milliseconds)
pub const DEFAULT_DECODE_BACKOFF_MS: u64 = 300;

/// First pause after a failed store write (milliseconds)
pub const DEFAULT_STORE_BACKOFF_MS: u64 = 500;

/// Upper bound for any ingestion pause (milliseconds)
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;

/// Growth factor between consecutive pauses
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

// ============================================================================
// TELEMETRY
// ============================================================================

/// Default service name attached to log lines
pub const DEFAULT_SERVICE_NAME: &str = "orderline";

/// Default log level when neither RUST_LOG nor ORDERLINE_LOG_LEVEL is set
pub const DEFAULT_LOG_LEVEL: &str = "info";
