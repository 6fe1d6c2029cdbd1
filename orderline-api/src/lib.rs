//! orderline API - Order Ingestion and Read Service
//!
//! Consumes order messages from a stream, persists them to PostgreSQL through
//! [`orderline_storage::OrderStore`], keeps an in-memory cache current and
//! serves orders over HTTP (Axum).

pub mod backoff;
pub mod config;
pub mod constants;
pub mod error;
pub mod jobs;
pub mod macros;
pub mod routes;
pub mod services;
pub mod state;
pub mod stream;
pub mod telemetry;

// Re-export commonly used types
pub use backoff::{Backoff, RecordingSleeper, Sleeper, TokioSleeper};
pub use config::{IngestConfig, RetryConfig, ServerConfig, StreamConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use jobs::{shutdown_signalled, IngestLoop, IngestMetrics, IngestSnapshot};
pub use routes::create_router;
pub use services::OrderQuery;
pub use state::AppState;
pub use stream::{MemoryStream, MessageStream, StreamError, StreamMessage};
#[cfg(feature = "kafka")]
pub use stream::KafkaStream;
pub use telemetry::{init_tracer, TelemetryConfig};
