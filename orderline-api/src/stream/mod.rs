//! Message stream abstraction.
//!
//! The ingestion loop consumes through [`MessageStream`] so the same loop
//! runs against Kafka in production and [`MemoryStream`] in tests.
//!
//! # Delivery contract
//!
//! - [`MessageStream::fetch`] yields the next message, or `None` once the
//!   stream has ended. It must be cancel-safe: the loop drops a pending fetch
//!   when shutdown is signalled.
//! - [`MessageStream::ack`] marks the message consumed. It is not redelivered
//!   to this consumer group afterwards.
//! - [`MessageStream::nack`] rewinds to the message so the next fetch on its
//!   partition returns it again.

use async_trait::async_trait;
use thiserror::Error;

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;

#[cfg(feature = "kafka")]
pub use kafka::KafkaStream;
pub use memory::MemoryStream;

/// One message as read from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

impl StreamMessage {
    /// Message key as text, for logging.
    pub fn key_str(&self) -> &str {
        self.key
            .as_deref()
            .and_then(|k| std::str::from_utf8(k).ok())
            .unwrap_or("")
    }
}

/// Stream operation failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    /// The operation failed but the stream is still usable.
    #[error("Transient stream error: {0}")]
    Transient(String),

    /// The stream cannot be used any more.
    #[error("Fatal stream error: {0}")]
    Fatal(String),
}

impl StreamError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StreamError::Fatal(_))
    }
}

/// A source of order messages with explicit acknowledgement.
#[async_trait]
pub trait MessageStream: Send {
    async fn fetch(&mut self) -> Result<Option<StreamMessage>, StreamError>;

    async fn ack(&mut self, message: &StreamMessage) -> Result<(), StreamError>;

    async fn nack(&mut self, message: &StreamMessage) -> Result<(), StreamError>;
}
