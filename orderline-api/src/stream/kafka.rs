//! Kafka adapter for [`MessageStream`].
//!
//! Auto-commit is off: offsets are committed only through [`MessageStream::ack`].
//! A nack seeks the partition back to the message offset, so librdkafka
//! refetches it on the next poll. A failed seek is reported as transient and
//! the ingestion loop retries it before fetching again.

use super::{MessageStream, StreamError, StreamMessage};
use crate::config::StreamConfig;
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{Offset, TopicPartitionList};
use std::time::Duration;

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// Map a client error to a stream error. Only errors that leave the client
/// unusable are fatal.
fn classify(err: KafkaError) -> StreamError {
    if err.rdkafka_error_code() == Some(RDKafkaErrorCode::Fatal) {
        return StreamError::Fatal(err.to_string());
    }
    match err {
        KafkaError::ClientCreation(_) | KafkaError::Subscription(_) => {
            StreamError::Fatal(err.to_string())
        }
        other => StreamError::Transient(other.to_string()),
    }
}

/// Consumer-group member reading one topic.
pub struct KafkaStream {
    consumer: StreamConsumer,
    topic: String,
}

impl KafkaStream {
    /// Create the consumer and subscribe. No broker round-trip happens here.
    pub fn connect(config: &StreamConfig) -> Result<Self, StreamError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", config.bootstrap_servers())
            .set("group.id", config.group_id.as_str())
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(classify)?;
        consumer
            .subscribe(&[config.topic.as_str()])
            .map_err(classify)?;

        tracing::info!(
            brokers = %config.bootstrap_servers(),
            topic = %config.topic,
            group = %config.group_id,
            "Kafka consumer subscribed"
        );

        Ok(Self {
            consumer,
            topic: config.topic.clone(),
        })
    }
}

#[async_trait]
impl MessageStream for KafkaStream {
    async fn fetch(&mut self) -> Result<Option<StreamMessage>, StreamError> {
        let message = self.consumer.recv().await.map_err(classify)?;
        Ok(Some(StreamMessage {
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(<[u8]>::to_vec),
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        }))
    }

    async fn ack(&mut self, message: &StreamMessage) -> Result<(), StreamError> {
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(&self.topic, message.partition, Offset::Offset(message.offset + 1))
            .map_err(classify)?;
        self.consumer
            .commit(&offsets, CommitMode::Async)
            .map_err(classify)
    }

    /// librdkafka's seek blocks the calling thread for up to [`SEEK_TIMEOUT`],
    /// so it runs under `block_in_place`. Requires the multi-thread runtime.
    async fn nack(&mut self, message: &StreamMessage) -> Result<(), StreamError> {
        let consumer = &self.consumer;
        let topic = self.topic.as_str();
        tokio::task::block_in_place(|| {
            consumer.seek(
                topic,
                message.partition,
                Offset::Offset(message.offset),
                SEEK_TIMEOUT,
            )
        })
        .map_err(classify)
    }
}

/// Publish one message to the configured topic and wait for delivery.
pub async fn publish(config: &StreamConfig, key: &str, payload: &[u8]) -> Result<(), StreamError> {
    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", config.bootstrap_servers())
        .set("acks", "all")
        .set("message.timeout.ms", "10000")
        .create()
        .map_err(classify)?;

    let record = FutureRecord::to(&config.topic).key(key).payload(payload);
    match producer.send(record, PUBLISH_TIMEOUT).await {
        Ok(delivery) => {
            tracing::info!(topic = %config.topic, key, ?delivery, "Message delivered");
            Ok(())
        }
        Err((err, _)) => Err(classify(err)),
    }
}
