//! Order Ingestion Loop
//!
//! Reads order messages one at a time and makes each durable before it is
//! acknowledged. Per message:
//!
//! 1. Decode the payload. A malformed payload is not acknowledged; the loop
//!    rewinds to it and pauses with the decode backoff before fetching again.
//!    Explicit `null` fields decode as their defaults.
//! 2. Validate. An order without an id or payment transaction is acknowledged
//!    and dropped without touching the store.
//! 3. Upsert into the store. On failure the message is rewound, the loop
//!    pauses with the store backoff and the same message is retried.
//! 4. Write the order into the cache, then acknowledge.
//!
//! A rewind that fails is retried under the same backoff before anything else
//! is fetched, so a later acknowledgement never commits past a message that
//! was not persisted. A failed acknowledgement is logged and counted. Only a
//! fatal stream error stops the loop with an error; a shutdown signal or the
//! end of the stream stops it cleanly.

use crate::backoff::{Backoff, Sleeper, TokioSleeper};
use crate::config::IngestConfig;
use crate::jobs::shutdown_signalled;
use crate::stream::{MessageStream, StreamError, StreamMessage};
use orderline_core::decode;
use orderline_storage::{OrderCache, OrderStore};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

// ============================================================================
// METRICS
// ============================================================================

/// Counters for ingestion activity since startup.
#[derive(Debug, Default)]
pub struct IngestMetrics {
    /// Messages handed out by the stream, redeliveries included
    pub received: AtomicU64,

    /// Payloads that failed to decode
    pub decode_failures: AtomicU64,

    /// Orders acknowledged and dropped by validation
    pub rejected: AtomicU64,

    /// Upserts that failed and were scheduled for retry
    pub persist_failures: AtomicU64,

    /// Orders written to the store and the cache
    pub persisted: AtomicU64,

    /// Acknowledgements the stream refused
    pub ack_failures: AtomicU64,

    /// Rewinds the stream refused and that were retried
    pub nack_failures: AtomicU64,
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all counters.
    pub fn snapshot(&self) -> IngestSnapshot {
        IngestSnapshot {
            received: self.received.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            ack_failures: self.ack_failures.load(Ordering::Relaxed),
            nack_failures: self.nack_failures.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Snapshot of ingestion counters at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSnapshot {
    pub received: u64,
    pub decode_failures: u64,
    pub rejected: u64,
    pub persist_failures: u64,
    pub persisted: u64,
    pub ack_failures: u64,
    pub nack_failures: u64,
}

// ============================================================================
// LOOP
// ============================================================================

/// Outcome of handling one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    Shutdown,
}

/// Which backoff governs a rewound message.
#[derive(Debug, Clone, Copy)]
enum Retry {
    Decode,
    Store,
}

/// The single consumer task moving orders from the stream into storage.
pub struct IngestLoop<S> {
    stream: S,
    store: Arc<dyn OrderStore>,
    cache: Arc<OrderCache>,
    metrics: Arc<IngestMetrics>,
    sleeper: Arc<dyn Sleeper>,
    decode_backoff: Backoff,
    store_backoff: Backoff,
}

impl<S: MessageStream> IngestLoop<S> {
    pub fn new(
        stream: S,
        store: Arc<dyn OrderStore>,
        cache: Arc<OrderCache>,
        config: &IngestConfig,
    ) -> Self {
        Self {
            stream,
            store,
            cache,
            metrics: Arc::new(IngestMetrics::new()),
            sleeper: Arc::new(TokioSleeper),
            decode_backoff: config.decode_retry.backoff(),
            store_backoff: config.store_retry.backoff(),
        }
    }

    /// Replace the sleeper used for backoff pauses.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Report into an existing metrics instance, e.g. one shared with the
    /// health endpoint.
    pub fn with_metrics(mut self, metrics: Arc<IngestMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Arc<IngestMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run until shutdown, end of stream or a fatal stream error.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) -> Result<(), StreamError> {
        tracing::info!("Ingestion loop started");

        let outcome = loop {
            let fetched = tokio::select! {
                biased;
                _ = shutdown_signalled(&mut shutdown_rx) => {
                    tracing::info!("Ingestion loop shutting down");
                    break Ok(());
                }
                fetched = self.stream.fetch() => fetched,
            };

            let step = match fetched {
                Ok(Some(message)) => match self.handle(message, &mut shutdown_rx).await {
                    Ok(step) => step,
                    Err(err) => break Err(err),
                },
                Ok(None) => {
                    tracing::info!("Message stream ended");
                    break Ok(());
                }
                Err(err) if err.is_fatal() => break Err(err),
                Err(err) => {
                    let delay = self.decode_backoff.next_delay();
                    tracing::warn!(
                        error = %err,
                        attempt = self.decode_backoff.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "Failed to fetch message, backing off"
                    );
                    pause(&*self.sleeper, delay, &mut shutdown_rx).await
                }
            };

            if step == Step::Shutdown {
                tracing::info!("Ingestion loop shutting down");
                break Ok(());
            }
        };

        let snapshot = self.metrics.snapshot();
        match &outcome {
            Ok(()) => tracing::info!(
                received = snapshot.received,
                persisted = snapshot.persisted,
                rejected = snapshot.rejected,
                decode_failures = snapshot.decode_failures,
                persist_failures = snapshot.persist_failures,
                ack_failures = snapshot.ack_failures,
                nack_failures = snapshot.nack_failures,
                "Ingestion loop stopped"
            ),
            Err(err) => tracing::error!(
                error = %err,
                received = snapshot.received,
                persisted = snapshot.persisted,
                "Ingestion loop stopped on fatal stream error"
            ),
        }
        outcome
    }

    async fn handle(
        &mut self,
        message: StreamMessage,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Result<Step, StreamError> {
        IngestMetrics::bump(&self.metrics.received);

        let order = match decode(&message.payload) {
            Ok(order) => order,
            Err(err) => {
                IngestMetrics::bump(&self.metrics.decode_failures);
                let delay = self.decode_backoff.next_delay();
                tracing::warn!(
                    partition = message.partition,
                    offset = message.offset,
                    key = message.key_str(),
                    error = %err,
                    attempt = self.decode_backoff.attempt(),
                    delay_ms = delay.as_millis() as u64,
                    "Failed to decode order message, will retry"
                );
                return self.rewind(&message, Retry::Decode, delay, shutdown_rx).await;
            }
        };
        self.decode_backoff.reset();

        if let Err(err) = order.validate() {
            IngestMetrics::bump(&self.metrics.rejected);
            tracing::warn!(
                order_uid = %order.order_uid,
                partition = message.partition,
                offset = message.offset,
                error = %err,
                "Dropping invalid order"
            );
            self.ack(&message).await?;
            return Ok(Step::Continue);
        }

        if let Err(err) = self.store.upsert_order(&order).await {
            IngestMetrics::bump(&self.metrics.persist_failures);
            let delay = self.store_backoff.next_delay();
            tracing::error!(
                order_uid = %order.order_uid,
                partition = message.partition,
                offset = message.offset,
                error = %err,
                attempt = self.store_backoff.attempt(),
                delay_ms = delay.as_millis() as u64,
                "Failed to persist order, will retry"
            );
            return self.rewind(&message, Retry::Store, delay, shutdown_rx).await;
        }
        self.store_backoff.reset();
        IngestMetrics::bump(&self.metrics.persisted);

        let order_uid = order.order_uid.clone();
        self.cache.set(order);
        self.ack(&message).await?;

        tracing::info!(
            order_uid = %order_uid,
            partition = message.partition,
            offset = message.offset,
            "Order ingested"
        );
        Ok(Step::Continue)
    }

    async fn ack(&mut self, message: &StreamMessage) -> Result<(), StreamError> {
        match self.stream.ack(message).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                IngestMetrics::bump(&self.metrics.ack_failures);
                tracing::warn!(
                    partition = message.partition,
                    offset = message.offset,
                    error = %err,
                    "Failed to acknowledge message"
                );
                Ok(())
            }
        }
    }

    fn backoff(&mut self, retry: Retry) -> &mut Backoff {
        match retry {
            Retry::Decode => &mut self.decode_backoff,
            Retry::Store => &mut self.store_backoff,
        }
    }

    /// Rewind to `message`, then pause for `delay`.
    ///
    /// A transient rewind failure is retried after a pause, with the backoff
    /// advancing, until it succeeds or shutdown arrives. Fetching before the
    /// rewind lands would hand out the next message, and acknowledging that
    /// one would commit past `message`.
    async fn rewind(
        &mut self,
        message: &StreamMessage,
        retry: Retry,
        mut delay: Duration,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Result<Step, StreamError> {
        while let Err(err) = self.stream.nack(message).await {
            if err.is_fatal() {
                return Err(err);
            }
            IngestMetrics::bump(&self.metrics.nack_failures);
            tracing::warn!(
                partition = message.partition,
                offset = message.offset,
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "Failed to rewind to message, retrying before fetching again"
            );
            if pause(&*self.sleeper, delay, shutdown_rx).await == Step::Shutdown {
                return Ok(Step::Shutdown);
            }
            delay = self.backoff(retry).next_delay();
        }
        Ok(pause(&*self.sleeper, delay, shutdown_rx).await)
    }
}

/// Sleep for `delay` unless shutdown arrives first.
async fn pause(sleeper: &dyn Sleeper, delay: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> Step {
    tokio::select! {
        biased;
        _ = shutdown_signalled(shutdown_rx) => Step::Shutdown,
        _ = sleeper.sleep(delay) => Step::Continue,
    }
}
