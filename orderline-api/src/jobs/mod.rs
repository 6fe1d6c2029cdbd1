//! Background Jobs for orderline
//!
//! - `ingest`: consumes order messages, persists them and refreshes the cache
//!
//! # Usage
//!
//! The ingestion loop is spawned during server startup next to the HTTP
//! listener, and both watch the same shutdown channel:
//!
//! ```ignore
//! use orderline_api::jobs::IngestLoop;
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let ingest = IngestLoop::new(stream, store, cache, &IngestConfig::from_env());
//! let handle = tokio::spawn(ingest.run(shutdown_rx));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! handle.await??;
//! ```

use tokio::sync::watch;

pub mod ingest;

pub use ingest::{IngestLoop, IngestMetrics, IngestSnapshot};

/// Resolve once `true` has been sent on the shutdown channel.
///
/// If every sender is dropped without signalling, this never resolves.
pub async fn shutdown_signalled(rx: &mut watch::Receiver<bool>) {
    let closed = rx.wait_for(|stop| *stop).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_resolves_on_signal() {
        let (tx, mut rx) = watch::channel(false);
        let handle = tokio::spawn(async move { shutdown_signalled(&mut rx).await });
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_already_signalled_resolves_immediately() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_millis(100), shutdown_signalled(&mut rx))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_sender_never_resolves() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let outcome =
            tokio::time::timeout(Duration::from_millis(20), shutdown_signalled(&mut rx)).await;
        assert!(outcome.is_err());
    }
}
