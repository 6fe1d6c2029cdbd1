//! orderline Server Entry Point
//!
//! Connects to PostgreSQL, warms the order cache, then runs the ingestion
//! loop and the HTTP server until SIGINT/SIGTERM or until either one stops.

use std::sync::Arc;

use orderline_api::{
    create_router, init_tracer, shutdown_signalled, ApiError, ApiResult, AppState, IngestConfig,
    IngestLoop, IngestMetrics, KafkaStream, ServerConfig, StreamConfig, TelemetryConfig,
};
use orderline_storage::{DbConfig, OrderCache, OrderStore, PgOrderStore};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::from_env();
    init_tracer(&telemetry_config)?;

    let server_config = ServerConfig::from_env()?;
    let stream_config = StreamConfig::from_env();
    let ingest_config = IngestConfig::from_env();
    let db_config = DbConfig::from_env();

    let pg = PgOrderStore::connect_with_retry(&db_config)
        .await
        .map_err(|e| ApiError::service_unavailable(format!("PostgreSQL unreachable: {}", e)))?;
    pg.migrate()
        .await
        .map_err(|e| ApiError::database_error(format!("Schema migration failed: {}", e)))?;
    let store: Arc<dyn OrderStore> = Arc::new(pg);

    let cache = Arc::new(OrderCache::new());
    if let Err(e) = cache.warm_up(store.as_ref()).await {
        tracing::warn!(error = %e, "Cache warm-up failed, starting with an empty cache");
    }

    let stream = KafkaStream::connect(&stream_config)
        .map_err(|e| ApiError::service_unavailable(format!("Kafka consumer failed: {}", e)))?;
    let metrics = Arc::new(IngestMetrics::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let ingest = IngestLoop::new(stream, Arc::clone(&store), Arc::clone(&cache), &ingest_config)
        .with_metrics(Arc::clone(&metrics));
    let mut ingest_handle = tokio::spawn(ingest.run(shutdown_rx.clone()));

    let app = create_router(AppState::new(store, cache, metrics));
    let addr = server_config.http_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!(%addr, "Starting orderline HTTP server");

    let mut server_rx = shutdown_rx;
    let mut server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown_signalled(&mut server_rx).await })
            .await
    });

    let mut ingest_done = None;
    let mut server_done = None;
    tokio::select! {
        _ = termination_signal() => {
            tracing::info!("Shutdown signal received");
        }
        outcome = &mut ingest_handle => {
            tracing::warn!("Ingestion loop ended, shutting down");
            ingest_done = Some(outcome);
        }
        outcome = &mut server_handle => {
            tracing::warn!("HTTP server ended, shutting down");
            server_done = Some(outcome);
        }
    }
    let _ = shutdown_tx.send(true);

    let drain = async {
        let ingest = match ingest_done {
            Some(outcome) => outcome,
            None => (&mut ingest_handle).await,
        };
        let server = match server_done {
            Some(outcome) => outcome,
            None => (&mut server_handle).await,
        };
        (ingest, server)
    };
    let drained = tokio::time::timeout(server_config.shutdown_grace, drain).await;

    let (ingest_outcome, server_outcome) = match drained {
        Ok(outcomes) => outcomes,
        Err(_) => {
            tracing::warn!(
                grace_secs = server_config.shutdown_grace.as_secs(),
                "Grace period elapsed, aborting remaining tasks"
            );
            ingest_handle.abort();
            server_handle.abort();
            return Ok(());
        }
    };

    match server_outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            return Err(ApiError::internal_error(format!("Server error: {}", e)));
        }
        Err(e) => {
            return Err(ApiError::internal_error(format!("Server task failed: {}", e)));
        }
    }

    match ingest_outcome {
        Ok(Ok(())) => {
            tracing::info!("orderline stopped");
            Ok(())
        }
        Ok(Err(e)) => Err(ApiError::service_unavailable(format!(
            "Ingestion stopped: {}",
            e
        ))),
        Err(e) => Err(ApiError::internal_error(format!(
            "Ingestion task failed: {}",
            e
        ))),
    }
}

/// Resolve on SIGINT or SIGTERM.
async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
