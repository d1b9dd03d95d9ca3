//! Order Service Entry Point
//!
//! Startup order: configuration, tracing, database (fatal), schema, cache
//! warm-up (non-fatal), channel subscription (fatal), consumer, HTTP server.
//! SIGINT or SIGTERM stops intake, then waits a bounded grace period for
//! in-flight requests and the in-flight message.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Instant;

use order_events::NatsChannel;
use order_service::telemetry::{init_tracing, with_metrics};
use order_service::{
    create_router, ingest_task, ApiError, ApiResult, AppState, DbClient, IngestMetrics,
    ServiceConfig,
};
use order_storage::{warm_up, OrderCache, OrderStore, ReadService};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let config = ServiceConfig::from_env()?;
    init_tracing(config.log_format)?;
    let start_time = Instant::now();

    // Store
    let db = DbClient::from_config(&config.db)?;
    if let Err(e) = db.health_check().await {
        tracing::error!(error = %e, "database unreachable");
        return Err(e);
    }
    if config.apply_schema {
        db.apply_schema().await?;
    }
    let store: Arc<dyn OrderStore> = Arc::new(db.clone());

    // Cache
    let cache = Arc::new(OrderCache::new());
    let cache_warmed = warm_up(store.as_ref(), &cache).await.is_ok();
    if cache_warmed {
        with_metrics(|m| m.set_cache_entries(cache.len()));
    }

    // Channel
    let channel = NatsChannel::connect(config.nats.clone()).await.map_err(|e| {
        tracing::error!(error = %e, "channel unreachable");
        ApiError::from(e)
    })?;
    let subscription = channel.subscribe().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ingest_metrics = Arc::new(IngestMetrics::new());

    let consumer = tokio::spawn(ingest_task(
        subscription,
        Arc::clone(&store),
        Arc::clone(&cache),
        config.ingest.clone(),
        Arc::clone(&ingest_metrics),
        shutdown_rx.clone(),
    ));

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        let _ = signal_tx.send(true);
    });

    // HTTP
    let app = create_router(AppState {
        read_service: ReadService::new(Arc::clone(&cache), Arc::clone(&store)),
        db,
        ingest: ingest_metrics,
        cache_warmed,
        web_dir: config.web_dir.clone(),
        request_timeout: config.http_request_timeout,
        start_time,
    });

    let addr = config.http_bind;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!(%addr, "Starting order service");

    let mut server_rx = shutdown_rx.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_rx.wait_for(|stop| *stop).await;
        })
        .into_future();

    let mut grace_rx = shutdown_rx.clone();
    let grace = config.shutdown_grace;
    let served = tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))
        }
        _ = async move {
            let _ = grace_rx.wait_for(|stop| *stop).await;
            tokio::time::sleep(grace).await;
        } => {
            tracing::warn!(grace_secs = grace.as_secs(), "HTTP drain exceeded grace period");
            Ok(())
        }
    };

    // Server is down either way; stop the consumer too.
    let _ = shutdown_tx.send(true);
    match tokio::time::timeout(config.shutdown_grace, consumer).await {
        Ok(Ok(metrics)) => {
            let snapshot = metrics.snapshot();
            tracing::info!(processed = snapshot.processed, "consumer stopped");
        }
        Ok(Err(e)) => tracing::error!(error = %e, "consumer task failed"),
        Err(_) => tracing::warn!("consumer did not stop within grace period"),
    }

    if let Err(e) = channel.flush().await {
        tracing::debug!(error = %e, "channel flush on shutdown failed");
    }

    tracing::info!(uptime_secs = start_time.elapsed().as_secs(), "Order service stopped");
    served
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
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
                tracing::error!(error = %e, "failed to listen for SIGTERM");
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
