//! HTTP router tests against an in-memory store.
//!
//! The database client points at a closed port: its pool is lazy, and only
//! the readiness check tries to reach it.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use order_core::{IngestConfig, Order};
use order_events::InMemoryChannel;
use order_service::{create_router, ingest_task, AppState, DbClient, DbConfig, IngestMetrics};
use order_storage::{InMemoryOrderStore, OrderCache, ReadService};
use order_test_utils::fixtures::{order_payload, sample_order};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tower::ServiceExt;

// ============================================================================
// HELPERS
// ============================================================================

fn unconnected_db() -> Result<DbClient, String> {
    DbClient::from_config(&DbConfig {
        url: Some("postgres://nobody@127.0.0.1:1/none".to_string()),
        ..DbConfig::default()
    })
    .map_err(|e| e.to_string())
}

fn test_app(
    store: &InMemoryOrderStore,
    cache: &Arc<OrderCache>,
    web_dir: PathBuf,
) -> Result<Router, String> {
    Ok(create_router(AppState {
        read_service: ReadService::new(Arc::clone(cache), Arc::new(store.clone())),
        db: unconnected_db()?,
        ingest: Arc::new(IngestMetrics::new()),
        cache_warmed: false,
        web_dir,
        request_timeout: Duration::from_secs(10),
        start_time: Instant::now(),
    }))
}

async fn get(app: Router, uri: &str) -> Result<(StatusCode, Vec<u8>), String> {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .map_err(|e| e.to_string())?;
    let response = app.oneshot(request).await.map_err(|e| e.to_string())?;
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .map_err(|e| e.to_string())?;
    Ok((status, body.to_vec()))
}

async fn get_json(app: Router, uri: &str) -> Result<(StatusCode, serde_json::Value), String> {
    let (status, body) = get(app, uri).await?;
    let json = serde_json::from_slice(&body).map_err(|e| e.to_string())?;
    Ok((status, json))
}

// ============================================================================
// GET /order/:id
// ============================================================================

#[tokio::test]
async fn test_cached_order_is_returned() -> Result<(), String> {
    let store = InMemoryOrderStore::new();
    let cache = Arc::new(OrderCache::new());
    let order = sample_order("o1");
    cache.set("o1", order.clone());

    let app = test_app(&store, &cache, PathBuf::from("./web"))?;
    let (status, body) = get(app, "/order/o1").await?;

    assert_eq!(status, StatusCode::OK);
    let returned: Order = serde_json::from_slice(&body).map_err(|e| e.to_string())?;
    assert_eq!(returned, order);
    assert_eq!(store.load_calls(), 0, "a cache hit must not touch the store");
    Ok(())
}

#[tokio::test]
async fn test_cache_miss_reloads_from_store() -> Result<(), String> {
    let order = sample_order("stored-only");
    let store = InMemoryOrderStore::with_orders([order.clone()]);
    let cache = Arc::new(OrderCache::new());

    let app = test_app(&store, &cache, PathBuf::from("./web"))?;
    let (status, json) = get_json(app, "/order/stored-only").await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["order_uid"], "stored-only");
    assert_eq!(store.load_calls(), 1);
    assert!(cache.get("stored-only").is_some());
    Ok(())
}

#[tokio::test]
async fn test_unknown_order_is_404() -> Result<(), String> {
    let store = InMemoryOrderStore::new();
    let cache = Arc::new(OrderCache::new());

    let app = test_app(&store, &cache, PathBuf::from("./web"))?;
    let (status, json) = get_json(app, "/order/unknown-id").await?;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "ORDER_NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn test_reload_failure_is_404() -> Result<(), String> {
    let store = InMemoryOrderStore::with_orders([sample_order("o1")]);
    store.set_fail_loads(true);
    let cache = Arc::new(OrderCache::new());

    let app = test_app(&store, &cache, PathBuf::from("./web"))?;
    let (status, _) = get(app, "/order/o1").await?;

    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_empty_id_is_400() -> Result<(), String> {
    let store = InMemoryOrderStore::new();
    let cache = Arc::new(OrderCache::new());

    for uri in ["/order/", "/order", "/order/%20"] {
        let app = test_app(&store, &cache, PathBuf::from("./web"))?;
        let (status, json) = get_json(app, uri).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "uri {uri}");
        assert_eq!(json["code"], "MISSING_FIELD");
    }
    assert_eq!(store.load_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_id_is_matched_verbatim() -> Result<(), String> {
    let store = InMemoryOrderStore::new();
    let cache = Arc::new(OrderCache::new());
    cache.set("o1", sample_order("o1"));

    for uri in ["/order/%20o1", "/order/o1%20"] {
        let app = test_app(&store, &cache, PathBuf::from("./web"))?;
        let (status, json) = get_json(app, uri).await?;
        assert_eq!(status, StatusCode::NOT_FOUND, "uri {uri}");
        assert_eq!(json["code"], "ORDER_NOT_FOUND");
    }
    Ok(())
}

// ============================================================================
// END TO END THROUGH THE CONSUMER
// ============================================================================

async fn ingest_all(channel: &InMemoryChannel, store: &InMemoryOrderStore, cache: &Arc<OrderCache>) {
    let subscription = channel.subscribe("router-tests");
    channel.close();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    ingest_task(
        subscription,
        Arc::new(store.clone()),
        Arc::clone(cache),
        IngestConfig::default(),
        Arc::new(IngestMetrics::new()),
        shutdown_rx,
    )
    .await;
}

#[tokio::test]
async fn test_published_order_then_emptied_items() -> Result<(), String> {
    let channel = InMemoryChannel::new();
    let store = InMemoryOrderStore::new();
    let cache = Arc::new(OrderCache::new());

    let first = sample_order("o1");
    assert_eq!(first.items.len(), 1);
    let mut second = first.clone();
    second.items.clear();

    channel
        .publish_now(order_payload(&first))
        .map_err(|e| e.to_string())?;
    ingest_all(&channel, &store, &cache).await;

    let app = test_app(&store, &cache, PathBuf::from("./web"))?;
    let (status, json) = get_json(app, "/order/o1").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["items"].as_array().map(Vec::len), Some(1));

    let channel = InMemoryChannel::new();
    channel
        .publish_now(order_payload(&second))
        .map_err(|e| e.to_string())?;
    ingest_all(&channel, &store, &cache).await;

    let app = test_app(&store, &cache, PathBuf::from("./web"))?;
    let (status, json) = get_json(app, "/order/o1").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["items"].as_array().map(Vec::len), Some(0));
    Ok(())
}

// ============================================================================
// UI, HEALTH, METRICS
// ============================================================================

#[tokio::test]
async fn test_ui_and_static_files_are_served() -> Result<(), String> {
    let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
    std::fs::write(dir.path().join("index.html"), "<html>orders</html>")
        .map_err(|e| e.to_string())?;
    std::fs::write(dir.path().join("app.js"), "console.log(1);").map_err(|e| e.to_string())?;

    let store = InMemoryOrderStore::new();
    let cache = Arc::new(OrderCache::new());

    let app = test_app(&store, &cache, dir.path().to_path_buf())?;
    let (status, body) = get(app, "/ui").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"<html>orders</html>");

    let app = test_app(&store, &cache, dir.path().to_path_buf())?;
    let (status, body) = get(app, "/static/app.js").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"console.log(1);");
    Ok(())
}

#[tokio::test]
async fn test_health_ping_and_live() -> Result<(), String> {
    let store = InMemoryOrderStore::new();
    let cache = Arc::new(OrderCache::new());

    let app = test_app(&store, &cache, PathBuf::from("./web"))?;
    let (status, body) = get(app, "/health/ping").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"pong");

    let app = test_app(&store, &cache, PathBuf::from("./web"))?;
    let (status, json) = get_json(app, "/health/live").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "alive");
    Ok(())
}

#[tokio::test]
async fn test_ready_reports_pipeline_state() -> Result<(), String> {
    let store = InMemoryOrderStore::new();
    let cache = Arc::new(OrderCache::new());
    cache.set("o1", sample_order("o1"));

    let app = test_app(&store, &cache, PathBuf::from("./web"))?;
    let (status, json) = get_json(app, "/health/ready").await?;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["ready"], false);
    assert_eq!(json["database"]["reachable"], false);
    assert_eq!(json["consumer"]["running"], false);
    assert_eq!(json["cache"]["entries"], 1);
    assert_eq!(json["cache"]["warmed"], false);
    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint() -> Result<(), String> {
    let store = InMemoryOrderStore::new();
    let cache = Arc::new(OrderCache::new());

    let app = test_app(&store, &cache, PathBuf::from("./web"))?;
    let (status, body) = get(app, "/metrics").await?;

    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).map_err(|e| e.to_string())?;
    assert!(text.contains("order_cache_entries"));
    Ok(())
}
