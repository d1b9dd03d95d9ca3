//! Health endpoints.
//!
//! `/health/ping` and `/health/live` answer as long as the process runs.
//! `/health/ready` reports the order pipeline and answers 503 unless the
//! database responds and the ingestion consumer is still pulling messages.
//! A cold cache is reported but never fails readiness; lookups reload on miss.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use order_storage::OrderCache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::db::DbClient;
use crate::ingest::IngestMetrics;

// ============================================================================
// STATE
// ============================================================================

/// Pipeline handles inspected by the readiness check.
#[derive(Clone)]
pub struct HealthState {
    pub db: DbClient,
    pub cache: Arc<OrderCache>,
    pub ingest: Arc<IngestMetrics>,
    pub cache_warmed: bool,
    pub start_time: Instant,
}

// ============================================================================
// REPORTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liveness {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Body of `/health/ready`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readiness {
    pub ready: bool,
    pub database: DatabaseCheck,
    pub consumer: ConsumerCheck,
    pub cache: CacheCheck,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseCheck {
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerCheck {
    pub running: bool,
    pub processed: u64,
    /// Messages dropped for decode or store failures.
    pub dropped: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheCheck {
    pub entries: usize,
    pub warmed: bool,
}

impl ConsumerCheck {
    fn from_metrics(metrics: &IngestMetrics) -> Self {
        let snapshot = metrics.snapshot();
        Self {
            running: metrics.is_running(),
            processed: snapshot.processed,
            dropped: snapshot.decode_failed + snapshot.store_failed,
        }
    }
}

impl Readiness {
    fn assess(database: DatabaseCheck, consumer: ConsumerCheck, cache: CacheCheck) -> Self {
        Self {
            ready: database.reachable && consumer.running,
            database,
            consumer,
            cache,
        }
    }
}

async fn check_database(db: &DbClient) -> DatabaseCheck {
    let start = Instant::now();
    match db.health_check().await {
        Ok(()) => DatabaseCheck {
            reachable: true,
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => DatabaseCheck {
            reachable: false,
            latency_ms: None,
            error: Some(e.message),
        },
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// GET /health/live
pub async fn liveness(State(state): State<Arc<HealthState>>) -> Json<Liveness> {
    Json(Liveness {
        status: "alive".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

/// GET /health/ready
pub async fn readiness(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let report = Readiness::assess(
        check_database(&state.db).await,
        ConsumerCheck::from_metrics(&state.ingest),
        CacheCheck {
            entries: state.cache.len(),
            warmed: state.cache_warmed,
        },
    );

    if !report.ready {
        tracing::warn!(
            database = report.database.reachable,
            consumer = report.consumer.running,
            "service not ready"
        );
    }

    let status = if report.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

/// Health routes, to be nested under `/health`.
pub fn create_router<S>(state: HealthState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .with_state(Arc::new(state))
}
