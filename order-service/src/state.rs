//! Shared application state for Axum routers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use order_storage::ReadService;

use crate::db::DbClient;
use crate::ingest::IngestMetrics;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Cache-aside lookups.
    pub read_service: ReadService,
    /// Database client for readiness checks.
    pub db: DbClient,
    /// Counters and run state of the ingestion consumer.
    pub ingest: Arc<IngestMetrics>,
    /// Whether the startup warm-up filled the cache.
    pub cache_warmed: bool,
    /// Directory the UI is served from.
    pub web_dir: PathBuf,
    /// Upper bound on a single request.
    pub request_timeout: Duration,
    pub start_time: Instant,
}

crate::impl_from_ref!(ReadService, read_service);
crate::impl_from_ref!(DbClient, db);
