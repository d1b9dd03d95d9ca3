//! HTTP Routes
//!
//! ```text
//! GET /order/:id      order aggregate as JSON
//! GET /ui             lookup page
//! GET /static/*       UI assets
//! GET /health/*       ping, live, ready
//! GET /metrics        Prometheus text format
//! ```

pub mod health;
pub mod order;
pub mod ui;

use axum::{middleware::from_fn, routing::get, Router};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

/// Build the full service router.
pub fn create_router(state: AppState) -> Router {
    let health_state = health::HealthState {
        db: state.db.clone(),
        cache: state.read_service.cache().clone(),
        ingest: state.ingest.clone(),
        cache_warmed: state.cache_warmed,
        start_time: state.start_time,
    };

    Router::new()
        .merge(order::create_router())
        .merge(ui::create_router(&state.web_dir))
        .nest("/health", health::create_router(health_state))
        .route("/metrics", get(metrics_handler))
        .layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.request_timeout))
        .with_state(state)
}
