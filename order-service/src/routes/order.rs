//! Order lookup endpoint.
//!
//! `GET /order/:id` answers from the cache and falls back to one full store
//! reload on a miss. The id is matched exactly as sent; a blank id is
//! rejected. A reload failure is logged by the read service and
//! reported to the client as not found.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use order_storage::{LookupOutcome, ReadService};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::telemetry::with_metrics;

/// GET /order/:id
pub async fn get_order(
    State(service): State<ReadService>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    if id.trim().is_empty() {
        return Err(ApiError::missing_field("id"));
    }

    let outcome = service.lookup(&id).await;
    with_metrics(|m| m.record_lookup(outcome.label()));

    match outcome {
        LookupOutcome::Hit(order) | LookupOutcome::Reloaded(order) => {
            Ok(Json(&*order).into_response())
        }
        LookupOutcome::Absent | LookupOutcome::ReloadFailed(_) => {
            Err(ApiError::order_not_found(&id))
        }
    }
}

/// GET /order/ and GET /order
pub async fn missing_id() -> ApiError {
    ApiError::missing_field("id")
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/order", get(missing_id))
        .route("/order/", get(missing_id))
        .route("/order/:id", get(get_order))
}
