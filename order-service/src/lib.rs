//! Order Service - Ingestion Consumer and Lookup API
//!
//! Consumes order messages from a durable JetStream subscription, persists
//! them to PostgreSQL, keeps every aggregate in an in-memory cache, and
//! serves `GET /order/:id` from that cache with a full reload on miss.

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod ingest;
pub mod macros;
pub mod pg_store;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::{nats_from_env, LogFormat, ServiceConfig};
pub use db::{DbClient, DbConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use ingest::{ingest_task, process_delivery, IngestMetrics, IngestOutcome, IngestSnapshot};
pub use routes::create_router;
pub use state::AppState;
