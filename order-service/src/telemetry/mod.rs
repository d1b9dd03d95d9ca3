//! Order Service Telemetry
//!
//! Structured logging through `tracing` and Prometheus metrics for the
//! consumer, the store and the HTTP layer.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics_handler, with_metrics, OrderMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracing, DEFAULT_LOG_FILTER};
