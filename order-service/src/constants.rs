//! Default values for service configuration.

// ============================================================================
// DATABASE
// ============================================================================

pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_DB_NAME: &str = "demo_orders";
pub const DEFAULT_DB_USER: &str = "demo_user";
pub const DEFAULT_DB_POOL_SIZE: usize = 10;
pub const DEFAULT_DB_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// CHANNEL
// ============================================================================

pub const DEFAULT_NATS_URL: &str = "nats://localhost:4222";
pub const DEFAULT_NATS_STREAM: &str = "ORDERS";
pub const DEFAULT_NATS_SUBJECT: &str = "orders";
pub const DEFAULT_NATS_DURABLE: &str = "order-durable";

// ============================================================================
// HTTP
// ============================================================================

pub const DEFAULT_HTTP_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_WEB_DIR: &str = "./web";
pub const DEFAULT_HTTP_REQUEST_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// INGESTION & LIFECYCLE
// ============================================================================

pub const DEFAULT_UPSERT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;
