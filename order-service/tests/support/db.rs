use order_service::db::{DbClient, DbConfig};

/// Client for the test database, with the schema applied.
///
/// Reads the same `ORDER_DB_*` variables as the service.
pub async fn test_db_client() -> DbClient {
    let config = DbConfig::from_env().expect("Invalid database configuration");
    let db = DbClient::from_config(&config).expect("Failed to create database client");
    db.apply_schema().await.expect("Failed to apply schema");
    db
}

/// Order id that does not collide across test runs.
pub fn unique_uid(prefix: &str) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{}-{}", prefix, nanos)
}
