//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling using deadpool-postgres. The store
//! operations on [`DbClient`] live in [`crate::pg_store`].

use crate::config::parse_var;
use crate::constants::*;
use crate::error::{ApiError, ApiResult};
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use order_core::{ConfigError, StorageError};
use std::time::Duration;
use tokio_postgres::NoTls;
use tracing::info;

/// Idempotent DDL for the four order tables.
const SCHEMA_SQL: &str = include_str!("../migrations/V1__orders.sql");

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full connection string. Takes precedence over the discrete fields.
    pub url: Option<String>,
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection and pool wait timeout
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            dbname: DEFAULT_DB_NAME.to_string(),
            user: DEFAULT_DB_USER.to_string(),
            password: String::new(),
            max_size: DEFAULT_DB_POOL_SIZE,
            timeout: Duration::from_secs(DEFAULT_DB_TIMEOUT_SECS),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            url: get("ORDER_DB_URL").filter(|url| !url.trim().is_empty()),
            host: get("ORDER_DB_HOST").unwrap_or_else(|| DEFAULT_DB_HOST.to_string()),
            port: parse_var(get, "ORDER_DB_PORT", || Ok(DEFAULT_DB_PORT))?,
            dbname: get("ORDER_DB_NAME").unwrap_or_else(|| DEFAULT_DB_NAME.to_string()),
            user: get("ORDER_DB_USER").unwrap_or_else(|| DEFAULT_DB_USER.to_string()),
            password: get("ORDER_DB_PASSWORD").unwrap_or_default(),
            max_size: parse_var(get, "ORDER_DB_POOL_SIZE", || Ok(DEFAULT_DB_POOL_SIZE))?,
            timeout: Duration::from_secs(parse_var(get, "ORDER_DB_TIMEOUT_SECS", || {
                Ok(DEFAULT_DB_TIMEOUT_SECS)
            })?),
        })
    }

    /// Create a connection pool from this configuration.
    ///
    /// The pool is lazy: no connection is opened until the first checkout.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        match &self.url {
            Some(url) => cfg.url = Some(url.clone()),
            None => {
                cfg.host = Some(self.host.clone());
                cfg.port = Some(self.port);
                cfg.dbname = Some(self.dbname.clone());
                cfg.user = Some(self.user.clone());
                cfg.password = Some(self.password.clone());
            }
        }
        cfg.connect_timeout = Some(self.timeout);

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// DATABASE CLIENT WRAPPER
// ============================================================================

/// Database client that wraps a connection pool.
#[derive(Clone)]
pub struct DbClient {
    pub(crate) pool: Pool,
}

impl DbClient {
    /// Create a new database client with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new database client from configuration.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        let status = self.pool.status();
        status.size
    }

    /// Get a connection from the pool.
    pub async fn get_conn(&self) -> ApiResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(ApiError::from)
    }

    /// Round trip to the database.
    pub async fn health_check(&self) -> ApiResult<()> {
        let conn = self.get_conn().await?;

        conn.query_one("SELECT 1", &[]).await?;

        Ok(())
    }

    /// Create the order tables if they do not exist yet.
    pub async fn apply_schema(&self) -> Result<(), StorageError> {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| StorageError::PoolUnavailable {
                reason: e.to_string(),
            })?;
        conn.batch_execute(SCHEMA_SQL)
            .await
            .map_err(|e| StorageError::SchemaFailed {
                reason: e.to_string(),
            })?;
        info!("order schema applied");
        Ok(())
    }
}
