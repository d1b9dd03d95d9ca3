//! Service Configuration Module
//!
//! Everything the process needs at start is read from `ORDER_*` environment
//! variables. Unset variables fall back to the defaults in
//! [`crate::constants`]; set but unparsable variables are rejected.

use crate::constants::*;
use crate::db::DbConfig;
use order_core::{ConfigError, IngestConfig};
use order_events::NatsConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(ConfigError::InvalidValue {
                field: "ORDER_LOG_FORMAT".to_string(),
                value: other.to_string(),
                reason: "expected json or pretty".to_string(),
            }),
        }
    }
}

/// Full process configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub db: DbConfig,
    /// Run the idempotent schema DDL before serving.
    pub apply_schema: bool,
    pub nats: NatsConfig,
    pub http_bind: SocketAddr,
    /// Directory holding `index.html` and the static assets.
    pub web_dir: PathBuf,
    pub http_request_timeout: Duration,
    pub ingest: IngestConfig,
    /// How long in-flight work may take to finish after a shutdown signal.
    pub shutdown_grace: Duration,
    pub log_format: LogFormat,
}

impl ServiceConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db = DbConfig::from_lookup(&get)?;
        let apply_schema = parse_bool(&get, "ORDER_DB_APPLY_SCHEMA", true)?;

        let nats = nats_from_lookup(&get);

        let http_bind = parse_var(&get, "ORDER_HTTP_BIND", || {
            DEFAULT_HTTP_BIND.parse().map_err(|_| ConfigError::InvalidValue {
                field: "ORDER_HTTP_BIND".to_string(),
                value: DEFAULT_HTTP_BIND.to_string(),
                reason: "invalid default bind address".to_string(),
            })
        })?;

        let web_dir = get("ORDER_WEB_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WEB_DIR));

        let http_request_timeout = Duration::from_secs(parse_var(
            &get,
            "ORDER_HTTP_TIMEOUT_SECS",
            || Ok(DEFAULT_HTTP_REQUEST_TIMEOUT_SECS),
        )?);

        let ingest = IngestConfig {
            upsert_timeout: Duration::from_millis(parse_var(
                &get,
                "ORDER_UPSERT_TIMEOUT_MS",
                || Ok(DEFAULT_UPSERT_TIMEOUT_MS),
            )?),
            ack_on_failure: parse_bool(&get, "ORDER_ACK_ON_FAILURE", true)?,
        };
        ingest.validate().map_err(|e| match e {
            order_core::OrderError::Config(c) => c,
            other => ConfigError::InvalidValue {
                field: "ORDER_UPSERT_TIMEOUT_MS".to_string(),
                value: String::new(),
                reason: other.to_string(),
            },
        })?;

        let shutdown_grace = Duration::from_secs(parse_var(
            &get,
            "ORDER_SHUTDOWN_GRACE_SECS",
            || Ok(DEFAULT_SHUTDOWN_GRACE_SECS),
        )?);

        let log_format = match get("ORDER_LOG_FORMAT") {
            Some(value) => value.parse()?,
            None => LogFormat::Json,
        };

        Ok(Self {
            db,
            apply_schema,
            nats,
            http_bind,
            web_dir,
            http_request_timeout,
            ingest,
            shutdown_grace,
            log_format,
        })
    }
}

/// Channel settings from the process environment.
pub fn nats_from_env() -> NatsConfig {
    nats_from_lookup(&|key: &str| std::env::var(key).ok())
}

fn nats_from_lookup<F>(get: &F) -> NatsConfig
where
    F: Fn(&str) -> Option<String>,
{
    NatsConfig {
        url: get("ORDER_NATS_URL").unwrap_or_else(|| DEFAULT_NATS_URL.to_string()),
        stream: get("ORDER_NATS_STREAM").unwrap_or_else(|| DEFAULT_NATS_STREAM.to_string()),
        subject: get("ORDER_NATS_SUBJECT").unwrap_or_else(|| DEFAULT_NATS_SUBJECT.to_string()),
        durable: get("ORDER_NATS_DURABLE").unwrap_or_else(|| DEFAULT_NATS_DURABLE.to_string()),
    }
}

/// Parse `key` with `FromStr`, or fall back to `default` when unset.
pub(crate) fn parse_var<F, T, D>(get: &F, key: &str, default: D) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
    D: FnOnce() -> Result<T, ConfigError>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            field: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => default(),
    }
}

pub(crate) fn parse_bool<F>(get: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                field: key.to_string(),
                value: raw,
                reason: "expected a boolean".to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.http_bind, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.web_dir, PathBuf::from("./web"));
        assert_eq!(config.nats, NatsConfig::default());
        assert_eq!(config.ingest, IngestConfig::default());
        assert_eq!(config.shutdown_grace, Duration::from_secs(10));
        assert_eq!(config.db.max_size, 10);
        assert!(config.db.url.is_none());
        assert!(config.apply_schema);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_overrides() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("ORDER_HTTP_BIND", "127.0.0.1:9090"),
            ("ORDER_NATS_SUBJECT", "orders.test"),
            ("ORDER_UPSERT_TIMEOUT_MS", "250"),
            ("ORDER_ACK_ON_FAILURE", "false"),
            ("ORDER_DB_URL", "postgres://u:p@db:5432/orders"),
            ("ORDER_LOG_FORMAT", "pretty"),
        ]))
        .unwrap();

        assert_eq!(config.http_bind.port(), 9090);
        assert_eq!(config.nats.subject, "orders.test");
        assert_eq!(config.ingest.upsert_timeout, Duration::from_millis(250));
        assert!(!config.ingest.ack_on_failure);
        assert_eq!(config.db.url.as_deref(), Some("postgres://u:p@db:5432/orders"));
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_invalid_bind_rejected() {
        let err = ServiceConfig::from_lookup(lookup(&[("ORDER_HTTP_BIND", "not-an-addr")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "ORDER_HTTP_BIND"));
    }

    #[test]
    fn test_zero_upsert_timeout_rejected() {
        let err = ServiceConfig::from_lookup(lookup(&[("ORDER_UPSERT_TIMEOUT_MS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "upsert_timeout"));
    }

    #[test]
    fn test_invalid_bool_rejected() {
        assert!(ServiceConfig::from_lookup(lookup(&[("ORDER_ACK_ON_FAILURE", "maybe")])).is_err());
    }
}
