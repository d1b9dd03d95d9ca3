//! Ingestion policy configuration

use crate::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time budget for a single store upsert during ingestion.
pub const DEFAULT_UPSERT_TIMEOUT: Duration = Duration::from_secs(5);

/// Policy applied by the ingestion consumer to every message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Upper bound on one `upsert` call. Exceeding it counts as a store failure.
    pub upsert_timeout: Duration,
    /// Acknowledge messages that failed to decode or persist.
    /// When false they are negatively acknowledged for redelivery.
    pub ack_on_failure: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            upsert_timeout: DEFAULT_UPSERT_TIMEOUT,
            ack_on_failure: true,
        }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> OrderResult<()> {
        if self.upsert_timeout.is_zero() {
            return Err(OrderError::Config(ConfigError::InvalidValue {
                field: "upsert_timeout".to_string(),
                value: format!("{:?}", self.upsert_timeout),
                reason: "upsert_timeout must be greater than 0".to_string(),
            }));
        }
        Ok(())
    }

    pub fn with_upsert_timeout(mut self, timeout: Duration) -> Self {
        self.upsert_timeout = timeout;
        self
    }

    pub fn with_ack_on_failure(mut self, ack: bool) -> Self {
        self.ack_on_failure = ack;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IngestConfig::default();
        assert_eq!(config.upsert_timeout, Duration::from_secs(5));
        assert!(config.ack_on_failure);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = IngestConfig::default().with_upsert_timeout(Duration::ZERO);
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            OrderError::Config(ConfigError::InvalidValue { ref field, .. }) if field == "upsert_timeout"
        ));
    }
}
