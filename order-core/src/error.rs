//! Error types for order pipeline operations

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Step of the upsert transaction that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpsertStage {
    Begin,
    Order,
    Delivery,
    Payment,
    ClearItems,
    InsertItems,
    Commit,
}

impl UpsertStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsertStage::Begin => "begin",
            UpsertStage::Order => "order",
            UpsertStage::Delivery => "delivery",
            UpsertStage::Payment => "payment",
            UpsertStage::ClearItems => "clear_items",
            UpsertStage::InsertItems => "insert_items",
            UpsertStage::Commit => "commit",
        }
    }
}

impl fmt::Display for UpsertStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Upsert failed for order {order_uid} at stage {stage}: {reason}")]
    UpsertFailed {
        order_uid: String,
        stage: UpsertStage,
        reason: String,
    },

    #[error("Load failed: {reason}")]
    LoadFailed { reason: String },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: String,
        after: Duration,
    },

    #[error("Connection pool unavailable: {reason}")]
    PoolUnavailable { reason: String },

    #[error("Schema setup failed: {reason}")]
    SchemaFailed { reason: String },
}

impl StorageError {
    /// Stage label for logging, when the error came out of an upsert.
    pub fn stage(&self) -> Option<UpsertStage> {
        match self {
            StorageError::UpsertFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Inbound payload validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Malformed payload: {reason}")]
    MalformedPayload { reason: String },

    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },
}

/// Durable channel errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Connection to {url} failed: {reason}")]
    ConnectFailed { url: String, reason: String },

    #[error("Subscription {durable} failed: {reason}")]
    SubscribeFailed { durable: String, reason: String },

    #[error("Receive failed: {reason}")]
    ReceiveFailed { reason: String },

    #[error("Acknowledgment failed for sequence {sequence}: {reason}")]
    AckFailed { sequence: u64, reason: String },

    #[error("Publish to {subject} failed: {reason}")]
    PublishFailed { subject: String, reason: String },

    #[error("Channel closed")]
    Closed,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for the order pipeline.
#[derive(Debug, Clone, Error)]
pub enum OrderError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for order pipeline operations.
pub type OrderResult<T> = Result<T, OrderError>;

// =============================================================================
// TESTS
// =============================================================================
