//! Order Core - Entity Types
//!
//! Pure data structures shared by every other crate in the workspace:
//! the order aggregate, the error taxonomy, and the ingest policy.
//! This crate performs no I/O.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

pub mod config;
pub mod entities;
pub mod error;

pub use config::{IngestConfig, DEFAULT_UPSERT_TIMEOUT};
pub use entities::{Delivery, Item, Order, Payment};
pub use error::{
    ChannelError, ConfigError, OrderError, OrderResult, StorageError, UpsertStage,
    ValidationError,
};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Order identifier (`order_uid`). The sole join key across all entity tables.
pub type OrderId = String;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Full population of order aggregates keyed by identifier.
pub type OrderMap = HashMap<OrderId, Order>;
