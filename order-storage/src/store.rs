//! Persistence trait for order aggregates.

use async_trait::async_trait;
use order_core::{Order, OrderMap, StorageError};

/// Durable store for order aggregates.
///
/// An aggregate is written and read as one relational unit: the order row,
/// its delivery row, its payment row and its item rows.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert or fully replace one aggregate atomically.
    ///
    /// Either every row reflects `order` afterwards or nothing changed.
    /// Items are replaced as a set, never merged with earlier items.
    async fn upsert(&self, order: &Order) -> Result<(), StorageError>;

    /// Reconstruct every stored aggregate, keyed by `order_uid`.
    ///
    /// A failure to read delivery, payment or items leaves that part at its
    /// zero value instead of failing the whole load.
    async fn load_all(&self) -> Result<OrderMap, StorageError>;
}
