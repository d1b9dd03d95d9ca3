//! Cache-aside read path.

use crate::{OrderCache, OrderStore};
use order_core::{Order, StorageError};
use std::sync::Arc;
use tracing::{debug, error};

/// How a lookup was resolved.
#[derive(Debug, Clone)]
pub enum LookupOutcome {
    /// Served straight from the cache.
    Hit(Arc<Order>),
    /// Found after a full reload from the store.
    Reloaded(Arc<Order>),
    /// Not in the cache and not in the store.
    Absent,
    /// Not in the cache and the reload failed.
    ReloadFailed(StorageError),
}

impl LookupOutcome {
    pub fn into_order(self) -> Option<Arc<Order>> {
        match self {
            LookupOutcome::Hit(order) | LookupOutcome::Reloaded(order) => Some(order),
            LookupOutcome::Absent | LookupOutcome::ReloadFailed(_) => None,
        }
    }

    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            LookupOutcome::Hit(_) => "hit",
            LookupOutcome::Reloaded(_) => "reloaded",
            LookupOutcome::Absent => "absent",
            LookupOutcome::ReloadFailed(_) => "reload_failed",
        }
    }
}

/// Point lookups by `order_uid` with a full store reload on cache miss.
///
/// A miss triggers exactly one `load_all`, merges the result into the cache
/// and re-checks once. Concurrent misses each reload independently; the
/// merge is idempotent so the cache converges either way.
#[derive(Clone)]
pub struct ReadService {
    cache: Arc<OrderCache>,
    store: Arc<dyn OrderStore>,
}

impl ReadService {
    pub fn new(cache: Arc<OrderCache>, store: Arc<dyn OrderStore>) -> Self {
        Self { cache, store }
    }

    pub fn cache(&self) -> &Arc<OrderCache> {
        &self.cache
    }

    pub async fn lookup(&self, id: &str) -> LookupOutcome {
        if let Some(order) = self.cache.get(id) {
            return LookupOutcome::Hit(order);
        }

        debug!(order_uid = %id, "cache miss, reloading from store");
        let loaded = match self.store.load_all().await {
            Ok(loaded) => loaded,
            Err(e) => {
                error!(order_uid = %id, error = %e, "lookup failed");
                return LookupOutcome::ReloadFailed(e);
            }
        };

        let count = loaded.len();
        self.cache.load_all(loaded);

        match self.cache.get(id) {
            Some(order) => LookupOutcome::Reloaded(order),
            None => {
                debug!(order_uid = %id, loaded = count, "order not found");
                LookupOutcome::Absent
            }
        }
    }

    /// Current aggregate for `id`, or `None` when absent or unreadable.
    pub async fn get_order(&self, id: &str) -> Option<Arc<Order>> {
        self.lookup(id).await.into_order()
    }
}
