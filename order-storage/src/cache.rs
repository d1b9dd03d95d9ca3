//! Concurrent order cache.
//!
//! Maps `order_uid` to a shared, immutable order aggregate. Entries are
//! replaced by pointer swap under a short write lock and never mutated in
//! place, so a reader holding an `Arc<Order>` always sees one complete
//! aggregate. No lock is held across an `.await`.

use order_core::{Order, OrderId, OrderMap};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Unbounded order cache with multiple-reader/single-writer access.
#[derive(Debug, Default)]
pub struct OrderCache {
    entries: RwLock<HashMap<OrderId, Arc<Order>>>,
}

impl OrderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value for `id`, if any.
    pub fn get(&self, id: &str) -> Option<Arc<Order>> {
        self.read().get(id).cloned()
    }

    /// Unconditional overwrite. Last writer wins.
    pub fn set(&self, id: impl Into<OrderId>, order: Order) {
        self.set_shared(id, Arc::new(order));
    }

    /// Overwrite with an already shared aggregate.
    pub fn set_shared(&self, id: impl Into<OrderId>, order: Arc<Order>) {
        self.write().insert(id.into(), order);
    }

    /// Merge a full mapping into the cache.
    ///
    /// Keys present in `entries` are overwritten; every other key is left
    /// untouched. Aggregates are wrapped before the write lock is taken.
    pub fn load_all(&self, entries: OrderMap) {
        let prepared: Vec<(OrderId, Arc<Order>)> = entries
            .into_iter()
            .map(|(id, order)| (id, Arc::new(order)))
            .collect();

        let mut guard = self.write();
        guard.reserve(prepared.len());
        guard.extend(prepared);
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panicking writer can only have completed or skipped a single insert,
    // so the map is still consistent and the poison flag is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<OrderId, Arc<Order>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<OrderId, Arc<Order>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use order_test_utils::fixtures::{sample_item, sample_order};

    #[test]
    fn test_get_missing_returns_none() {
        let cache = OrderCache::new();
        assert!(cache.get("nope").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_set_overwrites_wholesale() {
        let cache = OrderCache::new();
        let mut first = sample_order("o1");
        first.items = vec![sample_item(1), sample_item(2)];
        cache.set("o1", first);

        let mut second = sample_order("o1");
        second.items.clear();
        second.track_number = "NEW".to_string();
        cache.set("o1", second.clone());

        let got = cache.get("o1").expect("entry present");
        assert_eq!(*got, second);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_reader_keeps_old_snapshot_after_overwrite() {
        let cache = OrderCache::new();
        cache.set("o1", sample_order("o1"));
        let before = cache.get("o1").expect("entry present");

        let mut updated = sample_order("o1");
        updated.items.clear();
        cache.set("o1", updated);

        assert_eq!(before.items.len(), 1);
        assert!(cache.get("o1").expect("entry present").items.is_empty());
    }

    #[test]
    fn test_load_all_merges_without_removing() {
        let cache = OrderCache::new();
        cache.set("keep", sample_order("keep"));
        cache.set("replace", sample_order("replace"));

        let mut replacement = sample_order("replace");
        replacement.locale = "ru".to_string();
        let mut batch = OrderMap::new();
        batch.insert("replace".to_string(), replacement);
        batch.insert("new".to_string(), sample_order("new"));
        cache.load_all(batch);

        assert_eq!(cache.len(), 3);
        assert!(cache.get("keep").is_some());
        assert_eq!(cache.get("replace").expect("entry").locale, "ru");
        assert!(cache.get("new").is_some());
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let cache = Arc::new(OrderCache::new());
        cache.set("o1", sample_order("o1"));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for n in 0..200 {
                        if i == 0 {
                            let mut order = sample_order("o1");
                            order.sm_id = n;
                            cache.set("o1", order);
                        } else {
                            let got = cache.get("o1").expect("entry never disappears");
                            assert_eq!(got.order_uid, "o1");
                            assert_eq!(got.items.len(), 1);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("thread panicked");
        }
        assert_eq!(cache.get("o1").expect("entry").sm_id, 199);
    }
}
