//! Property-Based Tests for the Order Cache and Read Path
//!
//! **Property: Merge semantics**
//! Bulk loading a mapping overwrites exactly the keys it contains and leaves
//! every other key untouched.
//!
//! **Property: Cache-aside miss recovery**
//! Any order present in the store is returned by the read service even when
//! the cache starts cold.

use order_core::OrderMap;
use order_storage::{InMemoryOrderStore, LookupOutcome, OrderCache, OrderStore, ReadService};
use order_test_utils::generators::{arb_order, arb_order_uid};
use proptest::prelude::*;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn to_map(orders: Vec<order_core::Order>) -> OrderMap {
    orders
        .into_iter()
        .map(|order| (order.order_uid.clone(), order))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_load_all_overwrites_only_given_keys(
        existing in prop::collection::vec(arb_order(), 0..8),
        incoming in prop::collection::vec(arb_order(), 0..8),
    ) {
        let cache = OrderCache::new();
        let existing = to_map(existing);
        let incoming = to_map(incoming);
        cache.load_all(existing.clone());
        cache.load_all(incoming.clone());

        for (id, order) in &incoming {
            let cached = cache.get(id);
            prop_assert_eq!(cached.as_deref(), Some(order));
        }
        for (id, order) in existing.iter().filter(|(id, _)| !incoming.contains_key(*id)) {
            let cached = cache.get(id);
            prop_assert_eq!(cached.as_deref(), Some(order));
        }

        let expected_len = existing
            .keys()
            .chain(incoming.keys())
            .collect::<std::collections::HashSet<_>>()
            .len();
        prop_assert_eq!(cache.len(), expected_len);
    }

    #[test]
    fn prop_last_set_wins(uid in arb_order_uid(), versions in prop::collection::vec(arb_order(), 1..6)) {
        let cache = OrderCache::new();
        let mut last = None;
        for mut order in versions {
            order.order_uid = uid.clone();
            cache.set(uid.clone(), order.clone());
            last = Some(order);
        }
        let cached = cache.get(&uid);
        prop_assert_eq!(cached.as_deref(), last.as_ref());
    }

    #[test]
    fn prop_cold_cache_recovers_every_stored_order(
        stored in prop::collection::vec(arb_order(), 1..8),
        missing in arb_order_uid(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let stored = to_map(stored);
            let store = InMemoryOrderStore::new();
            for order in stored.values() {
                store
                    .upsert(order)
                    .await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
            }

            let svc = ReadService::new(Arc::new(OrderCache::new()), Arc::new(store.clone()));
            for (id, order) in &stored {
                let found = svc.get_order(id).await;
                prop_assert_eq!(found.as_deref(), Some(order));
            }
            // One reload warmed the whole cache.
            prop_assert_eq!(store.load_calls(), 1);

            if !stored.contains_key(&missing) {
                prop_assert!(matches!(svc.lookup(&missing).await, LookupOutcome::Absent));
            }
            Ok(())
        })?;
    }
}
