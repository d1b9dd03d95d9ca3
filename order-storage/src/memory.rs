//! In-memory order store for tests and local runs.
//!
//! Keeps whole aggregates in a map, so an upsert is trivially atomic.
//! Failure injection and call accounting let tests drive the error paths of
//! the consumer and the read service without a database.

use crate::OrderStore;
use async_trait::async_trait;
use order_core::{Order, OrderId, OrderMap, StorageError, UpsertStage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Map-backed [`OrderStore`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<Mutex<HashMap<OrderId, Order>>>,
    fail_upserts: Arc<AtomicBool>,
    fail_loads: Arc<AtomicBool>,
    upsert_delay: Arc<Mutex<Option<Duration>>>,
    upsert_calls: Arc<AtomicUsize>,
    load_calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the given aggregates.
    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let store = Self::new();
        {
            let mut map = store.orders();
            for order in orders {
                map.insert(order.order_uid.clone(), order);
            }
        }
        store
    }

    /// Make every subsequent upsert fail at the order stage.
    pub fn set_fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `load_all` fail.
    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Sleep this long inside every upsert before writing.
    pub fn set_upsert_delay(&self, delay: Option<Duration>) {
        *self
            .upsert_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = delay;
    }

    pub fn get(&self, id: &str) -> Option<Order> {
        self.orders().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.orders().len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders().is_empty()
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    /// Highest number of upserts ever observed running at once.
    pub fn max_concurrent_upserts(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn orders(&self) -> MutexGuard<'_, HashMap<OrderId, Order>> {
        self.orders.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Decrements the in-flight counter even when the upsert future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn upsert(&self, order: &Order) -> Result<(), StorageError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let delay = *self
            .upsert_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(StorageError::UpsertFailed {
                order_uid: order.order_uid.clone(),
                stage: UpsertStage::Order,
                reason: "injected failure".to_string(),
            });
        }

        self.orders()
            .insert(order.order_uid.clone(), order.clone());
        Ok(())
    }

    async fn load_all(&self) -> Result<OrderMap, StorageError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(StorageError::LoadFailed {
                reason: "injected failure".to_string(),
            });
        }
        Ok(self.orders().clone())
    }
}
