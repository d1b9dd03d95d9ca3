//! Ingestion Consumer Background Task
//!
//! Pulls order messages from a durable subscription and applies each one to
//! the store and then the cache:
//!
//! ```text
//! received -> decoded -> persisted -> cached -> acknowledged
//! ```
//!
//! Messages are handled strictly one at a time. Message N is settled before
//! message N+1 is pulled, so store writes for one subscription never overlap.
//! A message that fails to decode or persist is dropped: it is acknowledged
//! when [`IngestConfig::ack_on_failure`] is set and negatively acknowledged
//! otherwise. Nothing is retried here.

use crate::telemetry::with_metrics;
use order_core::{IngestConfig, Order, StorageError};
use order_events::{Delivery, Subscription};
use order_storage::{OrderCache, OrderStore};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};

// ============================================================================
// METRICS
// ============================================================================

/// Counters for the consumer's lifetime.
#[derive(Debug, Default)]
pub struct IngestMetrics {
    /// Messages pulled from the subscription
    pub received: AtomicU64,

    /// Messages stored, cached and acknowledged
    pub processed: AtomicU64,

    /// Messages dropped because the payload did not decode
    pub decode_failed: AtomicU64,

    /// Messages dropped because the upsert failed or timed out
    pub store_failed: AtomicU64,

    /// Acknowledgments (positive or negative) the channel rejected
    pub ack_failed: AtomicU64,

    /// Messages handed back to the channel for redelivery
    pub nacked: AtomicU64,

    /// Errors returned by the subscription itself
    pub receive_failed: AtomicU64,

    /// Set while the consumer loop is pulling messages
    running: AtomicBool,
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the consumer loop is currently active.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Get current snapshot of all counters.
    pub fn snapshot(&self) -> IngestSnapshot {
        IngestSnapshot {
            received: self.received.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            decode_failed: self.decode_failed.load(Ordering::Relaxed),
            store_failed: self.store_failed.load(Ordering::Relaxed),
            ack_failed: self.ack_failed.load(Ordering::Relaxed),
            nacked: self.nacked.load(Ordering::Relaxed),
            receive_failed: self.receive_failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of consumer counters at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSnapshot {
    pub received: u64,
    pub processed: u64,
    pub decode_failed: u64,
    pub store_failed: u64,
    pub ack_failed: u64,
    pub nacked: u64,
    pub receive_failed: u64,
}

// ============================================================================
// PER-MESSAGE PROCESSING
// ============================================================================

/// What happened to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Stored and cached.
    Processed { order_uid: String },
    /// Payload rejected before touching the store.
    DecodeFailed,
    /// Upsert failed or ran out of time. The cache was not touched.
    StoreFailed { order_uid: String, error: StorageError },
}

impl IngestOutcome {
    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            IngestOutcome::Processed { .. } => "processed",
            IngestOutcome::DecodeFailed => "decode_failed",
            IngestOutcome::StoreFailed { .. } => "store_failed",
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self, IngestOutcome::Processed { .. })
    }
}

/// Decode, persist, cache and settle one delivery.
///
/// Never fails: every error is logged, counted and turned into an outcome.
pub async fn process_delivery<D: Delivery>(
    delivery: &D,
    store: &dyn OrderStore,
    cache: &OrderCache,
    config: &IngestConfig,
    metrics: &IngestMetrics,
) -> IngestOutcome {
    let sequence = delivery.sequence();
    let span = info_span!("ingest", sequence);

    async move {
        let outcome = match Order::from_json(delivery.payload()) {
            Err(e) => {
                warn!(error = %e, bytes = delivery.payload().len(), "dropping undecodable message");
                metrics.decode_failed.fetch_add(1, Ordering::Relaxed);
                IngestOutcome::DecodeFailed
            }
            Ok(order) => persist(order, store, cache, config, metrics).await,
        };

        with_metrics(|m| m.record_ingest(outcome.label()));

        if outcome.is_processed() || config.ack_on_failure {
            if let Err(e) = delivery.ack().await {
                error!(error = %e, "acknowledgment failed");
                metrics.ack_failed.fetch_add(1, Ordering::Relaxed);
                with_metrics(|m| m.record_ingest("ack_failed"));
            }
        } else {
            match delivery.nak().await {
                Ok(()) => {
                    metrics.nacked.fetch_add(1, Ordering::Relaxed);
                    debug!("message returned for redelivery");
                }
                Err(e) => {
                    error!(error = %e, "negative acknowledgment failed");
                    metrics.ack_failed.fetch_add(1, Ordering::Relaxed);
                    with_metrics(|m| m.record_ingest("ack_failed"));
                }
            }
        }

        outcome
    }
    .instrument(span)
    .await
}

async fn persist(
    order: Order,
    store: &dyn OrderStore,
    cache: &OrderCache,
    config: &IngestConfig,
    metrics: &IngestMetrics,
) -> IngestOutcome {
    let order_uid = order.order_uid.clone();

    let result = match tokio::time::timeout(config.upsert_timeout, store.upsert(&order)).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::Timeout {
            operation: "upsert".to_string(),
            after: config.upsert_timeout,
        }),
    };

    match result {
        Ok(()) => {
            let items = order.items.len();
            cache.set(order_uid.clone(), order);
            with_metrics(|m| m.set_cache_entries(cache.len()));
            metrics.processed.fetch_add(1, Ordering::Relaxed);
            info!(order_uid = %order_uid, items, "order ingested");
            IngestOutcome::Processed { order_uid }
        }
        Err(e) => {
            error!(
                order_uid = %order_uid,
                stage = e.stage().map(|s| s.as_str()).unwrap_or("none"),
                error = %e,
                "order persistence failed"
            );
            metrics.store_failed.fetch_add(1, Ordering::Relaxed);
            IngestOutcome::StoreFailed {
                order_uid,
                error: e,
            }
        }
    }
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Consume `subscription` until shutdown or until the channel ends.
///
/// The shutdown signal is only observed between messages: a message that
/// has been pulled is always carried through to settlement.
///
/// # Example
///
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let metrics = Arc::new(IngestMetrics::new());
/// let handle = tokio::spawn(ingest_task(
///     subscription, store, cache, config, Arc::clone(&metrics), shutdown_rx,
/// ));
///
/// // Later, trigger shutdown
/// let _ = shutdown_tx.send(true);
/// handle.await?;
/// ```
pub async fn ingest_task<S: Subscription>(
    mut subscription: S,
    store: Arc<dyn OrderStore>,
    cache: Arc<OrderCache>,
    config: IngestConfig,
    metrics: Arc<IngestMetrics>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<IngestMetrics> {
    metrics.running.store(true, Ordering::Release);

    tracing::info!(
        upsert_timeout_ms = config.upsert_timeout.as_millis() as u64,
        ack_on_failure = config.ack_on_failure,
        "Ingestion consumer started"
    );

    loop {
        if *shutdown_rx.borrow() {
            tracing::info!("Ingestion consumer shutting down");
            break;
        }

        let next = tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Ingestion consumer shutting down");
                    break;
                }
                continue;
            }

            next = subscription.next() => next,
        };

        match next {
            None => {
                tracing::info!("Subscription ended");
                break;
            }
            Some(Err(e)) => {
                metrics.receive_failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "receive failed");
            }
            Some(Ok(delivery)) => {
                metrics.received.fetch_add(1, Ordering::Relaxed);
                process_delivery(&delivery, store.as_ref(), &cache, &config, &metrics).await;
            }
        }
    }

    metrics.running.store(false, Ordering::Release);

    let snapshot = metrics.snapshot();
    tracing::info!(
        received = snapshot.received,
        processed = snapshot.processed,
        decode_failed = snapshot.decode_failed,
        store_failed = snapshot.store_failed,
        ack_failed = snapshot.ack_failed,
        nacked = snapshot.nacked,
        "Ingestion consumer completed"
    );

    metrics
}
