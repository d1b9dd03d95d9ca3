//! Startup cache warm-up.

use crate::{OrderCache, OrderStore};
use order_core::StorageError;
use std::time::Instant;
use tracing::{error, info};

/// Load every stored aggregate into the cache once.
///
/// Returns the number of aggregates loaded. The caller decides whether a
/// failure matters; the process can serve traffic with a cold cache because
/// the read path reloads on miss.
pub async fn warm_up(store: &dyn OrderStore, cache: &OrderCache) -> Result<usize, StorageError> {
    let start = Instant::now();
    match store.load_all().await {
        Ok(loaded) => {
            let count = loaded.len();
            cache.load_all(loaded);
            info!(
                loaded = count,
                cached = cache.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "cache warm-up complete"
            );
            Ok(count)
        }
        Err(e) => {
            error!(error = %e, "cache warm-up failed");
            Err(e)
        }
    }
}
