//! Order Storage
//!
//! The in-memory order cache, the `OrderStore` persistence trait, and the two
//! read-side operations built on them: the cache-aside [`ReadService`] and the
//! startup [`warm_up`].
//!
//! ```text
//! write: consumer -> OrderStore::upsert -> OrderCache::set
//! read:  handler  -> OrderCache::get [miss -> OrderStore::load_all -> OrderCache::load_all -> OrderCache::get]
//! start: warm_up  -> OrderStore::load_all -> OrderCache::load_all
//! ```

pub mod cache;
pub mod memory;
pub mod read_service;
pub mod store;
pub mod warmup;

pub use cache::OrderCache;
pub use memory::InMemoryOrderStore;
pub use read_service::{LookupOutcome, ReadService};
pub use store::OrderStore;
pub use warmup::warm_up;
