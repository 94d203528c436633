//! matcher-cache
//!
//! `CacheStore` backends (process memory, SQLite file) and the `ModelCache`
//! that keeps the trained artifact under one fixed key with a TTL.
pub mod memory;
pub mod model_cache;
pub mod sqlite;

use std::sync::Arc;

use matcher_core::config::{CacheBackend, CacheSettings};
use matcher_core::traits::CacheStore;
use matcher_core::Result;

pub use memory::MemoryStore;
pub use model_cache::{CacheOutcome, Loaded, ModelCache};
pub use sqlite::SqliteStore;

/// Build the configured store. `cache_db` is only used by the SQLite backend.
pub fn open_store(settings: &CacheSettings, cache_db: &std::path::Path) -> Result<Arc<dyn CacheStore>> {
    Ok(match settings.backend {
        CacheBackend::Memory => Arc::new(MemoryStore::new()),
        CacheBackend::Sqlite => Arc::new(SqliteStore::open(cache_db)?),
    })
}
