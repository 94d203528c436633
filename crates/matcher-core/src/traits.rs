use std::time::Duration;

use crate::error::Result;
use crate::types::WorkerDocument;

/// Read-only view over the external worker profile store.
pub trait CorpusSource: Send + Sync {
    fn load_workers(&self) -> Result<Vec<WorkerDocument>>;
}

/// Generic shared key-value store with TTL support.
///
/// Backends report connectivity problems as `Error::CacheUnavailable`; a
/// missing or expired key is `Ok(None)` / `Ok(false)`, never an error.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;
    fn invalidate(&self, key: &str) -> Result<()>;
    fn exists(&self, key: &str) -> Result<bool>;
}
