use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use matcher_core::traits::CacheStore;
use matcher_core::{Error, Result};

/// Process-local store. Entries expire lazily on read.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, (Vec<u8>, Instant)>>> {
        self.entries.lock().map_err(|_| Error::CacheUnavailable("memory store lock poisoned".into()))
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| Error::CacheUnavailable(format!("ttl {ttl:?} out of range")))?;
        self.lock()?.insert(key.to_string(), (value.to_vec(), expires_at));
        Ok(())
    }

    fn invalidate(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.get(key).is_some_and(|(_, expires_at)| *expires_at > Instant::now()))
    }
}
