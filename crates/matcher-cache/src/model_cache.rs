use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use matcher_core::config::CacheSettings;
use matcher_core::traits::CacheStore;
use matcher_core::Result;
use matcher_text::ModelArtifact;

/// How `get_or_train` obtained its artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    /// Trained on a miss and written back.
    Trained,
    /// Trained in-process; the store could not be read or written.
    TrainedUncached,
}

#[derive(Debug, Clone)]
pub struct Loaded {
    pub artifact: Arc<ModelArtifact>,
    pub outcome: CacheOutcome,
    /// Store failure met on the way, if any.
    pub cache_warning: Option<String>,
}

impl Loaded {
    pub fn cache_hit(&self) -> bool { self.outcome == CacheOutcome::Hit }
}

/// The trained artifact under one fixed key.
///
/// No locking: concurrent misses may each train and `put`; last writer wins.
#[derive(Clone)]
pub struct ModelCache {
    store: Arc<dyn CacheStore>,
    key: String,
    ttl: Duration,
}

impl ModelCache {
    pub fn new(store: Arc<dyn CacheStore>, key: impl Into<String>, ttl: Duration) -> Self {
        Self { store, key: key.into(), ttl }
    }

    pub fn from_settings(store: Arc<dyn CacheStore>, settings: &CacheSettings) -> Self {
        Self::new(store, settings.key.clone(), Duration::from_secs(settings.ttl_secs))
    }

    pub fn key(&self) -> &str { &self.key }

    pub fn ttl(&self) -> Duration { self.ttl }

    /// `Ok(None)` on a miss. A payload that no longer decodes counts as a miss.
    pub fn get(&self) -> Result<Option<ModelArtifact>> {
        let Some(bytes) = self.store.get(&self.key)? else {
            debug!(key = %self.key, "model cache miss");
            return Ok(None);
        };
        match ModelArtifact::from_bytes(&bytes) {
            Ok(artifact) => {
                debug!(key = %self.key, corpus_size = artifact.corpus_size, "model cache hit");
                Ok(Some(artifact))
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "cached model is unreadable; treating as miss");
                Ok(None)
            }
        }
    }

    pub fn put(&self, artifact: &ModelArtifact) -> Result<()> {
        let bytes = artifact.to_bytes()?;
        self.store.put(&self.key, &bytes, self.ttl)?;
        info!(key = %self.key, ttl_secs = self.ttl.as_secs(), bytes = bytes.len(), "model cached");
        Ok(())
    }

    pub fn invalidate(&self) -> Result<()> {
        self.store.invalidate(&self.key)?;
        info!(key = %self.key, "model cache invalidated");
        Ok(())
    }

    pub fn exists(&self) -> Result<bool> { self.store.exists(&self.key) }

    /// Return the cached artifact, or run `train` and cache its result.
    ///
    /// An unreachable store never fails the call: the artifact is trained
    /// in-process and no write is attempted. Training errors propagate.
    pub fn get_or_train<F>(&self, train: F) -> Result<Loaded>
    where
        F: FnOnce() -> Result<ModelArtifact>,
    {
        match self.get() {
            Ok(Some(artifact)) => {
                Ok(Loaded { artifact: Arc::new(artifact), outcome: CacheOutcome::Hit, cache_warning: None })
            }
            Ok(None) => {
                let artifact = train()?;
                let (outcome, cache_warning) = match self.put(&artifact) {
                    Ok(()) => (CacheOutcome::Trained, None),
                    Err(e) => {
                        warn!(key = %self.key, error = %e, "failed to cache trained model");
                        (CacheOutcome::TrainedUncached, Some(e.to_string()))
                    }
                };
                Ok(Loaded { artifact: Arc::new(artifact), outcome, cache_warning })
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "model cache unreachable; training in-process");
                let artifact = train()?;
                Ok(Loaded {
                    artifact: Arc::new(artifact),
                    outcome: CacheOutcome::TrainedUncached,
                    cache_warning: Some(e.to_string()),
                })
            }
        }
    }
}
