//! Model / cache / error-rate status for the health endpoint.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use matcher_analytics::{EventLevel, QueryLogStore};
use matcher_cache::ModelCache;
use matcher_core::config::HealthSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    NotTrained,
    Unhealthy,
    Degraded,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub model_trained: bool,
    pub corpus_size: usize,
    pub vocabulary_size: usize,
    pub last_trained_at: Option<DateTime<Utc>>,
    pub cache_status: CacheStatus,
    pub avg_response_time_ms: Option<f64>,
    pub recent_errors_count: u64,
    pub warnings: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    /// Only `unhealthy` maps to a failing outer result.
    pub fn is_success(&self) -> bool { self.status != HealthStatus::Unhealthy }
}

pub struct HealthReporter {
    cache: ModelCache,
    log: Arc<QueryLogStore>,
    settings: HealthSettings,
}

impl HealthReporter {
    pub fn new(cache: ModelCache, log: Arc<QueryLogStore>, settings: HealthSettings) -> Self {
        Self { cache, log, settings }
    }

    pub fn report(&self) -> HealthReport {
        let now = Utc::now();
        let window_start = now - Duration::minutes(self.settings.error_window_minutes);
        let mut warnings = Vec::new();
        // Cache trouble or slow responses; log-store read failures only warn.
        let mut degraded = false;

        let latest = self.log.latest_training().unwrap_or_else(|e| {
            warn!(error = %e, "failed to read training records");
            None
        });

        let (cached, cache_status) = match self.cache.exists() {
            Ok(present) => (present, CacheStatus::Connected),
            Err(e) => {
                warnings.push(format!("cache store unreachable: {e}"));
                degraded = true;
                (false, CacheStatus::Disconnected)
            }
        };
        let model_trained = match cache_status {
            CacheStatus::Connected => cached,
            CacheStatus::Disconnected => latest.is_some(),
        };

        let (mut corpus_size, mut vocabulary_size, mut last_trained_at) = latest
            .as_ref()
            .map(|t| (t.corpus_size, t.vocabulary_size, Some(t.trained_at)))
            .unwrap_or((0, 0, None));
        if cached && latest.is_none() {
            if let Ok(Some(artifact)) = self.cache.get() {
                corpus_size = artifact.corpus_size;
                vocabulary_size = artifact.vocabulary_size;
                last_trained_at = Some(artifact.trained_at);
            }
        }

        let count = |level: EventLevel| {
            self.log.count_events_since(level, window_start).unwrap_or_else(|e| {
                warn!(error = %e, "failed to count engine events");
                0
            })
        };
        let recent_errors_count = count(EventLevel::Error);
        let recent_warnings = count(EventLevel::Warning);
        if recent_warnings > 0 {
            warnings.push(format!(
                "{recent_warnings} cache warning(s) in the last {} minutes",
                self.settings.error_window_minutes
            ));
            degraded = true;
        }

        let avg_response_time_ms = self.log.recent_avg_response_ms(self.settings.recent_sample).unwrap_or_else(|e| {
            warn!(error = %e, "failed to read recent latency");
            None
        });
        if let Some(avg) = avg_response_time_ms.filter(|avg| *avg > self.settings.slow_response_ms) {
            warnings.push(format!(
                "average response time {avg:.1}ms exceeds {:.0}ms",
                self.settings.slow_response_ms
            ));
            degraded = true;
        }

        if model_trained && corpus_size > 0 && corpus_size < self.settings.small_corpus {
            warnings.push(format!("corpus has only {corpus_size} workers"));
        }
        match self.log.last_query_at() {
            Ok(Some(at)) if at >= now - Duration::hours(24) => {}
            Ok(_) => warnings.push("no queries in the last 24h".to_string()),
            Err(e) => warn!(error = %e, "failed to read last query time"),
        }

        let status = if !model_trained {
            HealthStatus::NotTrained
        } else if recent_errors_count > self.settings.critical_error_threshold {
            HealthStatus::Unhealthy
        } else if degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Ready
        };

        HealthReport {
            status,
            model_trained,
            corpus_size,
            vocabulary_size,
            last_trained_at,
            cache_status,
            avg_response_time_ms,
            recent_errors_count,
            warnings,
            checked_at: now,
        }
    }
}
