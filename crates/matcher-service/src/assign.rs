use std::hash::Hasher;

use serde::{Deserialize, Serialize};
use twox_hash::XxHash64;

use matcher_core::config::ExperimentSettings;
use matcher_core::{Error, Result, SearchRequest, Strategy};

pub const DEFAULT_STRATEGY: Strategy = Strategy::Tfidf;

/// Where the strategy for a request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Assignment {
    Requested,
    Experiment,
    Default,
}

/// Deterministic A/B bucketing for requests that leave `strategy` unset.
#[derive(Debug, Clone, Default)]
pub struct StrategyAssigner {
    enabled: bool,
    buckets: Vec<(Strategy, u32)>,
}

impl StrategyAssigner {
    pub fn from_settings(settings: &ExperimentSettings) -> Result<Self> {
        let mut buckets = Vec::new();
        for (name, weight) in &settings.weights {
            let strategy: Strategy = name.parse().map_err(|_| Error::InvalidConfig(format!("unknown strategy '{name}'")))?;
            if *weight > 0 {
                buckets.push((strategy, *weight));
            }
        }
        buckets.sort_by_key(|(s, _)| *s);
        Ok(Self { enabled: settings.enabled && !buckets.is_empty(), buckets })
    }

    pub fn resolve(&self, request: &SearchRequest) -> (Strategy, Assignment) {
        if let Some(strategy) = request.strategy {
            return (strategy, Assignment::Requested);
        }
        if !self.enabled {
            return (DEFAULT_STRATEGY, Assignment::Default);
        }
        let key = request.requester_id.as_deref().unwrap_or(&request.query_text);
        (self.bucket(key), Assignment::Experiment)
    }

    fn bucket(&self, key: &str) -> Strategy {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(key.as_bytes());
        let total: u64 = self.buckets.iter().map(|(_, w)| u64::from(*w)).sum();
        let mut slot = hasher.finish() % total.max(1);
        for (strategy, weight) in &self.buckets {
            if slot < u64::from(*weight) {
                return *strategy;
            }
            slot -= u64::from(*weight);
        }
        DEFAULT_STRATEGY
    }
}
