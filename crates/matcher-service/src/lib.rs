//! matcher-service
//!
//! Composition root: validates requests, picks the strategy, gets or trains
//! the model through the cache, ranks, presents, and logs. Also owns the
//! training command, the bio-change hook and the health report.
pub mod assign;
pub mod health;
pub mod service;

pub use assign::{Assignment, StrategyAssigner};
pub use health::{CacheStatus, HealthReport, HealthReporter, HealthStatus};
pub use service::{RecommendationService, SmokeResult, TrainOutcome, TrainingMetrics};
