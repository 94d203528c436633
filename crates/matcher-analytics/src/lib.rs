//! matcher-analytics
//!
//! SQLite-backed query log: one row per served search, later engagement
//! updates (click, hire), aggregate metrics, plus the engine event and
//! model training tables the health report reads from.
pub mod store;
pub mod summary;
pub mod types;

pub use store::QueryLogStore;
pub use summary::{AnalyticsSummary, DateRange, StrategyStats, TermCount};
pub use types::{EventLevel, NewQueryLog, QueryLogEntry, TrainingRecord};
