use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use matcher_core::{Strategy, WorkerId};

/// What the service knows about a search at completion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQueryLog {
    pub query_text: String,
    pub processed_query: String,
    pub strategy: Strategy,
    pub result_worker_ids: Vec<WorkerId>,
    pub performance_ms: f64,
    pub cache_hit: bool,
    pub requester_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryLogEntry {
    pub id: String,
    pub query_text: String,
    pub processed_query: String,
    pub strategy: Strategy,
    pub result_worker_ids: Vec<WorkerId>,
    pub performance_ms: f64,
    pub cache_hit: bool,
    pub requester_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub clicked_worker_id: Option<WorkerId>,
    /// 1-based position of the clicked worker in `result_worker_ids`.
    pub click_position: Option<u32>,
    pub clicked_at: Option<DateTime<Utc>>,
    pub converted_worker_id: Option<WorkerId>,
    pub converted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Warning,
    Error,
}

impl EventLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub trained_at: DateTime<Utc>,
    pub corpus_size: usize,
    pub vocabulary_size: usize,
    pub training_ms: f64,
    pub corpus_fingerprint: String,
    pub forced: bool,
}
