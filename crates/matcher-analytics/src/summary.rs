use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use matcher_core::corpus::CorpusReport;
use matcher_core::Strategy;

use crate::types::QueryLogEntry;

pub const DEFAULT_DAYS: i64 = 30;
pub const TOP_TERMS: usize = 10;

/// Half-open `[from, to)` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self { Self { from, to } }

    /// The last `days` days up to now. Non-positive values fall back to 30.
    pub fn last_days(days: i64) -> Self {
        let days = if days > 0 { days } else { DEFAULT_DAYS };
        let to = Utc::now() + Duration::seconds(1);
        Self { from: to - Duration::days(days), to }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool { at >= self.from && at < self.to }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermCount {
    pub term: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyStats {
    pub queries: u64,
    pub clicks: u64,
    pub conversions: u64,
    pub ctr: f64,
    pub conversion_rate: f64,
    pub mrr: f64,
    pub avg_response_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub range: DateRange,
    pub total_queries: u64,
    pub unique_requesters: u64,
    pub avg_response_ms: f64,
    pub cache_hit_rate: f64,
    pub avg_results_per_query: f64,
    /// Engagement over every query in range, all strategies together.
    pub avg_ctr: f64,
    pub avg_conversion_rate: f64,
    pub avg_mrr: f64,
    pub top_terms: Vec<TermCount>,
    pub by_strategy: BTreeMap<Strategy, StrategyStats>,
    /// Filled in by callers that can see the corpus.
    pub corpus_health: Option<CorpusReport>,
}

fn ratio(num: f64, den: u64) -> f64 { if den == 0 { 0.0 } else { num / den as f64 } }

impl AnalyticsSummary {
    /// Entries outside `range` are ignored. Entries without engagement still
    /// count in every denominator.
    pub fn from_entries<'a>(range: DateRange, entries: impl IntoIterator<Item = &'a QueryLogEntry>) -> Self {
        let mut total = 0u64;
        let mut latency_sum = 0.0;
        let mut hits = 0u64;
        let mut results = 0usize;
        let mut requesters = HashSet::new();
        let mut terms: HashMap<&str, u64> = HashMap::new();
        // queries, clicks, conversions, reciprocal rank sum, latency sum
        let mut acc: BTreeMap<Strategy, (u64, u64, u64, f64, f64)> = BTreeMap::new();

        for e in entries.into_iter().filter(|e| range.contains(e.created_at)) {
            total += 1;
            latency_sum += e.performance_ms;
            hits += u64::from(e.cache_hit);
            results += e.result_worker_ids.len();
            if let Some(r) = &e.requester_id {
                requesters.insert(r.as_str());
            }
            for term in e.processed_query.split_whitespace() {
                *terms.entry(term).or_insert(0) += 1;
            }
            let s = acc.entry(e.strategy).or_default();
            s.0 += 1;
            s.4 += e.performance_ms;
            if let Some(pos) = e.click_position {
                s.1 += 1;
                s.3 += 1.0 / f64::from(pos.max(1));
            }
            if e.converted_worker_id.is_some() {
                s.2 += 1;
            }
        }

        let mut top_terms: Vec<TermCount> =
            terms.into_iter().map(|(term, count)| TermCount { term: term.to_string(), count }).collect();
        top_terms.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.term.cmp(&b.term)));
        top_terms.truncate(TOP_TERMS);

        let (clicks, conversions, rr_sum) =
            acc.values().fold((0u64, 0u64, 0.0), |(c, v, rr), s| (c + s.1, v + s.2, rr + s.3));
        let by_strategy = acc
            .into_iter()
            .map(|(strategy, (queries, clicks, conversions, rr_sum, latency))| {
                let stats = StrategyStats {
                    queries,
                    clicks,
                    conversions,
                    ctr: ratio(clicks as f64, queries),
                    conversion_rate: ratio(conversions as f64, queries),
                    mrr: ratio(rr_sum, queries),
                    avg_response_ms: ratio(latency, queries),
                };
                (strategy, stats)
            })
            .collect();

        Self {
            range,
            total_queries: total,
            unique_requesters: requesters.len() as u64,
            avg_response_ms: ratio(latency_sum, total),
            cache_hit_rate: ratio(hits as f64, total),
            avg_results_per_query: ratio(results as f64, total),
            avg_ctr: ratio(clicks as f64, total),
            avg_conversion_rate: ratio(conversions as f64, total),
            avg_mrr: ratio(rr_sum, total),
            top_terms,
            by_strategy,
            corpus_health: None,
        }
    }
}
