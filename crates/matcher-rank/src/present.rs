//! Response shaping: matched keywords, explanation text and score breakdown.
//!
//! Every figure in a `Recommendation` is derived once per candidate and then
//! exposed twice, as flat fields and inside `breakdown`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use matcher_core::{Strategy, WorkerId};
use matcher_text::vectorizer::ngrams;
use matcher_text::ModelArtifact;

use crate::engine::RankedCandidate;

pub const MAX_MATCHED_KEYWORDS: usize = 3;
pub const FILTER_ONLY_EXPLANATION: &str = "Recomendado por filtros";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub semantic_similarity: Option<f32>,
    pub relevance_percentage: f32,
    pub distance_km: Option<f64>,
    pub distance_factor: Option<f32>,
    /// Same value as `recommendation_score`.
    pub normalized_score: f32,
    pub matched_terms_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub worker_id: WorkerId,
    pub profession: String,
    pub rating: f32,
    pub recommendation_score: f32,
    pub matched_keywords: Vec<String>,
    pub explanation: String,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub query: String,
    pub processed_query: String,
    pub strategy_used: Strategy,
    pub total_results: usize,
    pub recommendations: Vec<Recommendation>,
    pub performance_ms: f64,
    pub cache_hit: bool,
    pub log_id: Option<String>,
}

pub struct Presenter;

impl Presenter {
    /// `artifact` is `None` when no model was consulted; keywords are then empty.
    pub fn present(
        candidates: &[RankedCandidate],
        query_tokens: &[String],
        artifact: Option<&ModelArtifact>,
    ) -> Vec<Recommendation> {
        let query_terms: HashSet<String> = ngrams(query_tokens).into_iter().collect();
        candidates
            .iter()
            .map(|c| {
                let matched = artifact.map(|a| Self::matched_terms(a, c.worker_id, &query_terms)).unwrap_or_default();
                let keywords: Vec<String> = matched.iter().take(MAX_MATCHED_KEYWORDS).cloned().collect();
                let relevance_percentage = c.combined_score * 100.0;
                let explanation = Self::explain(relevance_percentage, &keywords, c.distance_km);
                Recommendation {
                    worker_id: c.worker_id,
                    profession: c.profession.clone(),
                    rating: c.rating,
                    recommendation_score: c.combined_score,
                    explanation,
                    breakdown: ScoreBreakdown {
                        semantic_similarity: c.semantic_similarity,
                        relevance_percentage,
                        distance_km: c.distance_km,
                        distance_factor: c.proximity_normalized,
                        normalized_score: c.combined_score,
                        matched_terms_count: matched.len(),
                    },
                    matched_keywords: keywords,
                }
            })
            .collect()
    }

    /// Query terms present in the worker's row, heaviest worker weight first.
    fn matched_terms(artifact: &ModelArtifact, worker_id: WorkerId, query_terms: &HashSet<String>) -> Vec<String> {
        artifact
            .top_terms(worker_id, usize::MAX)
            .into_iter()
            .filter(|(term, _)| query_terms.contains(*term))
            .map(|(term, _)| term.to_string())
            .collect()
    }

    pub fn explain(relevance_percentage: f32, keywords: &[String], distance_km: Option<f64>) -> String {
        let mut parts = Vec::with_capacity(3);
        if relevance_percentage > 0.0 {
            parts.push(format!("{relevance_percentage:.0}% relevante"));
        }
        if !keywords.is_empty() {
            parts.push(format!("coincide con: {}", keywords.join(", ")));
        }
        if let Some(d) = distance_km {
            parts.push(format!("a {d:.1}km"));
        }
        if parts.is_empty() { FILTER_ONLY_EXPLANATION.to_string() } else { parts.join(" - ") }
    }

    pub fn build_response(
        query: &str,
        processed_query: String,
        strategy: Strategy,
        recommendations: Vec<Recommendation>,
        elapsed_ms: f64,
        cache_hit: bool,
        log_id: Option<String>,
    ) -> RecommendationResponse {
        RecommendationResponse {
            query: query.to_string(),
            processed_query,
            strategy_used: strategy,
            total_results: recommendations.len(),
            recommendations,
            performance_ms: (elapsed_ms * 100.0).round() / 100.0,
            cache_hit,
            log_id,
        }
    }
}
