use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use matcher_core::{first_per_id, Error, GeoFilter, Result, SearchRequest, Strategy, WorkerDocument, WorkerId};
use matcher_text::ModelArtifact;

use crate::geo::{haversine_km, proximity};
use crate::profession::detect_profession;

/// Fixed blend for the hybrid strategy. A missing component scores 0 and
/// its weight is not handed to the others.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridWeights {
    pub semantic: f32,
    pub rating: f32,
    pub proximity: f32,
}

impl Default for HybridWeights {
    fn default() -> Self { Self { semantic: 0.5, rating: 0.3, proximity: 0.2 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub worker_id: WorkerId,
    pub profession: String,
    pub rating: f32,
    /// Cosine similarity; `None` under the fallback strategy.
    pub semantic_similarity: Option<f32>,
    pub rating_normalized: f32,
    /// `None` when no geo filter was given or the worker has no location.
    pub proximity_normalized: Option<f32>,
    pub combined_score: f32,
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct RankingEngine {
    weights: HybridWeights,
}

impl RankingEngine {
    pub fn new(weights: HybridWeights) -> Self { Self { weights } }

    pub fn weights(&self) -> HybridWeights { self.weights }

    /// Score, filter, order and truncate.
    ///
    /// `query_tokens` must come from the same preprocessor the artifact was
    /// trained with. `artifact` may be `None` only for `Strategy::Fallback`.
    /// Workers in the artifact but absent from `workers` are skipped, and a
    /// repeated worker id keeps its first record. Under fallback without an
    /// explicit profession, a trade detected in the query filters candidates.
    pub fn rank(
        &self,
        request: &SearchRequest,
        strategy: Strategy,
        query_tokens: &[String],
        artifact: Option<&ModelArtifact>,
        workers: &[WorkerDocument],
    ) -> Result<Vec<RankedCandidate>> {
        let geo = request.geo.as_ref();
        let unique = first_per_id(workers);
        let mut candidates = match strategy {
            Strategy::Fallback => unique
                .iter()
                .map(|w| {
                    let mut c = Self::base_candidate(w, geo);
                    c.combined_score = (c.rating_normalized + c.proximity_normalized.unwrap_or(0.0)) / 2.0;
                    c
                })
                .collect::<Vec<_>>(),
            Strategy::Tfidf | Strategy::Hybrid => {
                let artifact = artifact.ok_or_else(|| {
                    Error::ModelNotTrained(format!("strategy '{strategy}' needs a trained model"))
                })?;
                let by_id: HashMap<WorkerId, &WorkerDocument> = unique.iter().map(|w| (w.id, *w)).collect();
                let query_vector = artifact.vectorizer.transform(query_tokens);
                let mut out = Vec::new();
                for (worker_id, similarity) in artifact.similarities(&query_vector) {
                    if similarity <= 0.0 {
                        continue;
                    }
                    let Some(worker) = by_id.get(&worker_id) else { continue };
                    let mut c = Self::base_candidate(worker, geo);
                    c.semantic_similarity = Some(similarity);
                    c.combined_score = match strategy {
                        Strategy::Hybrid => {
                            self.weights.semantic * similarity
                                + self.weights.rating * c.rating_normalized
                                + self.weights.proximity * c.proximity_normalized.unwrap_or(0.0)
                        }
                        _ => similarity,
                    };
                    out.push(c);
                }
                out
            }
        };
        let scored = candidates.len();

        // Explicit profession wins; fallback infers one from the query.
        let profession = match (strategy, request.profession.as_deref()) {
            (_, Some(requested)) => Some(requested),
            (Strategy::Fallback, None) => detect_profession(query_tokens),
            _ => None,
        };
        Self::apply_filters(&mut candidates, request, profession);
        candidates.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score).then(a.worker_id.cmp(&b.worker_id)));
        candidates.truncate(request.top_n);

        debug!(%strategy, scored, returned = candidates.len(), "ranked candidates");
        Ok(candidates)
    }

    fn base_candidate(worker: &WorkerDocument, geo: Option<&GeoFilter>) -> RankedCandidate {
        let distance_km = geo.and_then(|g| worker.location().map(|loc| haversine_km((g.latitude, g.longitude), loc)));
        let proximity_normalized =
            geo.zip(distance_km).map(|(g, d)| proximity(d, g.max_distance_km));
        RankedCandidate {
            worker_id: worker.id,
            profession: worker.profession.clone(),
            rating: worker.rating,
            semantic_similarity: None,
            rating_normalized: (worker.rating / 5.0).clamp(0.0, 1.0),
            proximity_normalized,
            combined_score: 0.0,
            distance_km,
        }
    }

    /// Profession, then minimum rating, then radius. Without a geo filter
    /// workers lacking a location pass; with one they are dropped.
    fn apply_filters(candidates: &mut Vec<RankedCandidate>, request: &SearchRequest, profession: Option<&str>) {
        if let Some(profession) = profession {
            candidates.retain(|c| c.profession.eq_ignore_ascii_case(profession));
        }
        if let Some(min_rating) = request.min_rating {
            candidates.retain(|c| c.rating >= min_rating);
        }
        if let Some(geo) = &request.geo {
            candidates.retain(|c| c.distance_km.is_some_and(|d| d <= geo.max_distance_km));
        }
    }
}
