use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use matcher_analytics::{AnalyticsSummary, DateRange, EventLevel, NewQueryLog, QueryLogStore, TrainingRecord};
use matcher_cache::ModelCache;
use matcher_core::config::{RequestLimits, Settings};
use matcher_core::corpus::CorpusReport;
use matcher_core::traits::{CacheStore, CorpusSource};
use matcher_core::{Error, Language, Result, SearchRequest, SearchRequestInput, Strategy, WorkerDocument, WorkerId};
use matcher_rank::{Presenter, RankingEngine, Recommendation, RecommendationResponse};
use matcher_text::{ModelArtifact, Preprocessor, Trainer, VectorizerOptions};

use crate::assign::{Assignment, StrategyAssigner};
use crate::health::{HealthReport, HealthReporter};

const SMOKE_TOP_N: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub corpus_size: usize,
    pub vocabulary_size: usize,
    pub matrix_shape: (usize, usize),
    pub training_ms: f64,
    pub corpus_fingerprint: String,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TrainOutcome {
    /// A model was already cached and `force` was not set.
    Cached { corpus_size: usize, vocabulary_size: usize, trained_at: DateTime<Utc> },
    Trained(TrainingMetrics),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmokeResult {
    pub query: String,
    pub results: usize,
    pub top_worker: Option<WorkerId>,
}

/// Result of the ranking path before logging.
struct Ranked {
    processed_query: String,
    recommendations: Vec<Recommendation>,
    cache_hit: bool,
}

/// Everything a request needs, wired once at startup.
pub struct RecommendationService {
    corpus: Arc<dyn CorpusSource>,
    cache: ModelCache,
    trainer: Trainer,
    engine: RankingEngine,
    log: Arc<QueryLogStore>,
    limits: RequestLimits,
    assigner: StrategyAssigner,
    health: HealthReporter,
    smoke_queries: Vec<String>,
}

impl RecommendationService {
    pub fn from_settings(
        settings: &Settings,
        corpus: Arc<dyn CorpusSource>,
        store: Arc<dyn CacheStore>,
        log: Arc<QueryLogStore>,
    ) -> Result<Self> {
        settings.validate()?;
        let preprocessor = Preprocessor::new(Language::default())?;
        let cache = ModelCache::from_settings(store, &settings.cache);
        Ok(Self {
            corpus,
            trainer: Trainer::new(preprocessor, VectorizerOptions::from(&settings.vectorizer)),
            engine: RankingEngine::default(),
            health: HealthReporter::new(cache.clone(), log.clone(), settings.health.clone()),
            cache,
            log,
            limits: settings.request.clone(),
            assigner: StrategyAssigner::from_settings(&settings.experiment)?,
            smoke_queries: settings.train.smoke_queries.clone(),
        })
    }

    pub fn cache(&self) -> &ModelCache { &self.cache }

    pub fn log_store(&self) -> &QueryLogStore { &self.log }

    /// Serve one search. Invalid input fails before any cache or log access.
    pub fn recommend(&self, input: &SearchRequestInput) -> Result<RecommendationResponse> {
        let started = Instant::now();
        let request = input.validate(&self.limits).inspect_err(|e| debug!(error = %e, "request rejected"))?;
        let (strategy, assignment) = self.assigner.resolve(&request);
        debug!(%strategy, ?assignment, "strategy resolved");

        let (strategy, ranked) = match self.rank_request(&request, strategy) {
            Ok(ranked) => (strategy, ranked),
            Err(Error::EmptyCorpus) if assignment != Assignment::Requested => {
                info!(query = %request.query_text, "no usable corpus; serving fallback ranking");
                (Strategy::Fallback, self.rank_request(&request, Strategy::Fallback).map_err(|e| self.boundary(&request, e))?)
            }
            Err(e) => return Err(self.boundary(&request, e)),
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let result_worker_ids: Vec<WorkerId> = ranked.recommendations.iter().map(|r| r.worker_id).collect();
        let entry = NewQueryLog {
            query_text: request.query_text.clone(),
            processed_query: ranked.processed_query.clone(),
            strategy,
            result_worker_ids,
            performance_ms: elapsed_ms,
            cache_hit: ranked.cache_hit,
            requester_id: request.requester_id.clone(),
        };
        let log_id = match self.log.record(&entry) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "failed to write query log");
                None
            }
        };

        info!(
            %strategy,
            results = ranked.recommendations.len(),
            cache_hit = ranked.cache_hit,
            elapsed_ms,
            "recommendations served"
        );
        Ok(Presenter::build_response(
            &request.query_text,
            ranked.processed_query,
            strategy,
            ranked.recommendations,
            elapsed_ms,
            ranked.cache_hit,
            log_id,
        ))
    }

    /// Taxonomy errors pass through; anything else is logged with the query
    /// and replaced by a generic error.
    fn boundary(&self, request: &SearchRequest, e: Error) -> Error {
        match e {
            Error::Validation(_) | Error::ResourceUnavailable(_) | Error::EmptyCorpus | Error::ModelNotTrained(_) => e,
            other => {
                error!(query = %request.query_text, error = %other, "ranking failed");
                self.event(EventLevel::Error, &other.to_string(), Some(&request.query_text));
                Error::Operation("recommendation failed; see server logs".into())
            }
        }
    }

    fn rank_request(&self, request: &SearchRequest, strategy: Strategy) -> Result<Ranked> {
        let workers = self.corpus.load_workers()?;
        let tokens = self.trainer.preprocessor().preprocess(&request.query_text);
        let processed_query = tokens.join(" ");

        let (artifact, cache_hit) = if strategy.needs_model() {
            let loaded = self.cache.get_or_train(|| self.train_and_record(&workers, false))?;
            if let Some(warning) = &loaded.cache_warning {
                self.event(EventLevel::Warning, warning, None);
            }
            let hit = loaded.cache_hit();
            (Some(loaded.artifact), hit)
        } else {
            (None, false)
        };

        let candidates = self.engine.rank(request, strategy, &tokens, artifact.as_deref(), &workers)?;
        let recommendations = Presenter::present(&candidates, &tokens, artifact.as_deref());
        Ok(Ranked { processed_query, recommendations, cache_hit })
    }

    fn train_and_record(&self, workers: &[WorkerDocument], forced: bool) -> Result<ModelArtifact> {
        let started = Instant::now();
        let artifact = self.trainer.train(workers)?;
        let training_ms = started.elapsed().as_secs_f64() * 1000.0;
        let record = TrainingRecord {
            trained_at: artifact.trained_at,
            corpus_size: artifact.corpus_size,
            vocabulary_size: artifact.vocabulary_size,
            training_ms,
            corpus_fingerprint: artifact.corpus_fingerprint.clone(),
            forced,
        };
        if let Err(e) = self.log.record_training(&record) {
            warn!(error = %e, "failed to record model training");
        }
        Ok(artifact)
    }

    fn event(&self, level: EventLevel, message: &str, query: Option<&str>) {
        if let Err(e) = self.log.record_event(level, message, query) {
            warn!(error = %e, level = level.as_str(), "failed to record engine event");
        }
    }

    /// Train unless a model is already cached; `force` always retrains.
    pub fn train(&self, force: bool) -> Result<TrainOutcome> {
        if !force {
            match self.cache.get() {
                Ok(Some(artifact)) => {
                    info!(corpus_size = artifact.corpus_size, "model already cached; skipping training");
                    return Ok(TrainOutcome::Cached {
                        corpus_size: artifact.corpus_size,
                        vocabulary_size: artifact.vocabulary_size,
                        trained_at: artifact.trained_at,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "model cache unreachable; training anyway");
                    self.event(EventLevel::Warning, &e.to_string(), None);
                }
            }
        }

        let workers = self.corpus.load_workers()?;
        let started = Instant::now();
        let artifact = self.train_and_record(&workers, force)?;
        let training_ms = started.elapsed().as_secs_f64() * 1000.0;
        if let Err(e) = self.cache.put(&artifact) {
            warn!(error = %e, "trained model could not be cached");
            self.event(EventLevel::Warning, &e.to_string(), None);
        }
        Ok(TrainOutcome::Trained(TrainingMetrics {
            corpus_size: artifact.corpus_size,
            vocabulary_size: artifact.vocabulary_size,
            matrix_shape: artifact.matrix_shape(),
            training_ms: (training_ms * 100.0).round() / 100.0,
            corpus_fingerprint: artifact.corpus_fingerprint,
            trained_at: artifact.trained_at,
        }))
    }

    /// Run the configured smoke queries through tfidf without logging them.
    pub fn smoke_test(&self) -> Result<Vec<SmokeResult>> {
        let mut out = Vec::with_capacity(self.smoke_queries.len());
        for query in &self.smoke_queries {
            let mut input = SearchRequestInput::new(query.as_str()).strategy(Strategy::Tfidf);
            input.top_n = Some(SMOKE_TOP_N as i64);
            let request = input.validate(&self.limits)?;
            let ranked = self.rank_request(&request, Strategy::Tfidf)?;
            out.push(SmokeResult {
                query: query.clone(),
                results: ranked.recommendations.len(),
                top_worker: ranked.recommendations.first().map(|r| r.worker_id),
            });
        }
        Ok(out)
    }

    pub fn corpus_report(&self) -> Result<CorpusReport> { Ok(CorpusReport::build(&self.corpus.load_workers()?)) }

    /// Inbound hook for profile edits: drop the cached model, never fail.
    pub fn on_worker_bio_changed(&self, worker_id: WorkerId) {
        match self.cache.invalidate() {
            Ok(()) => info!(worker_id, "worker bio changed; model cache invalidated"),
            Err(e) => {
                warn!(worker_id, error = %e, "could not invalidate model cache");
                self.event(EventLevel::Warning, &e.to_string(), None);
            }
        }
    }

    pub fn record_click(&self, log_id: &str, worker_id: WorkerId) -> anyhow::Result<u32> {
        self.log.record_click(log_id, worker_id)
    }

    pub fn record_conversion(&self, log_id: &str, worker_id: WorkerId) -> anyhow::Result<()> {
        self.log.record_conversion(log_id, worker_id)
    }

    pub fn analytics(&self, range: &DateRange) -> anyhow::Result<AnalyticsSummary> {
        let mut summary = self.log.aggregate(range)?;
        summary.corpus_health = match self.corpus_report() {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "corpus unavailable for analytics");
                None
            }
        };
        Ok(summary)
    }

    pub fn health(&self) -> HealthReport { self.health.report() }
}
