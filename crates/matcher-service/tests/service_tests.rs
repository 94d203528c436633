use std::sync::Arc;
use std::time::Duration;

use matcher_analytics::{DateRange, EventLevel, QueryLogStore};
use matcher_cache::MemoryStore;
use matcher_core::config::Settings;
use matcher_core::corpus::StaticCorpus;
use matcher_core::traits::{CacheStore, CorpusSource};
use matcher_core::{Error, ErrorKind, Result, SearchRequestInput, Strategy, WorkerDocument};
use matcher_service::{CacheStatus, HealthStatus, RecommendationService, TrainOutcome};

struct DownStore;

impl CacheStore for DownStore {
    fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> { Err(Error::CacheUnavailable("connection refused".into())) }
    fn put(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<()> {
        Err(Error::CacheUnavailable("connection refused".into()))
    }
    fn invalidate(&self, _key: &str) -> Result<()> { Err(Error::CacheUnavailable("connection refused".into())) }
    fn exists(&self, _key: &str) -> Result<bool> { Err(Error::CacheUnavailable("connection refused".into())) }
}

struct BrokenCorpus;

impl CorpusSource for BrokenCorpus {
    fn load_workers(&self) -> Result<Vec<WorkerDocument>> {
        Err(Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "profile store offline")))
    }
}

fn worker(id: u64, bio: &str, profession: &str, rating: f32) -> WorkerDocument {
    WorkerDocument {
        id,
        bio: bio.to_string(),
        profession: profession.to_string(),
        rating,
        latitude: Some(-34.6037),
        longitude: Some(-58.3816),
        is_verified: true,
    }
}

fn five_workers() -> Vec<WorkerDocument> {
    vec![
        worker(1, "Plomero con experiencia en fugas", "PLUMBER", 4.0),
        worker(2, "Electricista residencial", "ELECTRICIAN", 4.5),
        worker(3, "Pintor de interiores", "PAINTER", 3.5),
        worker(4, "Carpintero de muebles a medida", "CARPENTER", 5.0),
        worker(5, "Jardinero y paisajismo", "GARDENER", 3.0),
    ]
}

fn settings() -> Settings {
    let mut s = Settings::default();
    s.health.slow_response_ms = 1.0e9;
    s
}

fn service_with(corpus: Arc<dyn CorpusSource>, store: Arc<dyn CacheStore>) -> (RecommendationService, Arc<QueryLogStore>) {
    let log = Arc::new(QueryLogStore::open_in_memory().unwrap());
    let svc = RecommendationService::from_settings(&settings(), corpus, store, log.clone()).unwrap();
    (svc, log)
}

fn service(workers: Vec<WorkerDocument>) -> (RecommendationService, Arc<QueryLogStore>) {
    service_with(Arc::new(StaticCorpus(workers)), Arc::new(MemoryStore::new()))
}

fn logged_queries(log: &QueryLogStore) -> u64 { log.aggregate(&DateRange::last_days(1)).unwrap().total_queries }

#[test]
fn plumber_query_returns_plumber_first() {
    let (svc, log) = service(five_workers());
    let resp = svc
        .recommend(&SearchRequestInput::new("necesito plomero para fuga").strategy(Strategy::Tfidf).top_n(1))
        .unwrap();
    assert_eq!(resp.strategy_used, Strategy::Tfidf);
    assert_eq!(resp.total_results, 1);
    assert_eq!(resp.recommendations[0].worker_id, 1);
    assert_eq!(resp.processed_query, "necesito plomero fuga");
    assert!(resp.recommendations[0].matched_keywords.contains(&"plomero".to_string()));

    let log_id = resp.log_id.expect("logged");
    let entry = log.get(&log_id).unwrap().unwrap();
    assert_eq!(entry.result_worker_ids, vec![1]);
    assert!(!entry.cache_hit);
}

#[test]
fn short_query_is_rejected_without_side_effects() {
    let (svc, log) = service(five_workers());
    let err = svc.recommend(&SearchRequestInput::new("pl")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert_eq!(logged_queries(&log), 0);
    assert_eq!(log.training_count().unwrap(), 0);
    assert!(!svc.cache().exists().unwrap());
}

#[test]
fn unsupported_language_is_rejected() {
    let (svc, _log) = service(Vec::new());
    let mut input = SearchRequestInput::new("plumber needed");
    input.language = Some("en".into());
    let err = svc.recommend(&input).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(err.to_string().contains("not supported"));
}

#[test]
fn second_call_hits_cache_without_retraining() {
    let (svc, log) = service(five_workers());
    let input = SearchRequestInput::new("pintor de interiores");
    let first = svc.recommend(&input).unwrap();
    let second = svc.recommend(&input).unwrap();
    assert!(!first.cache_hit);
    assert!(second.cache_hit);
    assert_eq!(log.training_count().unwrap(), 1);
    assert_eq!(
        first.recommendations.iter().map(|r| r.worker_id).collect::<Vec<_>>(),
        second.recommendations.iter().map(|r| r.worker_id).collect::<Vec<_>>()
    );
}

#[test]
fn fallback_orders_by_rating_at_equal_distance() {
    let mut workers = vec![worker(1, "", "PLUMBER", 3.0), worker(2, "", "PLUMBER", 5.0)];
    for w in &mut workers {
        w.latitude = Some(-34.5947);
    }
    let (svc, log) = service(workers);
    let resp = svc
        .recommend(&SearchRequestInput::new("cualquier plomero").strategy(Strategy::Fallback).near(-34.6037, -58.3816, Some(10.0)))
        .unwrap();
    assert_eq!(resp.recommendations.iter().map(|r| r.worker_id).collect::<Vec<_>>(), vec![2, 1]);
    assert!(!resp.cache_hit);
    assert_eq!(log.training_count().unwrap(), 0);
    assert!(resp.recommendations.iter().all(|r| r.matched_keywords.is_empty()));
}

#[test]
fn fallback_query_naming_a_trade_returns_that_trade() {
    let (svc, _log) = service(five_workers());
    let resp = svc.recommend(&SearchRequestInput::new("necesito plomero").strategy(Strategy::Fallback)).unwrap();
    assert_eq!(resp.recommendations.iter().map(|r| r.worker_id).collect::<Vec<_>>(), vec![1]);
    assert!(resp.recommendations.iter().all(|r| r.profession == "PLUMBER"));
}

#[test]
fn empty_corpus_is_unavailable_for_explicit_tfidf() {
    let (svc, _log) = service(vec![worker(1, "  ", "PLUMBER", 4.0)]);
    let err = svc.recommend(&SearchRequestInput::new("plomero").strategy(Strategy::Tfidf)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
    assert!(err.hint().is_some());
}

#[test]
fn empty_corpus_serves_fallback_when_strategy_unset() {
    let (svc, _log) = service(vec![worker(1, "", "PLUMBER", 4.0)]);
    let resp = svc.recommend(&SearchRequestInput::new("plomero")).unwrap();
    assert_eq!(resp.strategy_used, Strategy::Fallback);
    assert_eq!(resp.total_results, 1);
}

#[test]
fn bio_change_forces_retrain() {
    let (svc, log) = service(five_workers());
    let input = SearchRequestInput::new("electricista");
    svc.recommend(&input).unwrap();
    svc.on_worker_bio_changed(2);
    assert!(!svc.cache().exists().unwrap());
    assert!(!svc.recommend(&input).unwrap().cache_hit);
    assert_eq!(log.training_count().unwrap(), 2);
}

#[test]
fn unreachable_cache_still_serves_and_degrades_health() {
    let (svc, log) = service_with(Arc::new(StaticCorpus(five_workers())), Arc::new(DownStore));
    let resp = svc.recommend(&SearchRequestInput::new("carpintero muebles")).unwrap();
    assert!(!resp.cache_hit);
    assert_eq!(resp.recommendations[0].worker_id, 4);
    assert!(log.count_events_since(EventLevel::Warning, chrono::Utc::now() - chrono::Duration::minutes(5)).unwrap() >= 1);

    let health = svc.health();
    assert_eq!(health.cache_status, CacheStatus::Disconnected);
    assert_eq!(health.status, HealthStatus::Degraded);
    assert!(health.model_trained);
    assert!(health.is_success());
    assert_eq!(health.corpus_size, 5);
}

#[test]
fn health_lifecycle() {
    let (svc, log) = service(five_workers());
    let before = svc.health();
    assert_eq!(before.status, HealthStatus::NotTrained);
    assert!(!before.model_trained);

    svc.recommend(&SearchRequestInput::new("jardinero")).unwrap();
    let ready = svc.health();
    assert_eq!(ready.status, HealthStatus::Ready);
    assert_eq!(ready.cache_status, CacheStatus::Connected);
    assert_eq!(ready.corpus_size, 5);
    assert!(ready.last_trained_at.is_some());
    assert!(ready.avg_response_time_ms.is_some());
    assert!(ready.warnings.iter().any(|w| w.contains("only 5 workers")));

    for _ in 0..11 {
        log.record_event(EventLevel::Error, "boom", Some("jardinero")).unwrap();
    }
    let sick = svc.health();
    assert_eq!(sick.status, HealthStatus::Unhealthy);
    assert_eq!(sick.recent_errors_count, 11);
    assert!(!sick.is_success());
}

#[test]
fn unexpected_failure_is_generic_and_counted() {
    let (svc, log) = service_with(Arc::new(BrokenCorpus), Arc::new(MemoryStore::new()));
    let err = svc.recommend(&SearchRequestInput::new("plomero urgente")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(!err.to_string().contains("profile store offline"));
    assert_eq!(log.count_events_since(EventLevel::Error, chrono::Utc::now() - chrono::Duration::minutes(5)).unwrap(), 1);
    assert_eq!(logged_queries(&log), 0);
}

#[test]
fn train_command_respects_cache_unless_forced() {
    let (svc, log) = service(five_workers());
    assert!(matches!(svc.train(false).unwrap(), TrainOutcome::Trained(m) if m.corpus_size == 5 && m.matrix_shape.0 == 5));
    assert!(matches!(svc.train(false).unwrap(), TrainOutcome::Cached { corpus_size: 5, .. }));
    assert!(matches!(svc.train(true).unwrap(), TrainOutcome::Trained(_)));
    assert_eq!(log.training_count().unwrap(), 2);
    assert!(log.latest_training().unwrap().unwrap().forced);

    let smoke = svc.smoke_test().unwrap();
    assert_eq!(smoke.len(), 3);
    assert_eq!(logged_queries(&log), 0);
}

#[test]
fn engagement_flows_into_analytics() {
    let (svc, _log) = service(five_workers());
    let resp = svc.recommend(&SearchRequestInput::new("plomero fugas").strategy(Strategy::Hybrid)).unwrap();
    let log_id = resp.log_id.unwrap();
    assert_eq!(svc.record_click(&log_id, 1).unwrap(), 1);
    svc.record_conversion(&log_id, 1).unwrap();
    assert!(svc.record_click("missing", 1).is_err());

    let summary = svc.analytics(&DateRange::last_days(30)).unwrap();
    let hybrid = &summary.by_strategy[&Strategy::Hybrid];
    assert_eq!(summary.total_queries, 1);
    assert_eq!(hybrid.clicks, 1);
    assert_eq!(hybrid.mrr, 1.0);
    assert_eq!(summary.avg_mrr, 1.0);
    assert_eq!(summary.avg_conversion_rate, 1.0);
    let health = summary.corpus_health.unwrap();
    assert_eq!(health.total_workers, 5);
    assert!(health.avg_bio_length > 0.0);
}

#[test]
fn concurrent_misses_all_succeed() {
    let (svc, log) = service(five_workers());
    let svc = Arc::new(svc);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let svc = Arc::clone(&svc);
            std::thread::spawn(move || svc.recommend(&SearchRequestInput::new("pintor")).map(|r| r.total_results))
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap().unwrap(), 1);
    }
    let trainings = log.training_count().unwrap();
    assert!((1..=4).contains(&trainings), "{trainings}");
}

#[test]
fn response_serializes_for_the_wire() {
    let (svc, _log) = service(five_workers());
    let resp = svc.recommend(&SearchRequestInput::new("plomero")).unwrap();
    let json = serde_json::to_value(&resp).unwrap();
    for key in ["query", "processed_query", "strategy_used", "total_results", "recommendations", "performance_ms", "cache_hit", "log_id"] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
    let rec = &json["recommendations"][0];
    for key in ["recommendation_score", "matched_keywords", "explanation"] {
        assert!(rec.get(key).is_some(), "missing {key}");
    }
    for key in ["semantic_similarity", "relevance_percentage", "distance_km", "distance_factor", "normalized_score", "matched_terms_count"] {
        assert!(rec["breakdown"].get(key).is_some(), "missing breakdown.{key}");
    }
}
