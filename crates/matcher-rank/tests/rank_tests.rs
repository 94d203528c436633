use std::collections::{HashMap, HashSet};

use matcher_core::config::RequestLimits;
use matcher_core::{Error, Language, SearchRequest, SearchRequestInput, Strategy, WorkerDocument};
use matcher_rank::geo::haversine_km;
use matcher_rank::present::FILTER_ONLY_EXPLANATION;
use matcher_rank::{Presenter, RankingEngine};
use matcher_text::{ModelArtifact, Preprocessor, Trainer, VectorizerOptions};
use proptest::prelude::*;
use proptest::strategy::Strategy as _;

const ORIGIN: (f64, f64) = (-34.6037, -58.3816);
// ~1 km north of ORIGIN.
const ONE_KM_NORTH: (f64, f64) = (-34.5947, -58.3816);

fn worker(id: u64, bio: &str, profession: &str, rating: f32, location: Option<(f64, f64)>) -> WorkerDocument {
    WorkerDocument {
        id,
        bio: bio.to_string(),
        profession: profession.to_string(),
        rating,
        latitude: location.map(|l| l.0),
        longitude: location.map(|l| l.1),
        is_verified: false,
    }
}

fn corpus() -> Vec<WorkerDocument> {
    vec![
        worker(1, "Plomero con experiencia en fugas", "PLUMBER", 3.0, Some(ONE_KM_NORTH)),
        worker(2, "Electricista residencial", "ELECTRICIAN", 5.0, Some(ORIGIN)),
        worker(3, "Pintor de interiores", "PAINTER", 4.0, None),
        worker(4, "Plomero de gas y fugas urgentes", "PLUMBER", 4.5, Some(ORIGIN)),
    ]
}

fn model(workers: &[WorkerDocument]) -> (Preprocessor, ModelArtifact) {
    let pre = Preprocessor::new(Language::Spanish).unwrap();
    let artifact = Trainer::new(pre.clone(), VectorizerOptions::default()).train(workers).unwrap();
    (pre, artifact)
}

fn request(input: SearchRequestInput) -> SearchRequest { input.validate(&RequestLimits::default()).unwrap() }

#[test]
fn tfidf_plumber_scenario() {
    let workers: Vec<_> = corpus().into_iter().take(3).collect();
    let (pre, artifact) = model(&workers);
    let req = request(SearchRequestInput::new("necesito plomero para fuga").top_n(1));
    let tokens = pre.preprocess(&req.query_text);
    let ranked = RankingEngine::default().rank(&req, Strategy::Tfidf, &tokens, Some(&artifact), &workers).unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].worker_id, 1);
    assert!(ranked[0].semantic_similarity.unwrap() > 0.0);
}

#[test]
fn tfidf_excludes_zero_similarity() {
    let workers = corpus();
    let (pre, artifact) = model(&workers);
    let req = request(SearchRequestInput::new("plomero").top_n(10));
    let ranked =
        RankingEngine::default().rank(&req, Strategy::Tfidf, &pre.preprocess("plomero"), Some(&artifact), &workers).unwrap();
    let ids: Vec<_> = ranked.iter().map(|c| c.worker_id).collect();
    assert!(ids.iter().all(|id| *id == 1 || *id == 4), "{ids:?}");
}

#[test]
fn model_strategies_require_artifact() {
    let req = request(SearchRequestInput::new("plomero"));
    for strategy in [Strategy::Tfidf, Strategy::Hybrid] {
        let err = RankingEngine::default().rank(&req, strategy, &[], None, &corpus()).unwrap_err();
        assert!(matches!(err, Error::ModelNotTrained(_)));
    }
}

#[test]
fn fallback_prefers_higher_rating_at_equal_distance() {
    let workers = vec![
        worker(10, "", "PLUMBER", 3.0, Some(ONE_KM_NORTH)),
        worker(11, "", "PLUMBER", 5.0, Some(ONE_KM_NORTH)),
    ];
    let (lat, lon) = ORIGIN;
    let req = request(SearchRequestInput::new("cualquier cosa").near(lat, lon, Some(10.0)));
    let ranked = RankingEngine::default().rank(&req, Strategy::Fallback, &[], None, &workers).unwrap();
    assert_eq!(ranked.iter().map(|c| c.worker_id).collect::<Vec<_>>(), vec![11, 10]);
    let expected = (1.0 + ranked[0].proximity_normalized.unwrap()) / 2.0;
    assert!((ranked[0].combined_score - expected).abs() < 1e-6);
    assert!(ranked[0].semantic_similarity.is_none());
}

#[test]
fn fallback_ties_break_by_worker_id() {
    let workers = vec![worker(9, "", "", 4.0, None), worker(3, "", "", 4.0, None)];
    let req = request(SearchRequestInput::new("lo que sea"));
    let ranked = RankingEngine::default().rank(&req, Strategy::Fallback, &[], None, &workers).unwrap();
    assert_eq!(ranked[0].worker_id, 3);
}

#[test]
fn hybrid_does_not_redistribute_missing_proximity() {
    let workers = corpus();
    let (pre, artifact) = model(&workers);
    let req = request(SearchRequestInput::new("plomero fugas").top_n(10));
    let ranked = RankingEngine::default()
        .rank(&req, Strategy::Hybrid, &pre.preprocess(&req.query_text), Some(&artifact), &workers)
        .unwrap();
    assert!(!ranked.is_empty());
    for c in &ranked {
        let expected = 0.5 * c.semantic_similarity.unwrap() + 0.3 * c.rating_normalized;
        assert!((c.combined_score - expected).abs() < 1e-6);
        assert!(c.combined_score <= 0.8 + 1e-6);
    }
}

#[test]
fn filters_apply_in_order() {
    let workers = corpus();
    let (lat, lon) = ORIGIN;
    let mut input = SearchRequestInput::new("plomero").near(lat, lon, Some(5.0)).top_n(10);
    input.profession = Some("plumber".to_string());
    input.min_rating = Some(4.0);
    let req = request(input);
    let ranked = RankingEngine::default().rank(&req, Strategy::Fallback, &[], None, &workers).unwrap();
    assert_eq!(ranked.iter().map(|c| c.worker_id).collect::<Vec<_>>(), vec![4]);
}

#[test]
fn workers_without_location_pass_only_without_geo() {
    let workers = corpus();
    let all = RankingEngine::default()
        .rank(&request(SearchRequestInput::new("pintor").top_n(10)), Strategy::Fallback, &[], None, &workers)
        .unwrap();
    assert!(all.iter().any(|c| c.worker_id == 3));

    let (lat, lon) = ORIGIN;
    let near = RankingEngine::default()
        .rank(&request(SearchRequestInput::new("pintor").near(lat, lon, None).top_n(10)), Strategy::Fallback, &[], None, &workers)
        .unwrap();
    assert!(near.iter().all(|c| c.worker_id != 3));
}

#[test]
fn fallback_narrows_to_profession_named_in_query() {
    let mut workers = corpus();
    workers.push(worker(5, "", "ELECTRICIAN", 5.0, Some(ORIGIN)));
    let pre = Preprocessor::new(Language::Spanish).unwrap();
    let req = request(SearchRequestInput::new("necesito plomero").top_n(10));
    let ranked =
        RankingEngine::default().rank(&req, Strategy::Fallback, &pre.preprocess(&req.query_text), None, &workers).unwrap();
    assert_eq!(ranked.iter().map(|c| c.worker_id).collect::<Vec<_>>(), vec![4, 1]);
    assert!(ranked.iter().all(|c| c.profession == "PLUMBER"));

    let unknown = request(SearchRequestInput::new("jardinero urgente").top_n(10));
    let all = RankingEngine::default()
        .rank(&unknown, Strategy::Fallback, &pre.preprocess(&unknown.query_text), None, &workers)
        .unwrap();
    assert_eq!(all.len(), workers.len());
}

#[test]
fn explicit_profession_overrides_query_trade() {
    let pre = Preprocessor::new(Language::Spanish).unwrap();
    let mut input = SearchRequestInput::new("necesito plomero").top_n(10);
    input.profession = Some("painter".to_string());
    let req = request(input);
    let ranked =
        RankingEngine::default().rank(&req, Strategy::Fallback, &pre.preprocess(&req.query_text), None, &corpus()).unwrap();
    assert_eq!(ranked.iter().map(|c| c.worker_id).collect::<Vec<_>>(), vec![3]);
}

#[test]
fn duplicate_worker_ids_keep_first_record() {
    let workers = vec![
        worker(7, "Plomero con experiencia en fugas", "PLUMBER", 2.0, None),
        worker(8, "Electricista residencial", "ELECTRICIAN", 4.0, None),
        worker(7, "Pintor de interiores", "PAINTER", 5.0, None),
    ];
    let (pre, artifact) = model(&workers);
    assert_eq!(artifact.worker_ids, vec![7, 8]);
    let req = request(SearchRequestInput::new("cualquier cosa").top_n(10));

    let fallback = RankingEngine::default().rank(&req, Strategy::Fallback, &[], None, &workers).unwrap();
    assert_eq!(fallback.iter().map(|c| c.worker_id).collect::<Vec<_>>(), vec![8, 7]);
    assert_eq!(fallback[1].rating, 2.0);

    let tokens = pre.preprocess("plomero fugas");
    let tfidf = RankingEngine::default().rank(&req, Strategy::Tfidf, &tokens, Some(&artifact), &workers).unwrap();
    assert_eq!(tfidf.len(), 1);
    assert_eq!((tfidf[0].worker_id, tfidf[0].profession.as_str()), (7, "PLUMBER"));
}

#[test]
fn presenter_builds_explanations_and_breakdown() {
    let workers = corpus();
    let (pre, artifact) = model(&workers);
    let (lat, lon) = ORIGIN;
    let req = request(SearchRequestInput::new("plomero fugas").near(lat, lon, None).top_n(10));
    let tokens = pre.preprocess(&req.query_text);
    let ranked = RankingEngine::default().rank(&req, Strategy::Hybrid, &tokens, Some(&artifact), &workers).unwrap();
    let recs = Presenter::present(&ranked, &tokens, Some(&artifact));

    assert_eq!(recs.len(), ranked.len());
    let top = &recs[0];
    assert_eq!(top.breakdown.normalized_score, top.recommendation_score);
    assert!(recs.iter().all(|r| r.breakdown.normalized_score == r.recommendation_score));
    assert!(top.matched_keywords.len() <= 3);
    assert!(top.matched_keywords.iter().any(|k| k == "plomero" || k == "fugas"));
    assert!(top.breakdown.matched_terms_count >= top.matched_keywords.len());
    assert!(top.explanation.contains("% relevante"));
    assert!(top.explanation.contains("coincide con: "));
    assert!(top.explanation.contains("km"));
    assert_eq!(top.recommendation_score, ranked[0].combined_score);
    assert!((top.breakdown.relevance_percentage - ranked[0].combined_score * 100.0).abs() < 1e-4);
}

#[test]
fn explanation_clauses() {
    assert_eq!(Presenter::explain(0.0, &[], None), FILTER_ONLY_EXPLANATION);
    assert_eq!(
        Presenter::explain(87.4, &["fuga".into(), "agua".into()], Some(2.46)),
        "87% relevante - coincide con: fuga, agua - a 2.5km"
    );
    assert_eq!(Presenter::explain(0.0, &[], Some(1.0)), "a 1.0km");
}

#[test]
fn response_serializes_expected_fields() {
    let resp = Presenter::build_response("plomero", "plomero".into(), Strategy::Tfidf, vec![], 12.3456, true, None);
    let json = serde_json::to_value(&resp).unwrap();
    assert_eq!(json["strategy_used"], "tfidf");
    assert_eq!(json["total_results"], 0);
    assert_eq!(json["performance_ms"], 12.35);
    assert_eq!(json["cache_hit"], true);
    assert!(json["log_id"].is_null());
}

fn arb_worker() -> impl proptest::strategy::Strategy<Value = WorkerDocument> {
    (
        1u64..50,
        prop::sample::select(vec!["plomero fugas", "electricista", "pintor techo", "plomero gas", "albañil obra"]),
        0.0f32..=5.0,
        prop::option::of((-35.0f64..-34.0, -59.0f64..-58.0)),
    )
        .prop_map(|(id, bio, rating, loc)| worker(id, bio, "PLUMBER", rating, loc))
}

proptest! {
    #[test]
    fn ranking_properties(
        workers in prop::collection::vec(arb_worker(), 1..12),
        top_n in 1i64..8,
        min_rating in prop::option::of(0.0f32..=5.0),
        strategy in prop::sample::select(Strategy::ALL.to_vec()),
    ) {
        let pre = Preprocessor::new(Language::Spanish).unwrap();
        let artifact = Trainer::new(pre.clone(), VectorizerOptions::default()).train(&workers).unwrap();
        let mut input = SearchRequestInput::new("plomero fugas").near(-34.6, -58.4, Some(80.0)).top_n(top_n);
        input.min_rating = min_rating;
        let req = request(input);
        let tokens = pre.preprocess(&req.query_text);
        let engine = RankingEngine::default();

        let a = engine.rank(&req, strategy, &tokens, Some(&artifact), &workers).unwrap();
        let b = engine.rank(&req, strategy, &tokens, Some(&artifact), &workers).unwrap();
        prop_assert_eq!(&a, &b);

        let (lat, lon, max_km) = (-34.6, -58.4, 80.0);
        let similarity: HashMap<u64, f32> =
            artifact.similarities(&artifact.vectorizer.transform(&tokens)).into_iter().collect();
        let mut seen = HashSet::new();
        let eligible = workers
            .iter()
            .filter(|w| seen.insert(w.id))
            .filter(|w| strategy == Strategy::Fallback || similarity.get(&w.id).is_some_and(|s| *s > 0.0))
            .filter(|w| min_rating.map_or(true, |min| w.rating >= min))
            .filter(|w| w.location().is_some_and(|loc| haversine_km((lat, lon), loc) <= max_km))
            .count();
        prop_assert_eq!(a.len(), eligible.min(top_n as usize));
        let ids: HashSet<u64> = a.iter().map(|c| c.worker_id).collect();
        prop_assert_eq!(ids.len(), a.len());
        for c in &a {
            prop_assert!((0.0..=1.0 + 1e-6).contains(&c.combined_score));
            if let Some(s) = c.semantic_similarity {
                prop_assert!((0.0..=1.0).contains(&s));
            }
            if let Some(min) = min_rating {
                prop_assert!(c.rating >= min);
            }
        }
    }
}
