use matcher_core::{Error, Language, WorkerDocument};
use matcher_text::{ModelArtifact, Preprocessor, Trainer, VectorizerOptions};
use proptest::prelude::*;

fn worker(id: u64, bio: &str) -> WorkerDocument {
    WorkerDocument {
        id,
        bio: bio.to_string(),
        profession: String::new(),
        rating: 0.0,
        latitude: None,
        longitude: None,
        is_verified: false,
    }
}

fn trainer() -> Trainer { Trainer::new(Preprocessor::new(Language::Spanish).expect("stopwords"), VectorizerOptions::default()) }

fn three_workers() -> Vec<WorkerDocument> {
    vec![
        worker(1, "Plomero con experiencia en fugas"),
        worker(2, "Electricista residencial"),
        worker(3, "Pintor de interiores"),
    ]
}

#[test]
fn plumber_query_matches_plumber_only() {
    let t = trainer();
    let artifact = t.train(&three_workers()).expect("train");
    let query = t.preprocessor().preprocess("necesito plomero para fuga");
    let sims = artifact.similarities(&artifact.vectorizer.transform(&query));
    assert_eq!(sims.len(), 3);
    assert_eq!(sims[0].0, 1);
    assert!(sims[0].1 > 0.0);
    assert!(sims[1].1 < 1e-6 && sims[2].1 < 1e-6);
}

#[test]
fn empty_bios_are_excluded() {
    let mut workers = three_workers();
    workers.push(worker(4, "   "));
    workers.push(worker(5, "con de la"));
    let artifact = trainer().train(&workers).unwrap();
    assert_eq!(artifact.worker_ids, vec![1, 2, 3]);
    assert_eq!(artifact.corpus_size, 3);
    assert_eq!(artifact.rows.len(), artifact.worker_ids.len());
}

#[test]
fn no_usable_bio_is_empty_corpus() {
    let err = trainer().train(&[worker(1, ""), worker(2, "y de")]).unwrap_err();
    assert!(matches!(err, Error::EmptyCorpus));
    assert!(err.hint().is_some());
}

#[test]
fn training_is_order_independent() {
    let t = trainer();
    let a = t.train(&three_workers()).unwrap();
    let mut reversed = three_workers();
    reversed.reverse();
    let b = t.train(&reversed).unwrap();
    assert_eq!(a.worker_ids, b.worker_ids);
    assert_eq!(a.rows, b.rows);
    assert_eq!(a.corpus_fingerprint, b.corpus_fingerprint);
}

#[test]
fn fingerprint_tracks_bio_changes() {
    let t = trainer();
    let a = t.train(&three_workers()).unwrap();
    let mut changed = three_workers();
    changed[1].bio = "Electricista industrial".to_string();
    assert_ne!(a.corpus_fingerprint, t.train(&changed).unwrap().corpus_fingerprint);
}

#[test]
fn artifact_survives_serialization() {
    let artifact = trainer().train(&three_workers()).unwrap();
    let bytes = artifact.to_bytes().unwrap();
    assert_eq!(ModelArtifact::from_bytes(&bytes).unwrap(), artifact);
}

#[test]
fn misaligned_artifact_is_rejected() {
    let mut artifact = trainer().train(&three_workers()).unwrap();
    artifact.worker_ids.pop();
    let bytes = artifact.to_bytes().unwrap();
    assert!(ModelArtifact::from_bytes(&bytes).is_err());
}

#[test]
fn malformed_rows_are_rejected_on_decode() {
    let artifact = trainer().train(&three_workers()).unwrap();
    assert!(artifact.rows[0].len() > 1);

    let mut short_values = artifact.clone();
    short_values.rows[0].values.truncate(1);
    let err = ModelArtifact::from_bytes(&short_values.to_bytes().unwrap()).unwrap_err();
    assert!(err.to_string().contains("row 0"), "{err}");

    let mut out_of_range = artifact.clone();
    *out_of_range.rows[1].indices.last_mut().unwrap() = artifact.vocabulary_size as u32;
    assert!(ModelArtifact::from_bytes(&out_of_range.to_bytes().unwrap()).is_err());

    let mut unsorted = artifact;
    unsorted.rows[0].indices.reverse();
    assert!(ModelArtifact::from_bytes(&unsorted.to_bytes().unwrap()).is_err());
}

#[test]
fn top_terms_are_weight_ordered() {
    let artifact = trainer().train(&three_workers()).unwrap();
    let terms = artifact.top_terms(1, 10);
    assert!(!terms.is_empty());
    assert!(terms.windows(2).all(|w| w[0].1 >= w[1].1));
    assert!(artifact.top_terms(99, 3).is_empty());
}

const WORDS: &[&str] = &["plomero", "fugas", "gas", "pintor", "techo", "baño", "cocina", "urgente", "madera"];

fn bio_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(WORDS), 1..6).prop_map(|w| w.join(" "))
}

proptest! {
    #[test]
    fn cosine_is_bounded_and_training_deterministic(
        bios in prop::collection::vec(bio_strategy(), 1..8),
        query in bio_strategy(),
    ) {
        let workers: Vec<WorkerDocument> =
            bios.iter().enumerate().map(|(i, b)| worker(i as u64 + 1, b)).collect();
        let t = trainer();
        let a = t.train(&workers).unwrap();
        let b = t.train(&workers).unwrap();
        prop_assert_eq!(&a.worker_ids, &b.worker_ids);

        let tokens = t.preprocessor().preprocess(&query);
        let sa = a.similarities(&a.vectorizer.transform(&tokens));
        let sb = b.similarities(&b.vectorizer.transform(&tokens));
        prop_assert_eq!(&sa, &sb);
        for (_, s) in sa {
            prop_assert!((0.0..=1.0).contains(&s));
        }
    }
}
