use chrono::Utc;
use tracing::{debug, info};

use matcher_core::{first_per_id, Error, Result, WorkerDocument};

use crate::artifact::ModelArtifact;
use crate::preprocess::Preprocessor;
use crate::vectorizer::{TfidfVectorizer, VectorizerOptions};

/// Fits a `ModelArtifact` over worker bios.
#[derive(Debug, Clone)]
pub struct Trainer {
    preprocessor: Preprocessor,
    options: VectorizerOptions,
}

impl Trainer {
    pub fn new(preprocessor: Preprocessor, options: VectorizerOptions) -> Self { Self { preprocessor, options } }

    pub fn preprocessor(&self) -> &Preprocessor { &self.preprocessor }

    /// Workers whose bio is empty, or empty after preprocessing, are left
    /// out of the matrix. Fails with `EmptyCorpus` when nobody is left.
    pub fn train(&self, workers: &[WorkerDocument]) -> Result<ModelArtifact> {
        let mut ordered: Vec<&WorkerDocument> = first_per_id(workers).into_iter().filter(|w| w.has_bio()).collect();
        ordered.sort_by_key(|w| w.id);

        let mut hasher = blake3::Hasher::new();
        let mut docs = Vec::with_capacity(ordered.len());
        let mut worker_ids = Vec::with_capacity(ordered.len());
        for w in ordered {
            let tokens = self.preprocessor.preprocess(&w.bio);
            if tokens.is_empty() {
                debug!(worker_id = w.id, "bio empty after preprocessing; skipped");
                continue;
            }
            hasher.update(&w.id.to_le_bytes());
            hasher.update(w.bio.as_bytes());
            hasher.update(&[0]);
            worker_ids.push(w.id);
            docs.push(tokens);
        }
        if docs.is_empty() {
            return Err(Error::EmptyCorpus);
        }

        let (vectorizer, rows) = TfidfVectorizer::fit_transform(&docs, &self.options);
        let artifact = ModelArtifact {
            vocabulary_size: vectorizer.vocabulary_size(),
            corpus_size: worker_ids.len(),
            vectorizer,
            rows,
            worker_ids,
            trained_at: Utc::now(),
            corpus_fingerprint: hasher.finalize().to_hex().to_string(),
        };
        info!(
            corpus_size = artifact.corpus_size,
            vocabulary_size = artifact.vocabulary_size,
            skipped = workers.len() - artifact.corpus_size,
            "tf-idf model trained"
        );
        Ok(artifact)
    }
}
