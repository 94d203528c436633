use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use matcher_core::{Error, Result, WorkerId};

use crate::vectorizer::{SparseVector, TfidfVectorizer};

/// Trained model: fitted vectorizer plus the document-term matrix.
///
/// `worker_ids[i]` owns `rows[i]`; ids are strictly increasing so lookups
/// are a binary search. Immutable once built, replaced wholesale on retrain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelArtifact {
    pub vectorizer: TfidfVectorizer,
    pub rows: Vec<SparseVector>,
    pub worker_ids: Vec<WorkerId>,
    pub vocabulary_size: usize,
    pub corpus_size: usize,
    pub trained_at: DateTime<Utc>,
    /// blake3 hex digest of the (worker_id, bio) pairs trained on.
    pub corpus_fingerprint: String,
}

impl ModelArtifact {
    pub fn matrix_shape(&self) -> (usize, usize) { (self.rows.len(), self.vocabulary_size) }

    pub fn row_of(&self, worker_id: WorkerId) -> Option<&SparseVector> {
        self.worker_ids.binary_search(&worker_id).ok().map(|i| &self.rows[i])
    }

    /// Cosine similarity of `query` against every row, in row order.
    pub fn similarities(&self, query: &SparseVector) -> Vec<(WorkerId, f32)> {
        self.worker_ids.iter().copied().zip(self.rows.iter().map(|row| query.cosine(row))).collect()
    }

    /// Highest-weighted terms of a worker's row, heaviest first.
    pub fn top_terms(&self, worker_id: WorkerId, limit: usize) -> Vec<(&str, f32)> {
        let Some(row) = self.row_of(worker_id) else { return Vec::new() };
        let mut weighted: Vec<(&str, f32)> =
            row.iter().filter_map(|(idx, w)| self.vectorizer.term(idx).map(|t| (t, w))).collect();
        weighted.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        weighted.truncate(limit);
        weighted
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_ids.len() != self.rows.len() {
            return Err(Error::Operation(format!(
                "artifact misaligned: {} worker ids for {} rows",
                self.worker_ids.len(),
                self.rows.len()
            )));
        }
        if !self.worker_ids.windows(2).all(|w| w[0] < w[1]) {
            return Err(Error::Operation("artifact worker ids are not strictly increasing".into()));
        }
        if !self.vectorizer.is_consistent() || self.vectorizer.vocabulary_size() != self.vocabulary_size {
            return Err(Error::Operation("artifact vocabulary is inconsistent".into()));
        }
        if let Some(pos) = self.rows.iter().position(|row| !row.is_well_formed(self.vocabulary_size)) {
            return Err(Error::Operation(format!("artifact row {pos} is malformed")));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> { Ok(serde_json::to_vec(self)?) }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let artifact: Self = serde_json::from_slice(bytes)?;
        artifact.validate()?;
        Ok(artifact)
    }
}
