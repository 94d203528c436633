//! TF-IDF over unigrams and bigrams.
//!
//! `idf(t) = ln(N / df(t))`, document vectors are L2-normalized, so cosine
//! similarity reduces to a sparse dot product.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use matcher_core::config::VectorizerSettings;

#[derive(Debug, Clone, PartialEq)]
pub struct VectorizerOptions {
    pub max_features: Option<usize>,
    pub max_df: f32,
    pub sublinear_tf: bool,
}

impl Default for VectorizerOptions {
    fn default() -> Self { Self::from(&VectorizerSettings::default()) }
}

impl From<&VectorizerSettings> for VectorizerOptions {
    fn from(s: &VectorizerSettings) -> Self {
        Self { max_features: s.max_features, max_df: s.max_df, sublinear_tf: s.sublinear_tf }
    }
}

/// Sparse row with strictly increasing `indices`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool { self.indices.is_empty() }

    pub fn len(&self) -> usize { self.indices.len() }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    pub fn get(&self, index: u32) -> Option<f32> {
        self.indices.binary_search(&index).ok().map(|pos| self.values[pos])
    }

    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut i, mut j, mut sum) = (0, 0, 0.0f32);
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    /// Parallel arrays, strictly increasing indices below `dim`, finite weights.
    pub fn is_well_formed(&self, dim: usize) -> bool {
        self.indices.len() == self.values.len()
            && self.indices.windows(2).all(|w| w[0] < w[1])
            && self.indices.last().map_or(true, |&last| (last as usize) < dim)
            && self.values.iter().all(|v| v.is_finite())
    }

    /// Cosine similarity of two L2-normalized vectors, clamped to [0, 1].
    pub fn cosine(&self, other: &SparseVector) -> f32 { self.dot(other).clamp(0.0, 1.0) }

    fn from_weights(mut weights: Vec<(u32, f32)>) -> Self {
        weights.retain(|(_, w)| *w > 0.0);
        weights.sort_unstable_by_key(|(i, _)| *i);
        let norm = weights.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm == 0.0 {
            return Self::default();
        }
        let (indices, values) = weights.into_iter().map(|(i, w)| (i, w / norm)).unzip();
        Self { indices, values }
    }
}

/// Unigrams followed by space-joined bigrams, in token order.
pub fn ngrams(tokens: &[String]) -> Vec<String> {
    let mut out: Vec<String> = tokens.to_vec();
    out.extend(tokens.windows(2).map(|w| format!("{} {}", w[0], w[1])));
    out
}

/// Fitted vocabulary (sorted) and parallel IDF weights.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TfidfVectorizer {
    terms: Vec<String>,
    idf: Vec<f32>,
    sublinear_tf: bool,
}

impl TfidfVectorizer {
    /// Fit on preprocessed documents and return the vectorizer with the
    /// document-term matrix, one row per input document.
    pub fn fit_transform(docs: &[Vec<String>], options: &VectorizerOptions) -> (Self, Vec<SparseVector>) {
        let n_docs = docs.len();
        let mut df: BTreeMap<String, usize> = BTreeMap::new();
        for doc in docs {
            let mut seen: Vec<String> = ngrams(doc);
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *df.entry(term).or_insert(0) += 1;
            }
        }

        if options.max_df < 1.0 {
            let ceiling = options.max_df as f64 * n_docs as f64;
            df.retain(|_, count| (*count as f64) <= ceiling);
        }

        let mut kept: Vec<(String, usize)> = df.into_iter().collect();
        if let Some(limit) = options.max_features {
            if kept.len() > limit {
                kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                kept.truncate(limit);
                kept.sort_by(|a, b| a.0.cmp(&b.0));
            }
        }

        let (terms, idf) = kept
            .into_iter()
            .map(|(term, count)| (term, (n_docs as f64 / count as f64).ln() as f32))
            .unzip();
        let vectorizer = Self { terms, idf, sublinear_tf: options.sublinear_tf };
        let rows = docs.iter().map(|doc| vectorizer.transform(doc)).collect();
        (vectorizer, rows)
    }

    /// Vectorize preprocessed tokens against the fitted vocabulary. Unknown
    /// terms are ignored; an all-unknown input gives an empty vector.
    pub fn transform(&self, tokens: &[String]) -> SparseVector {
        let mut counts: HashMap<u32, f32> = HashMap::new();
        for term in ngrams(tokens) {
            if let Some(idx) = self.index_of(&term) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }
        let weights = counts
            .into_iter()
            .map(|(idx, tf)| {
                let tf = if self.sublinear_tf { 1.0 + tf.ln() } else { tf };
                (idx, tf * self.idf[idx as usize])
            })
            .collect();
        SparseVector::from_weights(weights)
    }

    pub fn index_of(&self, term: &str) -> Option<u32> {
        self.terms.binary_search_by(|t| t.as_str().cmp(term)).ok().map(|i| i as u32)
    }

    pub fn term(&self, index: u32) -> Option<&str> { self.terms.get(index as usize).map(String::as_str) }

    pub fn idf(&self, term: &str) -> Option<f32> { self.index_of(term).map(|i| self.idf[i as usize]) }

    pub fn vocabulary_size(&self) -> usize { self.terms.len() }

    pub(crate) fn is_consistent(&self) -> bool {
        self.terms.len() == self.idf.len() && self.terms.windows(2).all(|w| w[0] < w[1])
    }
}
