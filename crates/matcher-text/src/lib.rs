//! matcher-text
//!
//! Text side of the recommender: the tantivy-backed preprocessor, the TF-IDF
//! vectorizer over unigrams and bigrams, and the trainer that turns a worker
//! corpus into an immutable `ModelArtifact`.
pub mod artifact;
pub mod preprocess;
pub mod trainer;
pub mod vectorizer;

pub use artifact::ModelArtifact;
pub use preprocess::Preprocessor;
pub use trainer::Trainer;
pub use vectorizer::{SparseVector, TfidfVectorizer, VectorizerOptions};
