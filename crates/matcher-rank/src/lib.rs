//! matcher-rank
//!
//! Scores workers for a validated request under one of the three strategies,
//! applies the profession / rating / distance filters, and shapes the ranked
//! candidates into the response payload.
pub mod engine;
pub mod geo;
pub mod present;
pub mod profession;

pub use engine::{HybridWeights, RankedCandidate, RankingEngine};
pub use present::{Presenter, Recommendation, RecommendationResponse, ScoreBreakdown};
pub use profession::detect_profession;
