//! Domain types shared by the trainer, ranking engine and analytics.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub type WorkerId = u64;

/// A worker profile as read from the external profile store.
///
/// - `bio`: free-text biography, may be empty
/// - `profession`: profession code (e.g. `PLUMBER`)
/// - `rating`: average rating on a 0-5 scale
/// - `latitude`/`longitude`: optional location in decimal degrees
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerDocument {
    pub id: WorkerId,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub profession: String,
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub is_verified: bool,
}

impl WorkerDocument {
    pub fn has_bio(&self) -> bool { !self.bio.trim().is_empty() }

    pub fn location(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// First record per worker id, in input order. Later duplicates are ignored.
pub fn first_per_id(workers: &[WorkerDocument]) -> Vec<&WorkerDocument> {
    let mut seen = HashSet::with_capacity(workers.len());
    workers.iter().filter(|w| seen.insert(w.id)).collect()
}

/// Ranking strategy requested by the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Tfidf,
    Fallback,
    Hybrid,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Tfidf, Strategy::Fallback, Strategy::Hybrid];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tfidf => "tfidf",
            Self::Fallback => "fallback",
            Self::Hybrid => "hybrid",
        }
    }

    /// Whether the strategy needs a trained TF-IDF model.
    pub fn needs_model(self) -> bool { !matches!(self, Self::Fallback) }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "tfidf" => Ok(Self::Tfidf),
            "fallback" => Ok(Self::Fallback),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(Error::Validation(format!(
                "unknown strategy '{other}'; expected one of tfidf, fallback, hybrid"
            ))),
        }
    }
}

/// Corpus language. Only Spanish bios and queries are supported.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Language {
    #[default]
    #[serde(rename = "es")]
    Spanish,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Self::Spanish => "es",
        }
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "es" => Ok(Self::Spanish),
            other => Err(Error::Validation(format!(
                "language '{other}' is not supported; only 'es' is available"
            ))),
        }
    }
}

/// Caller location and search radius.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoFilter {
    pub latitude: f64,
    pub longitude: f64,
    pub max_distance_km: f64,
}
