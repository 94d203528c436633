//! Search request as received at the boundary, and its validated form.

use serde::{Deserialize, Serialize};

use crate::config::RequestLimits;
use crate::error::{Error, Result};
use crate::types::{GeoFilter, Language, Strategy};

/// Raw request fields exactly as the caller sent them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequestInput {
    pub query: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub top_n: Option<i64>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub max_distance_km: Option<f64>,
    #[serde(default)]
    pub min_rating: Option<f32>,
    #[serde(default)]
    pub profession: Option<String>,
    #[serde(default)]
    pub requester_id: Option<String>,
}

impl SearchRequestInput {
    pub fn new(query: impl Into<String>) -> Self { Self { query: query.into(), ..Self::default() } }

    pub fn strategy(mut self, strategy: Strategy) -> Self { self.strategy = Some(strategy.as_str().to_string()); self }

    pub fn top_n(mut self, top_n: i64) -> Self { self.top_n = Some(top_n); self }

    pub fn near(mut self, latitude: f64, longitude: f64, max_distance_km: Option<f64>) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self.max_distance_km = max_distance_km;
        self
    }

    pub fn validate(&self, limits: &RequestLimits) -> Result<SearchRequest> {
        let query_text = self.query.trim();
        if query_text.chars().count() < limits.min_query_chars {
            return Err(Error::Validation(format!(
                "query must contain at least {} characters",
                limits.min_query_chars
            )));
        }

        let language = match &self.language {
            Some(code) => code.parse::<Language>()?,
            None => Language::default(),
        };

        let strategy = self.strategy.as_deref().map(str::parse::<Strategy>).transpose()?;

        let top_n = match self.top_n {
            None => limits.default_top_n,
            Some(n) if n >= 1 && n as u64 <= limits.max_top_n as u64 => n as usize,
            Some(n) => {
                return Err(Error::Validation(format!(
                    "top_n must be between 1 and {} (got {n})",
                    limits.max_top_n
                )))
            }
        };

        let geo = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => {
                if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
                    return Err(Error::Validation("latitude/longitude out of range".to_string()));
                }
                let max_distance_km = self.max_distance_km.unwrap_or(limits.default_max_distance_km);
                if !max_distance_km.is_finite() || max_distance_km <= 0.0 {
                    return Err(Error::Validation("max_distance_km must be positive".to_string()));
                }
                Some(GeoFilter { latitude, longitude, max_distance_km })
            }
            (None, None) => {
                if self.max_distance_km.is_some() {
                    return Err(Error::Validation("max_distance_km requires latitude and longitude".to_string()));
                }
                None
            }
            _ => return Err(Error::Validation("latitude and longitude must be provided together".to_string())),
        };

        if let Some(r) = self.min_rating {
            if !(0.0..=5.0).contains(&r) {
                return Err(Error::Validation(format!("min_rating must be between 0 and 5 (got {r})")));
            }
        }

        let profession = self.profession.as_deref().map(str::trim).filter(|p| !p.is_empty()).map(str::to_string);

        Ok(SearchRequest {
            query_text: query_text.to_string(),
            language,
            strategy,
            top_n,
            geo,
            min_rating: self.min_rating,
            profession,
            requester_id: self.requester_id.clone(),
        })
    }
}

/// A request that passed validation. `strategy` is `None` when the caller
/// left the choice to the service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchRequest {
    pub query_text: String,
    pub language: Language,
    pub strategy: Option<Strategy>,
    pub top_n: usize,
    pub geo: Option<GeoFilter>,
    pub min_rating: Option<f32>,
    pub profession: Option<String>,
    pub requester_id: Option<String>,
}
