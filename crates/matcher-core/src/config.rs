//! Layered settings loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `MATCHER_*` env vars (`__` separates nested keys). Provides helpers to
//! expand `~` and `${VAR}` and to resolve relative paths against a base dir.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::Strategy;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub cache: CacheSettings,
    pub request: RequestLimits,
    pub vectorizer: VectorizerSettings,
    pub health: HealthSettings,
    pub experiment: ExperimentSettings,
    pub train: TrainSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataSettings {
    pub corpus_path: String,
    pub analytics_db: String,
    pub cache_db: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            corpus_path: "data/workers.json".to_string(),
            analytics_db: "data/analytics.sqlite".to_string(),
            cache_db: "data/cache.sqlite".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    pub key: String,
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { backend: CacheBackend::Sqlite, key: "recommendation_model_data".to_string(), ttl_secs: 86_400 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RequestLimits {
    pub min_query_chars: usize,
    pub default_top_n: usize,
    pub max_top_n: usize,
    pub default_max_distance_km: f64,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self { min_query_chars: 3, default_top_n: 5, max_top_n: 20, default_max_distance_km: 50.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VectorizerSettings {
    /// Keep at most this many terms (highest document frequency first).
    pub max_features: Option<usize>,
    /// Drop terms present in more than this fraction of documents. 1.0 disables.
    pub max_df: f32,
    /// Use `1 + ln(tf)` instead of the raw term count.
    pub sublinear_tf: bool,
}

impl Default for VectorizerSettings {
    fn default() -> Self { Self { max_features: Some(1000), max_df: 1.0, sublinear_tf: false } }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HealthSettings {
    pub critical_error_threshold: u64,
    pub error_window_minutes: i64,
    pub slow_response_ms: f64,
    pub recent_sample: usize,
    pub small_corpus: usize,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self { critical_error_threshold: 10, error_window_minutes: 60, slow_response_ms: 200.0, recent_sample: 100, small_corpus: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExperimentSettings {
    pub enabled: bool,
    /// Relative bucket weight keyed by strategy name (`tfidf`, `fallback`, `hybrid`).
    pub weights: BTreeMap<String, u32>,
}

impl Default for ExperimentSettings {
    fn default() -> Self {
        let weights = Strategy::ALL.into_iter().map(|s| (s.as_str().to_string(), 1)).collect();
        Self { enabled: false, weights }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainSettings {
    pub smoke_queries: Vec<String>,
}

impl Default for TrainSettings {
    fn default() -> Self {
        Self {
            smoke_queries: vec![
                "plomero urgente".to_string(),
                "electricista profesional".to_string(),
                "pintor para casa".to_string(),
            ],
        }
    }
}

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Load config files from `dir`; relative data paths resolve against it.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("MATCHER_").split("__"));

        let config = Self { figment, base_dir: dir.to_path_buf() };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    pub fn settings(&self) -> Result<Settings> {
        self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    pub fn resolve(&self, p: &str) -> PathBuf { resolve_with_base(&self.base_dir, p) }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let r = &self.request;
        if r.default_top_n == 0 || r.default_top_n > r.max_top_n {
            return Err(Error::InvalidConfig(format!(
                "request.default_top_n must be within 1..={} (got {})",
                r.max_top_n, r.default_top_n
            )));
        }
        if r.default_max_distance_km <= 0.0 {
            return Err(Error::InvalidConfig("request.default_max_distance_km must be positive".into()));
        }
        if self.cache.ttl_secs == 0 {
            return Err(Error::InvalidConfig("cache.ttl_secs must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.vectorizer.max_df) || self.vectorizer.max_df == 0.0 {
            return Err(Error::InvalidConfig("vectorizer.max_df must be within (0, 1]".into()));
        }
        for name in self.experiment.weights.keys() {
            name.parse::<Strategy>().map_err(|_| Error::InvalidConfig(format!("experiment.weights has unknown strategy '{name}'")))?;
        }
        if self.experiment.enabled && self.experiment.weights.values().sum::<u32>() == 0 {
            return Err(Error::InvalidConfig("experiment.weights must have a positive total".into()));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
