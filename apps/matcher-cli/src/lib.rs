//! Shared wiring for the `matcher` and `matcher-train` binaries.
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use matcher_analytics::QueryLogStore;
use matcher_core::config::{Config, Settings};
use matcher_core::corpus::JsonCorpus;
use matcher_service::{RecommendationService, TrainOutcome};

/// Logs go to stderr so stdout carries only JSON.
pub fn init_tracing(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loaded settings plus the service built from them.
pub struct App {
    pub settings: Settings,
    pub service: RecommendationService,
}

impl App {
    pub fn load() -> Result<Self> {
        let config = Config::load().context("loading configuration")?;
        let settings = config.settings()?;
        let corpus_path = config.resolve(&settings.data.corpus_path);
        let cache_db = config.resolve(&settings.data.cache_db);
        let analytics_db = config.resolve(&settings.data.analytics_db);

        let store = matcher_cache::open_store(&settings.cache, &cache_db)
            .with_context(|| format!("opening model cache at {}", cache_db.display()))?;
        let log = QueryLogStore::open(&analytics_db)?;
        let service = RecommendationService::from_settings(
            &settings,
            Arc::new(JsonCorpus::new(corpus_path)),
            store,
            Arc::new(log),
        )?;
        Ok(Self { settings, service })
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct TrainReport {
    pub outcome: TrainOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corpus: Option<matcher_core::corpus::CorpusReport>,
    pub smoke: Vec<matcher_service::SmokeResult>,
}

/// Optional corpus validation, training under a spinner, then smoke queries.
pub fn run_train(app: &App, force: bool, validate: bool) -> Result<TrainReport> {
    let corpus = if validate {
        let report = app.service.corpus_report()?;
        if report.with_bio == 0 {
            anyhow::bail!("corpus has no worker with a bio; nothing to train on");
        }
        if !report.needs_attention.is_empty() {
            warn!(workers = report.needs_attention.len(), "workers with empty or short bios");
        }
        Some(report)
    } else {
        None
    };

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message("training TF-IDF model");
    pb.enable_steady_tick(Duration::from_millis(100));
    let outcome = app.service.train(force);
    pb.finish_and_clear();
    let outcome = outcome.context("training failed")?;
    match &outcome {
        TrainOutcome::Trained(m) => {
            info!(corpus_size = m.corpus_size, vocabulary_size = m.vocabulary_size, training_ms = m.training_ms, "model trained")
        }
        TrainOutcome::Cached { .. } => info!("model already cached; pass --force to retrain"),
    }

    let smoke = app.service.smoke_test().context("smoke queries failed")?;
    for s in smoke.iter().filter(|s| s.results == 0) {
        warn!(query = %s.query, "smoke query returned no results");
    }
    Ok(TrainReport { outcome, corpus, smoke })
}

/// Report an error chain, with the retrain hint when the root cause carries one.
pub fn report_error(err: &anyhow::Error) {
    error!(error = %err, "command failed");
    for cause in err.chain().skip(1) {
        error!(cause = %cause, "caused by");
    }
    if let Some(hint) = err.chain().find_map(|c| c.downcast_ref::<matcher_core::Error>()).and_then(|e| e.hint()) {
        eprintln!("hint: {hint}");
    }
}
