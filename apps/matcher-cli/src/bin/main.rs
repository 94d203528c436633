use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use matcher_analytics::DateRange;
use matcher_cli::{init_tracing, print_json, report_error, run_train, App};
use matcher_core::{SearchRequestInput, WorkerId};

#[derive(Parser)]
#[command(name = "matcher", version, about = "Worker recommendation engine")]
struct Cli {
    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the TF-IDF model and store it in the cache.
    Train {
        /// Retrain even when a model is cached.
        #[arg(long)]
        force: bool,
        /// Check corpus quality before training.
        #[arg(long)]
        validate: bool,
    },
    /// Rank workers for a free-text query.
    Recommend(RecommendArgs),
    /// Record that a logged result was clicked.
    Click { log_id: String, worker_id: WorkerId },
    /// Record that a logged query led to a hire.
    Hire { log_id: String, worker_id: WorkerId },
    /// Drop the cached model, as after a worker bio edit.
    Invalidate {
        #[arg(long)]
        worker_id: Option<WorkerId>,
    },
    /// Print the health report; exits non-zero when unhealthy.
    Health,
    /// Aggregate query logs over the last N days.
    Analytics {
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
    /// Report corpus data quality.
    ValidateCorpus {
        /// Include the ids of workers needing attention.
        #[arg(long)]
        detailed: bool,
    },
}

#[derive(Args)]
struct RecommendArgs {
    query: String,
    #[arg(long)]
    strategy: Option<String>,
    #[arg(long)]
    language: Option<String>,
    #[arg(long)]
    top_n: Option<i64>,
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    lon: Option<f64>,
    #[arg(long)]
    max_distance_km: Option<f64>,
    #[arg(long)]
    min_rating: Option<f32>,
    #[arg(long)]
    profession: Option<String>,
    #[arg(long, env = "MATCHER_REQUESTER_ID")]
    requester_id: Option<String>,
}

impl From<RecommendArgs> for SearchRequestInput {
    fn from(a: RecommendArgs) -> Self {
        Self {
            query: a.query,
            language: a.language,
            strategy: a.strategy,
            top_n: a.top_n,
            latitude: a.lat,
            longitude: a.lon,
            max_distance_km: a.max_distance_km,
            min_rating: a.min_rating,
            profession: a.profession,
            requester_id: a.requester_id,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli.command) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            report_error(&err);
            std::process::exit(1);
        }
    }
}

fn run(command: Commands) -> Result<i32> {
    let app = App::load()?;
    let service = &app.service;
    match command {
        Commands::Train { force, validate } => print_json(&run_train(&app, force, validate)?)?,
        Commands::Recommend(args) => print_json(&service.recommend(&args.into())?)?,
        Commands::Click { log_id, worker_id } => {
            let position = service.record_click(&log_id, worker_id)?;
            print_json(&serde_json::json!({ "log_id": log_id, "worker_id": worker_id, "position": position }))?;
        }
        Commands::Hire { log_id, worker_id } => {
            service.record_conversion(&log_id, worker_id)?;
            print_json(&serde_json::json!({ "log_id": log_id, "worker_id": worker_id, "converted": true }))?;
        }
        Commands::Invalidate { worker_id } => match worker_id {
            Some(id) => service.on_worker_bio_changed(id),
            None => {
                service.cache().invalidate()?;
                info!(key = service.cache().key(), "model cache invalidated");
            }
        },
        Commands::Health => {
            let report = service.health();
            print_json(&report)?;
            if !report.is_success() {
                return Ok(1);
            }
        }
        Commands::Analytics { days } => print_json(&service.analytics(&DateRange::last_days(days))?)?,
        Commands::ValidateCorpus { detailed } => {
            let mut report = service.corpus_report()?;
            info!(corpus = %app.settings.data.corpus_path, health = report.health_percentage, "corpus validated");
            if !detailed {
                report.needs_attention.clear();
            }
            print_json(&report)?;
        }
    }
    Ok(0)
}
