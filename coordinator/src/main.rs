//! Main entry point for the coordinator binary
//!
//! Runs a generation batch from the command line, or one of the maintenance
//! operations against the article database.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::info;

use coordinator::{Coordinator, KeywordCatalog, SqliteStore};
use producer::RealArticleGenerator;
use shared::logging::{self, Component};
use shared::{RunEvent, RunMode, RunRequest, Settings};

/// Batch article generation coordinator
#[derive(Parser)]
#[command(name = "coordinator")]
#[command(about = "Generates articles in batches and maintains the article database")]
struct Args {
    /// SQLite database file
    #[arg(long, default_value = "data/articles.db")]
    db: PathBuf,

    /// Settings file (JSON)
    #[arg(long, default_value = "data/config.json")]
    config: PathBuf,

    /// Keyword catalog file (JSON object of category to keywords)
    #[arg(long, default_value = "data/tags.json")]
    tags: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a batch of articles
    Run {
        /// Topic seed or keyword category
        #[arg(long)]
        seed: String,

        /// Number of articles; -1 runs until Ctrl+C
        #[arg(long, default_value_t = 1, allow_hyphen_values = true)]
        count: i64,

        /// Target length in characters, or "Max"
        #[arg(long, default_value = "6000")]
        length: String,

        /// Cycle category keywords in order instead of sampling
        #[arg(long)]
        sequential: bool,

        /// Concurrent workers (1-10); defaults to the settings value
        #[arg(long)]
        workers: Option<i64>,
    },

    /// Remove duplicate titles and failed records, then normalize fields
    Correct,

    /// Renumber ids by creation time
    Reorder,

    /// Print article count and configuration summary
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_tracing(Component::Coordinator, Some(&args.log_level));

    let settings = Settings::load_with_env(&args.config)?;
    let store = Arc::new(SqliteStore::open(&args.db)?);
    let generator = Arc::new(RealArticleGenerator::from_settings(&settings)?);
    let catalog = KeywordCatalog::load(&args.tags);
    let coordinator = Coordinator::new(generator, store, catalog, settings.max_workers)?;

    match args.command {
        Command::Run {
            seed,
            count,
            length,
            sequential,
            workers,
        } => {
            if let Some(workers) = workers {
                coordinator.set_worker_limit(workers)?;
            }
            let request = RunRequest::new(seed, RunMode::from_count(count)?)
                .sequential(sequential)
                .with_length_hint(length);
            run_batch(&coordinator, request).await?;
        }
        Command::Correct => {
            let report = coordinator.perform_correction().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Reorder => {
            let report = coordinator.renumber_ids().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Stats => {
            let count = coordinator.article_count().await?;
            println!("Articles:    {}", count);
            println!("Workers:     {}", coordinator.worker_limit());
            println!("Rate limit:  {}/min", settings.rate_limit_per_minute);
            println!("Model:       {}", settings.model);
            println!("API key set: {}", settings.api_key.is_some());
            let categories = coordinator.tag_categories();
            if !categories.is_empty() {
                println!("Categories:  {}", categories.join(", "));
            }
        }
    }

    Ok(())
}

async fn run_batch<G, S>(coordinator: &Coordinator<G, S>, request: RunRequest) -> anyhow::Result<()>
where
    G: producer::ArticleGenerator + 'static,
    S: coordinator::ArticleStore + 'static,
{
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let run_id = coordinator.start_run(request, events_tx).await?;
    logging::log_startup(Component::Coordinator, &format!("run {}", run_id));

    let mut stopping = false;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(RunEvent::Progress { processed, total, success_count, error_count, rate_remaining, .. }) => {
                    let total = total.map(|t| t.to_string()).unwrap_or_else(|| "∞".to_string());
                    info!(
                        "📈 {}/{} processed ({} ok, {} failed, {} requests left this minute)",
                        processed, total, success_count, error_count, rate_remaining
                    );
                }
                Some(RunEvent::Completed { .. }) | None => break,
            },
            _ = tokio::signal::ctrl_c(), if !stopping => {
                stopping = true;
                coordinator.stop_run();
            }
        }
    }

    coordinator.wait_for_run().await?;
    let snapshot = coordinator.status();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    logging::log_shutdown(Component::Coordinator, if stopping { "stopped by user" } else { "run finished" });
    Ok(())
}
