//! WebServer entry point
//!
//! Opens the article database, builds the coordinator and serves the JSON API.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use coordinator::{Coordinator, KeywordCatalog, SqliteStore};
use producer::RealArticleGenerator;
use shared::logging::{self, Component};
use shared::Settings;
use webserver::{AppState, WebServer};

#[derive(Parser, Debug)]
#[command(name = "webserver")]
#[command(about = "HTTP API for batch article generation")]
struct Args {
    /// Address to bind the HTTP server to
    #[arg(long, default_value = "127.0.0.1:5000")]
    bind: SocketAddr,

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
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_tracing(Component::WebServer, Some(&args.log_level));

    let settings = Settings::load_with_env(&args.config)?;
    let store = Arc::new(SqliteStore::open(&args.db)?);
    let generator = Arc::new(RealArticleGenerator::from_settings(&settings)?);
    let catalog = KeywordCatalog::load(&args.tags);
    let coordinator = Coordinator::new(generator, store, catalog, settings.max_workers)?;

    logging::log_startup(Component::WebServer, &format!("http://{} (db {})", args.bind, args.db.display()));

    let (state, events) = AppState::new(coordinator, settings, args.config);
    WebServer::new(state, events).run(args.bind).await?;

    logging::log_success(Component::WebServer, "WebServer stopped gracefully");
    Ok(())
}
