//! Main webserver implementation
//!
//! Wires the JSON API routes to the coordinator and runs the HTTP server
//! alongside the task that folds run events into the status log.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use coordinator::ArticleStore;
use producer::ArticleGenerator;
use shared::RunEvent;

use crate::error::{WebServerError, WebServerResult};
use crate::state::{drain_run_events, AppState};
use crate::web::handlers::api;

/// Build the API router over the given state
pub fn build_router<G, S>(state: AppState<G, S>) -> Router
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    Router::new()
        // Run control
        .route("/api/status", get(api::get_status::<G, S>))
        .route("/api/generate", post(api::start_generation::<G, S>))
        .route("/api/stop", post(api::stop_generation::<G, S>))
        // Articles
        .route("/api/articles", get(api::list_articles::<G, S>))
        .route(
            "/api/article/:id",
            get(api::get_article::<G, S>).delete(api::delete_article::<G, S>),
        )
        .route("/api/article/:id/toggle-read", post(api::toggle_read::<G, S>))
        .route("/api/articles/clear", post(api::clear_articles::<G, S>))
        // Maintenance
        .route("/api/articles/correction", post(api::run_correction::<G, S>))
        .route("/api/articles/reorder", post(api::reorder_ids::<G, S>))
        // Settings and catalog
        .route(
            "/api/settings",
            get(api::get_settings::<G, S>).post(api::update_settings::<G, S>),
        )
        .route("/api/tags", get(api::get_tags::<G, S>))
        // Health check
        .route("/health", get(api::health_check::<G, S>))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .into_inner(),
        )
        .with_state(state)
}

/// HTTP front end for one coordinator
pub struct WebServer<G, S>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    state: AppState<G, S>,
    events: mpsc::UnboundedReceiver<RunEvent>,
}

impl<G, S> WebServer<G, S>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    pub fn new(state: AppState<G, S>, events: mpsc::UnboundedReceiver<RunEvent>) -> Self {
        Self { state, events }
    }

    pub fn state(&self) -> &AppState<G, S> {
        &self.state
    }

    /// Serve until Ctrl+C, then stop any active run
    pub async fn run(self, bind_address: SocketAddr) -> WebServerResult<()> {
        let Self { state, events } = self;

        let drain_task = tokio::spawn(drain_run_events(Arc::clone(&state.status_log), events));
        let router = build_router(state.clone());

        let listener = tokio::net::TcpListener::bind(bind_address)
            .await
            .map_err(|e| WebServerError::ServerStartup(format!("Failed to bind to {}: {}", bind_address, e)))?;

        info!("🌐 Web server listening on http://{}", bind_address);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| WebServerError::ServerStartup(e.to_string()))?;

        if state.coordinator.stop_run() {
            info!("🛑 Stopping active run before exit");
            state.coordinator.wait_for_run().await?;
        }
        drain_task.abort();
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        shared::logging::log_error(shared::logging::Component::WebServer, "Signal handling", &e);
        // Without a signal handler the server runs until killed
        std::future::pending::<()>().await;
    }
    shared::logging::log_shutdown(shared::logging::Component::WebServer, "Received Ctrl+C signal");
}
