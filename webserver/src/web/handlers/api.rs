//! REST API handlers
//!
//! JSON endpoints for run control, article browsing, maintenance and
//! settings.

use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::info;

use coordinator::{ArticleStore, CoordinatorError};
use producer::ArticleGenerator;
use shared::config::validate_worker_limit;
use shared::{
    ArticlePage, ArticleQuery, ArticleRecord, ReadFilter, RunMode, RunRequest, RunSnapshot, SortField, SortOrder,
    StatusFilter,
};

use crate::error::{WebServerError, WebServerResult};
use crate::state::AppState;

// ============================================================================
// Request and response bodies
// ============================================================================

/// Current run snapshot plus the status log
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub snapshot: RunSnapshot,
    pub logs: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub tag_seed: String,
    #[serde(default = "default_count")]
    pub count: i64,
    #[serde(default = "default_length", deserialize_with = "string_or_number")]
    pub length: String,
    #[serde(default)]
    pub sequential: bool,
}

fn default_count() -> i64 {
    1
}

fn default_length() -> String {
    shared::DEFAULT_LENGTH_HINT.to_string()
}

/// Accept `"3000"` and `3000` alike
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!("expected string or number, got {}", other))),
    }
}

/// Query parameters of the article listing
#[derive(Debug, Default, Deserialize)]
pub struct ArticlesParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub filter: Option<String>,
    pub search_title: Option<String>,
    pub search_tags: Option<String>,
    pub filter_status: Option<String>,
    pub sort_field: Option<String>,
    pub sort_order: Option<String>,
}

impl ArticlesParams {
    pub fn into_query(self) -> ArticleQuery {
        let defaults = ArticleQuery::default();
        ArticleQuery {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
            read_filter: self.filter.as_deref().map_or(defaults.read_filter, ReadFilter::parse_or_default),
            title_search: self.search_title.unwrap_or_default(),
            tag_search: self.search_tags.unwrap_or_default(),
            status_filter: self
                .filter_status
                .as_deref()
                .map_or(defaults.status_filter, StatusFilter::parse_or_default),
            sort_field: self.sort_field.as_deref().map_or(defaults.sort_field, SortField::parse_or_default),
            sort_order: self.sort_order.as_deref().map_or(defaults.sort_order, SortOrder::parse_or_default),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingsUpdate {
    pub api_key: Option<String>,
    /// Number or numeric string
    pub max_workers: Option<Value>,
}

fn parse_worker_count(value: &Value) -> WebServerResult<Option<i64>> {
    let parsed = match value {
        Value::Null => return Ok(None),
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed
        .map(Some)
        .ok_or_else(|| WebServerError::invalid(format!("max_workers must be an integer, got {}", value)))
}

// ============================================================================
// Run control
// ============================================================================

/// GET /api/status
pub async fn get_status<G, S>(State(state): State<AppState<G, S>>) -> Json<StatusResponse>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    Json(StatusResponse {
        snapshot: state.coordinator.status(),
        logs: state.status_log.lines(),
    })
}

/// POST /api/generate
pub async fn start_generation<G, S>(
    State(state): State<AppState<G, S>>,
    Json(request): Json<GenerateRequest>,
) -> WebServerResult<Json<Value>>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    let seed = request.tag_seed.trim().to_string();
    if seed.is_empty() {
        return Err(WebServerError::invalid("Seed must not be empty"));
    }
    if state.coordinator.is_running() {
        return Err(WebServerError::invalid(CoordinatorError::RunInProgress.to_string()));
    }

    let run_request = RunRequest::new(seed.clone(), RunMode::from_count(request.count)?)
        .sequential(request.sequential)
        .with_length_hint(request.length);

    state
        .status_log
        .reset(format!("Started generation: '{}', count: {}", seed, request.count));

    match state.coordinator.start_run(run_request, state.events.clone()).await {
        Ok(run_id) => {
            info!("🚀 Generation started for '{}' (run {})", seed, run_id);
            Ok(Json(json!({
                "success": true,
                "message": "Generation started",
                "run_id": run_id,
            })))
        }
        Err(CoordinatorError::RunInProgress) => Err(WebServerError::invalid(CoordinatorError::RunInProgress.to_string())),
        Err(e) => {
            state.status_log.push(format!("Failed to start: {}", e));
            Err(e.into())
        }
    }
}

/// POST /api/stop
pub async fn stop_generation<G, S>(State(state): State<AppState<G, S>>) -> Json<Value>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    if state.coordinator.stop_run() {
        state.status_log.push("Stop requested");
    }
    Json(json!({ "success": true, "message": "Stopping generation..." }))
}

// ============================================================================
// Articles
// ============================================================================

/// GET /api/articles
pub async fn list_articles<G, S>(
    State(state): State<AppState<G, S>>,
    Query(params): Query<ArticlesParams>,
) -> WebServerResult<Json<ArticlePage>>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    Ok(Json(state.coordinator.list_articles(params.into_query()).await?))
}

/// GET /api/article/:id
pub async fn get_article<G, S>(
    State(state): State<AppState<G, S>>,
    Path(id): Path<i64>,
) -> WebServerResult<Json<ArticleRecord>>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    state
        .coordinator
        .get_article(id)
        .await?
        .map(Json)
        .ok_or_else(|| WebServerError::not_found(format!("Article {}", id)))
}

/// DELETE /api/article/:id
pub async fn delete_article<G, S>(
    State(state): State<AppState<G, S>>,
    Path(id): Path<i64>,
) -> WebServerResult<Json<Value>>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    let deleted = state.coordinator.delete_article(id).await?;
    Ok(Json(json!({ "success": true, "deleted": deleted })))
}

/// POST /api/article/:id/toggle-read
pub async fn toggle_read<G, S>(
    State(state): State<AppState<G, S>>,
    Path(id): Path<i64>,
) -> WebServerResult<Json<Value>>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    let toggled = state.coordinator.toggle_read(id).await?;
    Ok(Json(json!({ "success": toggled })))
}

/// POST /api/articles/clear
pub async fn clear_articles<G, S>(State(state): State<AppState<G, S>>) -> WebServerResult<Json<Value>>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    let deleted = state.coordinator.clear_articles().await?;
    Ok(Json(json!({ "success": true, "deleted": deleted })))
}

// ============================================================================
// Maintenance
// ============================================================================

/// POST /api/articles/correction
pub async fn run_correction<G, S>(State(state): State<AppState<G, S>>) -> WebServerResult<Json<Value>>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    let stats = state.coordinator.perform_correction().await?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}

/// POST /api/articles/reorder
pub async fn reorder_ids<G, S>(State(state): State<AppState<G, S>>) -> WebServerResult<Json<Value>>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    let stats = state.coordinator.renumber_ids().await?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}

// ============================================================================
// Settings and catalog
// ============================================================================

/// GET /api/settings
pub async fn get_settings<G, S>(State(state): State<AppState<G, S>>) -> Json<Value>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    let settings = state.settings.read().await;
    Json(json!({
        "api_key": settings.api_key.clone().unwrap_or_default(),
        "max_workers": state.coordinator.worker_limit(),
    }))
}

/// POST /api/settings
pub async fn update_settings<G, S>(
    State(state): State<AppState<G, S>>,
    Json(update): Json<SettingsUpdate>,
) -> WebServerResult<Json<Value>>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    // Validate everything before changing anything
    let workers = match update.max_workers.as_ref() {
        Some(value) => match parse_worker_count(value)? {
            Some(count) => Some(validate_worker_limit(count).map_err(|e| WebServerError::invalid(e.to_string()))?),
            None => None,
        },
        None => None,
    };
    let api_key = update
        .api_key
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty());

    let mut settings = state.settings.write().await;
    if let Some(key) = api_key {
        state.coordinator.update_api_key(&key);
        settings.api_key = Some(key);
        info!("🔑 API key updated");
    }
    if let Some(workers) = workers {
        state.coordinator.set_worker_limit(workers as i64)?;
        settings.max_workers = workers;
    }
    settings.save(&state.settings_path)?;

    Ok(Json(json!({ "success": true })))
}

/// GET /api/tags
pub async fn get_tags<G, S>(State(state): State<AppState<G, S>>) -> Json<Vec<String>>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    Json(state.coordinator.tag_categories())
}

/// GET /health
pub async fn health_check<G, S>(State(state): State<AppState<G, S>>) -> Json<Value>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    Json(json!({
        "status": "healthy",
        "running": state.coordinator.is_running(),
    }))
}
