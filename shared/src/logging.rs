//! Shared logging utilities for consistent tracing across binaries

use crate::types::RunId;
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{error, info};

/// Binary that owns the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Coordinator,
    WebServer,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Coordinator => write!(f, "coordinator"),
            Component::WebServer => write!(f, "webserver"),
        }
    }
}

/// Filter directives for a component at the given base level
pub fn filter_directives(component: Component, log_level: Option<&str>) -> String {
    let base_level = log_level.unwrap_or("info");

    match component {
        Component::Coordinator => {
            format!("coordinator={base_level},producer={base_level},shared={base_level},reqwest=warn")
        }
        Component::WebServer => format!(
            "webserver={base_level},coordinator={base_level},producer={base_level},shared={base_level},tower_http=debug,axum={base_level}"
        ),
    }
}

/// Initialize the stdout tracing subscriber for a component
pub fn init_tracing(component: Component, log_level: Option<&str>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let directives = filter_directives(component, log_level);

    // RUST_LOG wins over the built-in directives when present
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directives));

    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Macro for run-aware info logging
#[macro_export]
macro_rules! run_info {
    ($run_id:expr, $($arg:tt)*) => {
        tracing::info!(
            run = %$run_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for run-aware warning logging
#[macro_export]
macro_rules! run_warn {
    ($run_id:expr, $($arg:tt)*) => {
        tracing::warn!(
            run = %$run_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for run-aware error logging
#[macro_export]
macro_rules! run_error {
    ($run_id:expr, $($arg:tt)*) => {
        tracing::error!(
            run = %$run_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for run-aware debug logging
#[macro_export]
macro_rules! run_debug {
    ($run_id:expr, $($arg:tt)*) => {
        tracing::debug!(
            run = %$run_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Contextual logging helper for startup messages
pub fn log_startup(component: Component, details: &str) {
    info!(
        component = %component,
        timestamp = format_timestamp(),
        "🚀 Starting {}",
        details
    );
}

/// Contextual logging helper for shutdown messages
pub fn log_shutdown(component: Component, reason: &str) {
    info!(
        component = %component,
        timestamp = format_timestamp(),
        "🛑 Shutting down: {}",
        reason
    );
}

/// Contextual logging helper for error conditions
pub fn log_error(component: Component, context: &str, error: &dyn std::fmt::Display) {
    error!(
        component = %component,
        timestamp = format_timestamp(),
        error = %error,
        "❌ {} failed: {}",
        context,
        error
    );
}

/// Contextual logging helper for success conditions
pub fn log_success(component: Component, message: &str) {
    info!(
        component = %component,
        timestamp = format_timestamp(),
        "✅ {}",
        message
    );
}

/// Run-scoped summary line
pub fn log_run_summary(run_id: &RunId, success: u64, errors: u64) {
    info!(
        run = %run_id,
        timestamp = format_timestamp(),
        "📋 Batch finished: {} succeeded, {} failed",
        success,
        errors
    );
}
