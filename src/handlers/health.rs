//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns the
//! monitoring state and the outcome of the last tick as JSON.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use herakles_rdt_exporter::ContextState;
use serde::Serialize;
use std::sync::atomic::Ordering;
use tracing::{debug, instrument};

use crate::state::SharedState;
use crate::tick_stats::LastTick;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = "Project: https://github.com/cansp-dev/herakles-rdt-exporter — More info: https://www.herakles.now — Support: exporter@herakles.now";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub state: ContextState,
    pub backend: &'static str,
    pub host: String,
    pub groups: usize,
    pub uptime_seconds: u64,
    pub total_ticks: u64,
    pub failed_ticks: u64,
    pub last_tick: Option<LastTick>,
}

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let (monitor_state, backend, host, groups) = {
        let monitor = match state.monitor.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        (
            monitor.state(),
            monitor.backend_name(),
            monitor.host().to_string(),
            monitor.table().len(),
        )
    };

    let last_tick = state.tick_stats.last_tick();

    // Healthy while monitoring and the last tick (if any) succeeded
    let healthy = monitor_state == ContextState::Monitoring
        && last_tick.as_ref().map_or(true, |t| t.ok);
    let (status, message) = if healthy {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = HealthResponse {
        status: message,
        state: monitor_state,
        backend,
        host,
        groups,
        uptime_seconds: state.tick_stats.get_uptime_seconds(),
        total_ticks: state.tick_stats.total_ticks.load(Ordering::Relaxed),
        failed_ticks: state.tick_stats.failed_ticks.load(Ordering::Relaxed),
        last_tick,
    };

    debug!("Health check: {} - {}", status, message);
    (status, Json(body))
}
