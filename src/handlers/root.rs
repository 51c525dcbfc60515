//! Root endpoint handler for the landing page.
//!
//! This module provides the `/` endpoint handler that displays
//! a landing page with all available endpoints and descriptions.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");

    // Calculate actual uptime from service start time
    let uptime_secs = state.start_time.elapsed().as_secs();
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    let uptime_str = format!("{}h {}m {}s", hours, minutes, seconds);

    let (host, backend, groups, monitor_state) = {
        let monitor = match state.monitor.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        (
            monitor.host().to_string(),
            monitor.backend_name(),
            monitor.table().len(),
            monitor.state(),
        )
    };

    let health_enabled = state.config.enable_health.unwrap_or(true);

    Html(render_index(&IndexPage {
        uptime: &uptime_str,
        host: &host,
        backend,
        groups,
        monitor_state: &monitor_state.to_string(),
        health_enabled,
    }))
}

/// Values shown on the landing page.
struct IndexPage<'a> {
    uptime: &'a str,
    host: &'a str,
    backend: &'a str,
    groups: usize,
    monitor_state: &'a str,
    health_enabled: bool,
}

fn render_index(page: &IndexPage<'_>) -> String {
    let mut endpoints = vec![
        ("/metrics", "Prometheus metrics"),
        ("/groups", "Core group table with cores and event mask (JSON)"),
    ];
    if page.health_enabled {
        endpoints.push(("/health", "Monitoring state and last tick outcome (JSON)"));
    }

    let links: String = endpoints
        .iter()
        .map(|(path, desc)| format!("<li><a href=\"{0}\">{0}</a> {1}</li>\n", path, desc))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>Herakles RDT Exporter</title>
<style>
body {{ font-family: sans-serif; max-width: 720px; margin: 2em auto; color: #333; }}
dt {{ font-weight: 600; float: left; width: 9em; }}
footer {{ margin-top: 2em; color: #666; font-size: 0.9em; }}
</style>
</head>
<body>
<h1>Herakles RDT Exporter {version}</h1>
<dl>
<dt>Host</dt><dd>{host}</dd>
<dt>Backend</dt><dd>{backend}</dd>
<dt>Core groups</dt><dd>{groups} ({monitor_state})</dd>
<dt>Uptime</dt><dd>{uptime}</dd>
</dl>
<ul>
{links}</ul>
<footer>{footer}</footer>
</body>
</html>"#,
        version = env!("CARGO_PKG_VERSION"),
        host = page.host,
        backend = page.backend,
        groups = page.groups,
        monitor_state = page.monitor_state,
        uptime = page.uptime,
        links = links,
        footer = FOOTER_TEXT
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(health_enabled: bool) -> String {
        render_index(&IndexPage {
            uptime: "0h 1m 5s",
            host: "node1",
            backend: "synthetic",
            groups: 2,
            monitor_state: "monitoring",
            health_enabled,
        })
    }

    #[test]
    fn index_lists_status_and_endpoints() {
        let html = page(true);
        assert!(html.contains("<dd>node1</dd>"));
        assert!(html.contains("<dd>2 (monitoring)</dd>"));
        assert!(html.contains("<a href=\"/groups\">/groups</a>"));
        assert!(html.contains("<a href=\"/health\">/health</a>"));
    }

    #[test]
    fn index_hides_disabled_health_endpoint() {
        assert!(!page(false).contains("/health"));
    }
}
