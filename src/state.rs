//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and used by the background tick task.

use prometheus::{Gauge, Registry};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::config::Config;
use crate::metrics::RdtMetrics;
use crate::monitor::Monitor;
use crate::tick_stats::TickStats;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests and background tasks.
pub struct AppState {
    pub registry: Registry,
    pub metrics: RdtMetrics,
    pub scrape_duration: Gauge,
    /// Monitoring context; locked by the tick task and the inspection handlers.
    pub monitor: Mutex<Box<dyn Monitor>>,
    pub config: Arc<Config>,
    pub tick_stats: Arc<TickStats>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}
