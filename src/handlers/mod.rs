//! HTTP endpoint handlers for the exporter.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/`: Landing page
//! - `/metrics`: Prometheus metrics endpoint
//! - `/groups`: Active core group table
//! - `/health`: Health check endpoint

pub mod groups;
pub mod health;
pub mod metrics;
pub mod root;

// Re-export handlers
pub use groups::groups_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use root::root_handler;
