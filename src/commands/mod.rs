//! CLI command implementations for herakles-rdt-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `groups`: Core group table listing
//! - `config`: Configuration file generation
//! - `test`: Monitoring tick testing

pub mod config;
pub mod groups;

// Re-export command functions
pub use config::command_config;
pub use groups::command_groups;
pub use test::command_test;
