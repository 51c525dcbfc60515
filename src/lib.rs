//! Herakles RDT Exporter Library
//!
//! This library provides the core-group monitoring model behind the exporter:
//! range-list parsing, the validated core group table, capability-driven event
//! selection and the per-tick poll and dispatch cycle. It is backend and sink
//! agnostic, allowing downstream projects to plug in their own counter source
//! and metric pipeline.
//!
//! # Features
//!
//! - **Range Lists**: `0-3,8,0x10-12` style core lists with duplicate suppression
//! - **Overlap Validation**: no core is ever monitored by two groups
//! - **Default Groups**: one group per core when nothing is configured
//! - **Batched Polling**: one backend poll per tick for all groups
//!
//! # Usage
//!
//! ```rust
//! use herakles_rdt_exporter::{ConfigItem, MonitoringContext, Series, SyntheticBackend};
//!
//! // Monitor cores 0-1 and 2-3 as two groups
//! let mut ctx = MonitoringContext::new(SyntheticBackend::new(4), "node1");
//! ctx.configure(&[ConfigItem::strings("Cores", ["0-1", "2-3"])]).unwrap();
//! ctx.initialize().unwrap();
//!
//! // One tick
//! let mut sink: Vec<Series> = Vec::new();
//! let dispatched = ctx.read(&mut sink).unwrap();
//! for series in &sink {
//!     println!("{} = {:?}", series.identifier(), series.values);
//! }
//! assert_eq!(dispatched, sink.len());
//!
//! ctx.shutdown().unwrap();
//! ```

pub mod backend;
pub mod config_tree;
pub mod context;
pub mod core_group;
pub mod events;
pub mod platform;
pub mod poll;
pub mod rangelist;
pub mod sink;

// Re-export main types for convenience
pub use backend::{BackendError, MonitoringBackend, Reading, ResctrlBackend, SyntheticBackend};
pub use config_tree::{ConfigItem, ConfigValue, ConfigValues};
pub use context::{ConfigError, ContextState, InitError, MonitoringContext, PlatformError};
pub use core_group::{CoreGroup, CoreGroupTable, GroupId, GroupOverlap, TableError, MAX_CORES, MAX_GROUPS};
pub use events::{select_events, EventMask, MonitoringCapability, MonitoringEvent};
pub use platform::{CpuCore, Platform};
pub use poll::TickError;
pub use sink::{MetricSink, Series, SeriesType, PLUGIN_NAME};
