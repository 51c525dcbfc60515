//! Monitoring backends.
//!
//! A backend wraps the hardware counter facility: it reports the platform
//! (cores and monitoring capability), starts one monitoring context per core
//! group, polls all contexts in a single batch and stops them again.
//!
//! Implementations:
//! - [`resctrl::ResctrlBackend`]: Linux resctrl filesystem
//! - [`synthetic::SyntheticBackend`]: generated telemetry for hosts without RDT

pub mod resctrl;
pub mod synthetic;

use std::path::PathBuf;
use thiserror::Error;

use crate::core_group::CoreGroup;
use crate::platform::Platform;

pub use resctrl::ResctrlBackend;
pub use synthetic::SyntheticBackend;

/// Snapshot of one group's counters taken by a poll.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Reading {
    /// Last level cache occupancy in bytes.
    pub llc: u64,
    /// Instructions per cycle.
    pub ipc: f64,
    pub mbm_local: u64,
    pub mbm_remote: u64,
    pub mbm_total: u64,
    /// Bandwidth deltas since the previous poll.
    pub mbm_local_delta: u64,
    pub mbm_remote_delta: u64,
    pub mbm_total_delta: u64,
}

/// Errors reported by a backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid data in {}: {reason}", path.display())]
    InvalidData { path: PathBuf, reason: String },

    #[error("monitoring not supported: {0}")]
    Unsupported(String),

    #[error("backend is not open")]
    NotOpen,

    #[error("{0}")]
    Other(String),
}

impl BackendError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BackendError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Hardware counter facility used by the monitoring context.
pub trait MonitoringBackend {
    /// Per-group monitoring context. Owned by exactly one group.
    type Handle;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Opens the facility and discovers cores and monitoring capability.
    fn open(&mut self) -> Result<Platform, BackendError>;

    /// Starts monitoring the cores of `group` for the group's events.
    fn start_group(&mut self, group: &CoreGroup) -> Result<Self::Handle, BackendError>;

    /// Polls every handle in one batch and returns one reading per handle,
    /// in handle order.
    fn poll_all(&mut self, handles: &mut [Self::Handle]) -> Result<Vec<Reading>, BackendError>;

    /// Stops monitoring and releases the handle.
    fn stop_group(&mut self, handle: Self::Handle) -> Result<(), BackendError>;

    /// Closes the facility.
    fn close(&mut self) -> Result<(), BackendError>;
}
