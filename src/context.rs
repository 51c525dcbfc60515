//! Monitoring session context.
//!
//! [`MonitoringContext`] owns the backend, the core group table and one
//! handle per group. The host drives it through four lifecycle calls:
//!
//! 1. [`configure`](MonitoringContext::configure) builds the group table
//! 2. [`initialize`](MonitoringContext::initialize) starts one handle per group
//! 3. [`read`](MonitoringContext::read) is called once per tick
//! 4. [`shutdown`](MonitoringContext::shutdown) stops every handle
//!
//! Both `configure` and `initialize` first open the backend if that has not
//! happened yet, so they may be called in either order.

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::backend::{BackendError, MonitoringBackend};
use crate::config_tree::{ConfigItem, ConfigValue};
use crate::core_group::{default_groups, CoreGroup, CoreGroupTable, TableError, MAX_CORES, MAX_GROUPS};
use crate::events::{select_events, EventMask};
use crate::platform::Platform;
use crate::poll::{self, TickError};
use crate::rangelist::{self, RangeListError};
use crate::sink::MetricSink;

/// Configuration key holding the core group list.
pub const CORES_KEY: &str = "Cores";

/// Lifecycle state of a [`MonitoringContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContextState {
    /// Backend not opened yet.
    Uninitialized,
    /// Backend opened, platform discovered, no group table.
    Preinitialized,
    /// Group table built.
    Configured,
    /// Every group handle started.
    Monitoring,
    /// Handles stopped and backend closed.
    Shutdown,
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContextState::Uninitialized => "uninitialized",
            ContextState::Preinitialized => "preinitialized",
            ContextState::Configured => "configured",
            ContextState::Monitoring => "monitoring",
            ContextState::Shutdown => "shutdown",
        };
        f.write_str(s)
    }
}

/// Backend could not be used for monitoring.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("error initializing monitoring backend: {0}")]
    Open(#[source] BackendError),

    #[error("monitoring capability not detected, nothing to monitor")]
    NoMonitoring,
}

/// Invalid core group configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("cannot reconfigure while monitoring is running")]
    AlreadyMonitoring,

    #[error("core group value is not a string [idx={index}]: {value}")]
    NotAString { index: usize, value: ConfigValue },

    #[error("error parsing core group ({value}): {source}")]
    InvalidCores {
        value: String,
        #[source]
        source: RangeListError,
    },

    #[error("error parsing core group ({value}): no cores")]
    EmptyGroup { value: String },

    #[error("error parsing core group ({value}): core {core} out of range")]
    CoreOutOfRange { value: String, core: u64 },

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("last configuration was rejected, not starting monitoring")]
    Rejected,
}

/// Monitoring could not be started.
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("error starting monitoring for core group [{group}]: {source}")]
    Start {
        group: String,
        #[source]
        source: BackendError,
    },
}

/// Shutdown called on a context that was never opened.
#[derive(Debug, Error)]
#[error("monitoring context not initialized")]
pub struct NotInitialized;

/// One monitoring session.
pub struct MonitoringContext<B: MonitoringBackend> {
    backend: B,
    host: String,
    state: ContextState,
    platform: Option<Platform>,
    table: CoreGroupTable,
    handles: Vec<B::Handle>,
    config_failed: bool,
}

impl<B: MonitoringBackend> MonitoringContext<B> {
    /// Creates an unopened context. `host` names every dispatched series.
    pub fn new(backend: B, host: impl Into<String>) -> Self {
        Self {
            backend,
            host: host.into(),
            state: ContextState::Uninitialized,
            platform: None,
            table: CoreGroupTable::new(),
            handles: Vec::new(),
            config_failed: false,
        }
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn table(&self) -> &CoreGroupTable {
        &self.table
    }

    pub fn platform(&self) -> Option<&Platform> {
        self.platform.as_ref()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of started group handles.
    pub fn active_handles(&self) -> usize {
        self.handles.len()
    }

    /// Event mask derived from the platform, if the backend is open.
    pub fn available_events(&self) -> Option<EventMask> {
        self.platform
            .as_ref()
            .and_then(|p| p.monitoring.as_ref())
            .map(select_events)
    }

    /// Opens the backend once; a no-op when already open.
    fn preinit(&mut self) -> Result<(), PlatformError> {
        if !matches!(
            self.state,
            ContextState::Uninitialized | ContextState::Shutdown
        ) {
            return Ok(());
        }

        let platform = self.backend.open().map_err(|e| {
            error!("Error initializing {} backend: {}", self.backend.name(), e);
            PlatformError::Open(e)
        })?;

        if platform.monitoring.is_none() {
            error!("Monitoring capability not detected. Nothing to do.");
            if let Err(e) = self.backend.close() {
                warn!("Error closing {} backend: {}", self.backend.name(), e);
            }
            return Err(PlatformError::NoMonitoring);
        }

        debug!(
            "Platform has {} cores on {} sockets",
            platform.cores.len(),
            platform.num_sockets()
        );
        self.platform = Some(platform);
        self.state = ContextState::Preinitialized;
        Ok(())
    }

    /// Applies a configuration block.
    ///
    /// Recognizes the `Cores` key (case-insensitive); other keys are logged
    /// and ignored. On error the group table is left empty.
    pub fn configure(&mut self, items: &[ConfigItem]) -> Result<(), ConfigError> {
        self.preinit()?;

        if self.state == ContextState::Monitoring {
            return Err(ConfigError::AlreadyMonitoring);
        }

        let result = self.apply_items(items);
        self.config_failed = result.is_err();
        result
    }

    fn apply_items(&mut self, items: &[ConfigItem]) -> Result<(), ConfigError> {
        let mut cores_seen = false;
        for item in items {
            if item.key.eq_ignore_ascii_case(CORES_KEY) {
                self.configure_groups(&item.values)?;
                cores_seen = true;
            } else {
                warn!("Unknown configuration parameter \"{}\".", item.key);
            }
        }

        if !cores_seen {
            self.configure_groups(&[])?;
        }

        Ok(())
    }

    /// Rebuilds the group table from `Cores` values.
    fn configure_groups(&mut self, values: &[ConfigValue]) -> Result<(), ConfigError> {
        self.table.clear();
        self.state = ContextState::Preinitialized;

        debug!("Core groups [{}]:", values.len());
        for (index, value) in values.iter().enumerate() {
            if value.as_str().is_none() {
                error!("Given core group value is not a string [idx={}]", index);
                return Err(ConfigError::NotAString {
                    index,
                    value: value.clone(),
                });
            }
            debug!("  [{}]: {}", index, value);
        }

        let mut groups = parse_groups(values)?;

        let (cores, events) = match self.platform.as_ref() {
            Some(platform) => (
                platform.cores.as_slice(),
                platform
                    .monitoring
                    .as_ref()
                    .map(select_events)
                    .unwrap_or_else(EventMask::empty),
            ),
            None => return Err(PlatformError::NoMonitoring.into()),
        };

        if groups.is_empty() {
            groups = default_groups(cores);
            info!("No core groups configured. Default core groups created.");
        }

        debug!("Available events to monitor [{:#x}]", events.bits());

        let table = CoreGroupTable::build(groups, events, MAX_GROUPS).map_err(|e| {
            error!("Error building core group table: {}", e);
            e
        })?;
        self.table = table;
        self.state = ContextState::Configured;

        dump_groups(&self.table);
        Ok(())
    }

    /// Starts monitoring every configured group.
    ///
    /// Without a prior `configure` call the default groups are used; after a
    /// rejected `configure` nothing is started. If any group fails to start,
    /// the groups started so far are stopped again.
    pub fn initialize(&mut self) -> Result<(), InitError> {
        self.preinit()?;

        match self.state {
            ContextState::Monitoring => return Ok(()),
            ContextState::Preinitialized if self.config_failed => {
                error!("Configuration was rejected, monitoring not started");
                return Err(ConfigError::Rejected.into());
            }
            ContextState::Preinitialized => self.configure(&[])?,
            _ => {}
        }

        let mut handles = Vec::with_capacity(self.table.len());
        for group in self.table.iter() {
            match self.backend.start_group(group) {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    error!(
                        "Error starting monitoring for [{}]: {}",
                        group.description(),
                        source
                    );
                    for handle in handles.drain(..) {
                        if let Err(e) = self.backend.stop_group(handle) {
                            warn!("Error stopping monitoring during rollback: {}", e);
                        }
                    }
                    return Err(InitError::Start {
                        group: group.description().to_string(),
                        source,
                    });
                }
            }
        }

        self.handles = handles;
        self.state = ContextState::Monitoring;
        info!(
            "Monitoring started for {} core groups using the {} backend",
            self.handles.len(),
            self.backend.name()
        );
        Ok(())
    }

    /// Runs one tick: polls all groups and dispatches their series.
    pub fn read<S>(&mut self, sink: &mut S) -> Result<usize, TickError>
    where
        S: MetricSink + ?Sized,
    {
        if self.state != ContextState::Monitoring {
            error!("read: monitoring not initialized");
            return Err(TickError::NotMonitoring);
        }

        poll::tick(
            &mut self.backend,
            &self.table,
            &mut self.handles,
            &self.host,
            sink,
        )
    }

    /// Stops every handle, closes the backend and drops the group table.
    pub fn shutdown(&mut self) -> Result<(), NotInitialized> {
        debug!("Shutting down monitoring context");

        if matches!(
            self.state,
            ContextState::Uninitialized | ContextState::Shutdown
        ) {
            error!("shutdown: monitoring context not initialized");
            return Err(NotInitialized);
        }

        for handle in self.handles.drain(..) {
            if let Err(e) = self.backend.stop_group(handle) {
                warn!("Error stopping monitoring: {}", e);
            }
        }

        if let Err(e) = self.backend.close() {
            error!("Error shutting down {} backend: {}", self.backend.name(), e);
        }

        self.table.clear();
        self.platform = None;
        self.config_failed = false;
        self.state = ContextState::Shutdown;
        Ok(())
    }
}

impl<B: MonitoringBackend> Drop for MonitoringContext<B> {
    fn drop(&mut self) {
        if !matches!(
            self.state,
            ContextState::Uninitialized | ContextState::Shutdown
        ) {
            let _ = self.shutdown();
        }
    }
}

/// Parses every non-empty `Cores` string into a candidate group.
fn parse_groups(values: &[ConfigValue]) -> Result<Vec<CoreGroup>, ConfigError> {
    let mut groups = Vec::new();

    for value in values.iter().filter_map(ConfigValue::as_str) {
        if value.is_empty() {
            continue;
        }

        let parsed = rangelist::parse(value, MAX_CORES).map_err(|source| {
            error!("Error parsing core group ({})", value);
            ConfigError::InvalidCores {
                value: value.to_string(),
                source,
            }
        })?;

        if parsed.is_empty() {
            error!("Error parsing core group ({})", value);
            return Err(ConfigError::EmptyGroup {
                value: value.to_string(),
            });
        }

        let cores = parsed
            .into_iter()
            .map(|core| {
                u32::try_from(core).map_err(|_| ConfigError::CoreOutOfRange {
                    value: value.to_string(),
                    core,
                })
            })
            .collect::<Result<Vec<u32>, _>>()?;

        groups.push(CoreGroup::new(value, cores));
    }

    Ok(groups)
}

fn dump_groups(table: &CoreGroupTable) {
    debug!("Core Groups Dump");
    debug!("  groups count: {}", table.len());
    for (i, group) in table.iter().enumerate() {
        let cores: Vec<u64> = group.cores().iter().map(|&c| u64::from(c)).collect();
        debug!("  group[{}]:", i);
        debug!("    description: {}", group.description());
        debug!("    cores: {}", rangelist::render(&cores));
        debug!("    events: {:#x}", group.events().bits());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SyntheticBackend;

    #[test]
    fn parse_groups_skips_empty_strings() {
        let values = vec![ConfigValue::from(""), ConfigValue::from("0-1")];
        let groups = parse_groups(&values).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].description(), "0-1");
    }

    #[test]
    fn parse_groups_rejects_whitespace_only() {
        let values = vec![ConfigValue::from("  ")];
        assert!(matches!(
            parse_groups(&values),
            Err(ConfigError::EmptyGroup { .. })
        ));
    }

    #[test]
    fn parse_groups_rejects_huge_core() {
        let values = vec![ConfigValue::from("0x100000000")];
        assert!(matches!(
            parse_groups(&values),
            Err(ConfigError::CoreOutOfRange { core: 0x1_0000_0000, .. })
        ));
    }

    #[test]
    fn state_machine_order() {
        let mut ctx = MonitoringContext::new(SyntheticBackend::with_seed(2, 3), "h");
        assert_eq!(ctx.state(), ContextState::Uninitialized);

        ctx.configure(&[]).unwrap();
        assert_eq!(ctx.state(), ContextState::Configured);

        ctx.initialize().unwrap();
        assert_eq!(ctx.state(), ContextState::Monitoring);
        assert!(matches!(
            ctx.configure(&[]),
            Err(ConfigError::AlreadyMonitoring)
        ));

        ctx.shutdown().unwrap();
        assert_eq!(ctx.state(), ContextState::Shutdown);
        assert!(ctx.shutdown().is_err());
    }

    #[test]
    fn available_events_exclude_llc_miss() {
        let mut ctx = MonitoringContext::new(SyntheticBackend::with_seed(1, 3), "h");
        assert!(ctx.available_events().is_none());
        ctx.configure(&[]).unwrap();
        let events = ctx.available_events().unwrap();
        assert!(!events.contains(EventMask::PERF_LLC_MISS));
        assert!(events.contains(EventMask::L3_OCCUP | EventMask::PERF_IPC));
    }
}
