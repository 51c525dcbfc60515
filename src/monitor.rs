//! Monitoring context glue for the exporter binary.
//!
//! Picks the backend from the configuration, hides the context's backend type
//! behind the [`Monitor`] trait object and runs ticks into the Prometheus sink.

use herakles_rdt_exporter::context::NotInitialized;
use herakles_rdt_exporter::{
    ConfigError, ConfigItem, ContextState, CoreGroupTable, EventMask, InitError, MetricSink,
    MonitoringBackend, MonitoringContext, ResctrlBackend, SyntheticBackend, TickError,
};
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::cli::BackendKind;
use crate::config::Config;
use crate::metrics::PrometheusSink;
use crate::state::SharedState;

/// Backend-independent view of a monitoring context.
pub trait Monitor: Send {
    fn backend_name(&self) -> &'static str;
    fn state(&self) -> ContextState;
    fn host(&self) -> &str;
    fn table(&self) -> &CoreGroupTable;
    fn available_events(&self) -> Option<EventMask>;
    fn configure(&mut self, items: &[ConfigItem]) -> Result<(), ConfigError>;
    fn initialize(&mut self) -> Result<(), InitError>;
    fn read(&mut self, sink: &mut dyn MetricSink) -> Result<usize, TickError>;
    fn shutdown(&mut self) -> Result<(), NotInitialized>;
}

impl<B> Monitor for MonitoringContext<B>
where
    B: MonitoringBackend + Send,
    B::Handle: Send,
{
    fn backend_name(&self) -> &'static str {
        self.backend().name()
    }

    fn state(&self) -> ContextState {
        MonitoringContext::state(self)
    }

    fn host(&self) -> &str {
        MonitoringContext::host(self)
    }

    fn table(&self) -> &CoreGroupTable {
        MonitoringContext::table(self)
    }

    fn available_events(&self) -> Option<EventMask> {
        MonitoringContext::available_events(self)
    }

    fn configure(&mut self, items: &[ConfigItem]) -> Result<(), ConfigError> {
        MonitoringContext::configure(self, items)
    }

    fn initialize(&mut self) -> Result<(), InitError> {
        MonitoringContext::initialize(self)
    }

    fn read(&mut self, sink: &mut dyn MetricSink) -> Result<usize, TickError> {
        MonitoringContext::read(self, sink)
    }

    fn shutdown(&mut self) -> Result<(), NotInitialized> {
        MonitoringContext::shutdown(self)
    }
}

/// Host name attached to every series: config override, else the system name.
pub fn resolve_hostname(config: &Config) -> String {
    if let Some(name) = config.hostname.as_deref().filter(|s| !s.is_empty()) {
        return name.to_string();
    }

    match nix::unistd::gethostname() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            warn!("Failed to read host name: {} - using 'localhost'", e);
            "localhost".to_string()
        }
    }
}

/// Builds an unopened context for the configured backend.
pub fn build_monitor(
    config: &Config,
    host: &str,
) -> Result<Box<dyn Monitor>, Box<dyn std::error::Error>> {
    let monitor: Box<dyn Monitor> = match config.backend_kind()? {
        BackendKind::Resctrl => {
            let root = config.resctrl_root();
            debug!("Using resctrl backend at {}", root.display());
            Box::new(MonitoringContext::new(ResctrlBackend::new(root), host))
        }
        BackendKind::Synthetic => {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
            debug!("Using synthetic backend with {} cores", cores);
            Box::new(MonitoringContext::new(SyntheticBackend::new(cores), host))
        }
    };
    Ok(monitor)
}

/// Builds, configures and starts a monitor from the `rdt` config block.
pub fn start_monitor(
    config: &Config,
    host: &str,
) -> Result<Box<dyn Monitor>, Box<dyn std::error::Error>> {
    let mut monitor = build_monitor(config, host)?;
    monitor.configure(&config.rdt_items())?;
    monitor.initialize()?;
    Ok(monitor)
}

/// Runs one tick into the Prometheus gauges and records its outcome.
#[instrument(skip(state))]
pub fn run_tick(state: &SharedState) -> Result<usize, TickError> {
    let start = Instant::now();

    let result = {
        let mut monitor = match state.monitor.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Monitor lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        let mut sink = PrometheusSink::new(&state.metrics);
        monitor.read(&mut sink)
    };

    let elapsed = start.elapsed().as_secs_f64();
    state.metrics.ticks_total.inc();
    state.metrics.tick_duration_seconds.set(elapsed);

    match &result {
        Ok(series) => {
            debug!("Tick dispatched {} series in {:.3}s", series, elapsed);
            state.tick_stats.record_success(*series, elapsed);
        }
        Err(e) => {
            warn!("Tick failed: {}", e);
            state.metrics.record_tick_failure();
            state.tick_stats.record_failure(&e.to_string(), elapsed);
        }
    }

    result
}

/// Spawns the periodic tick task.
///
/// Backend reads block on sysfs, so each tick runs on the blocking pool.
pub fn spawn_tick_loop(state: SharedState, period: Duration) -> tokio::task::JoinHandle<()> {
    info!("Monitoring tick every {:?}", period);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let tick_state = state.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || run_tick(&tick_state)).await {
                error!("Tick task panicked: {}", e);
            }
        }
    })
}

/// Stops monitoring; called once on exporter shutdown.
pub fn stop_monitor(state: &SharedState) {
    let mut monitor = match state.monitor.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    match monitor.shutdown() {
        Ok(()) => info!("Monitoring stopped"),
        Err(e) => warn!("Monitoring shutdown: {}", e),
    }
    state.metrics.groups.set(0.0);
    state.metrics.reset_groups();
}
