//! Linux resctrl filesystem backend.
//!
//! Monitoring groups are created under `<root>/mon_groups`, one per core
//! group, by writing the group's cores to `cpus_list`. Counters are read from
//! `mon_data/mon_L3_<id>/` and summed over all L3 domains.
//!
//! resctrl exposes cumulative local and total bandwidth byte counters. The
//! remote figure is derived as `total - local`; deltas are computed against
//! the previous poll. IPC is not available through resctrl.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{BackendError, MonitoringBackend, Reading};
use crate::core_group::{CoreGroup, MAX_CORES};
use crate::events::{EventMask, MonitoringCapability, MonitoringEvent};
use crate::platform::{CpuCore, Platform};
use crate::rangelist;

/// Default resctrl mount point.
pub const DEFAULT_RESCTRL_PATH: &str = "/sys/fs/resctrl";
/// Default sysfs CPU directory.
pub const DEFAULT_SYS_CPU_PATH: &str = "/sys/devices/system/cpu";

const GROUP_PREFIX: &str = "herakles-rdt";

const LLC_OCCUPANCY: &str = "llc_occupancy";
const MBM_LOCAL: &str = "mbm_local_bytes";
const MBM_TOTAL: &str = "mbm_total_bytes";

/// Monitoring group created in the resctrl filesystem.
#[derive(Debug)]
pub struct ResctrlGroup {
    name: String,
    dir: PathBuf,
    previous: Option<(u64, u64)>,
}

impl ResctrlGroup {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Backend reading RDT counters through resctrl.
pub struct ResctrlBackend {
    root: PathBuf,
    sys_cpu: PathBuf,
    open: bool,
    next_group: usize,
}

impl Default for ResctrlBackend {
    fn default() -> Self {
        Self::new(DEFAULT_RESCTRL_PATH)
    }
}

impl ResctrlBackend {
    /// Creates a backend for the resctrl filesystem mounted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sys_cpu: PathBuf::from(DEFAULT_SYS_CPU_PATH),
            open: false,
            next_group: 0,
        }
    }

    /// Overrides the sysfs CPU directory used for core discovery.
    pub fn with_sys_cpu_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.sys_cpu = path.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn mon_info_dir(&self) -> PathBuf {
        self.root.join("info").join("L3_MON")
    }

    fn discover_cores(&self) -> Result<Vec<CpuCore>, BackendError> {
        let online = self.sys_cpu.join("online");
        let list = read_trimmed(&online)?;
        let lcores = rangelist::parse(&list, MAX_CORES).map_err(|e| BackendError::InvalidData {
            path: online.clone(),
            reason: e.to_string(),
        })?;

        lcores
            .into_iter()
            .map(|lcore| {
                let lcore = u32::try_from(lcore).map_err(|_| BackendError::InvalidData {
                    path: online.clone(),
                    reason: format!("core index {} out of range", lcore),
                })?;
                let package = self
                    .sys_cpu
                    .join(format!("cpu{}", lcore))
                    .join("topology")
                    .join("physical_package_id");
                let socket = read_trimmed(&package)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);
                Ok(CpuCore { lcore, socket })
            })
            .collect()
    }

    fn discover_capability(&self) -> Result<Option<MonitoringCapability>, BackendError> {
        let info = self.mon_info_dir();
        if !info.is_dir() {
            return Ok(None);
        }

        let features_path = info.join("mon_features");
        let features = read_trimmed(&features_path)?;

        let mut mask = EventMask::empty();
        for feature in features.lines().map(str::trim) {
            match feature {
                LLC_OCCUPANCY => mask |= EventMask::L3_OCCUP,
                MBM_LOCAL => mask |= EventMask::LMEM_BW,
                MBM_TOTAL => mask |= EventMask::TMEM_BW,
                "" => {}
                other => debug!("Ignoring unknown resctrl monitoring feature '{}'", other),
            }
        }
        if mask.contains(EventMask::LMEM_BW | EventMask::TMEM_BW) {
            mask |= EventMask::RMEM_BW;
        }

        let max_rmid = read_trimmed(&info.join("num_rmids"))
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        let events = mask
            .iter()
            .map(|event| MonitoringEvent {
                event,
                scale_factor: 1,
            })
            .collect();

        Ok(Some(MonitoringCapability {
            max_rmid,
            l3_size: 0,
            events,
        }))
    }

    /// Sums one counter file over every L3 monitoring domain of a group.
    fn read_counter(mon_data: &Path, file: &str) -> Result<Option<u64>, BackendError> {
        let entries = fs::read_dir(mon_data).map_err(|e| BackendError::io(mon_data, e))?;

        let mut total: Option<u64> = None;
        for entry in entries {
            let entry = entry.map_err(|e| BackendError::io(mon_data, e))?;
            if !entry.file_name().to_string_lossy().starts_with("mon_L3_") {
                continue;
            }
            let path = entry.path().join(file);
            if !path.exists() {
                continue;
            }
            let text = read_trimmed(&path)?;
            let value: u64 = text.parse().map_err(|_| BackendError::InvalidData {
                path: path.clone(),
                reason: format!("unexpected counter value '{}'", text),
            })?;
            total = Some(total.unwrap_or(0).saturating_add(value));
        }

        Ok(total)
    }

    /// Reads one group; returns the reading and the new delta baseline.
    fn poll_group(group: &ResctrlGroup) -> Result<(Reading, (u64, u64)), BackendError> {
        let mon_data = group.dir.join("mon_data");

        let llc = Self::read_counter(&mon_data, LLC_OCCUPANCY)?.unwrap_or(0);
        let local = Self::read_counter(&mon_data, MBM_LOCAL)?.unwrap_or(0);
        let total = Self::read_counter(&mon_data, MBM_TOTAL)?.unwrap_or(0);
        let remote = total.saturating_sub(local);

        let (local_delta, total_delta) = match group.previous {
            Some((prev_local, prev_total)) => (
                local.saturating_sub(prev_local),
                total.saturating_sub(prev_total),
            ),
            None => (0, 0),
        };

        let reading = Reading {
            llc,
            ipc: 0.0,
            mbm_local: local,
            mbm_remote: remote,
            mbm_total: total,
            mbm_local_delta: local_delta,
            mbm_remote_delta: total_delta.saturating_sub(local_delta),
            mbm_total_delta: total_delta,
        };
        Ok((reading, (local, total)))
    }
}

impl MonitoringBackend for ResctrlBackend {
    type Handle = ResctrlGroup;

    fn name(&self) -> &'static str {
        "resctrl"
    }

    fn open(&mut self) -> Result<Platform, BackendError> {
        if !self.root.join("info").is_dir() {
            return Err(BackendError::Unsupported(format!(
                "resctrl filesystem not mounted at {}",
                self.root.display()
            )));
        }

        let cores = self.discover_cores()?;
        let monitoring = self.discover_capability()?;

        self.open = true;
        self.next_group = 0;
        info!(
            "resctrl backend opened at {} ({} cores)",
            self.root.display(),
            cores.len()
        );

        Ok(Platform { cores, monitoring })
    }

    fn start_group(&mut self, group: &CoreGroup) -> Result<Self::Handle, BackendError> {
        if !self.open {
            return Err(BackendError::NotOpen);
        }

        let name = format!("{}-{}", GROUP_PREFIX, self.next_group);
        let dir = self.root.join("mon_groups").join(&name);

        match fs::create_dir(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                // Left behind by an instance that was not shut down properly.
                warn!("Reusing existing resctrl monitoring group {}", dir.display());
            }
            Err(e) => return Err(BackendError::io(&dir, e)),
        }

        let cpus_list = dir.join("cpus_list");
        let cores: Vec<u64> = group.cores().iter().map(|&c| u64::from(c)).collect();
        if let Err(e) = fs::write(&cpus_list, rangelist::render(&cores)) {
            // rmdir releases the RMID held by the group
            if let Err(rm) = fs::remove_dir(&dir) {
                warn!(
                    "Failed to remove resctrl group {}: {}",
                    dir.display(),
                    rm
                );
            }
            return Err(BackendError::io(&cpus_list, e));
        }

        self.next_group += 1;
        debug!(
            "Started resctrl group {} for [{}]",
            name,
            group.description()
        );

        Ok(ResctrlGroup {
            name,
            dir,
            previous: None,
        })
    }

    fn poll_all(&mut self, handles: &mut [Self::Handle]) -> Result<Vec<Reading>, BackendError> {
        if !self.open {
            return Err(BackendError::NotOpen);
        }
        let polled = handles
            .iter()
            .map(Self::poll_group)
            .collect::<Result<Vec<_>, _>>()?;

        // Baselines only move once the whole batch has been read
        let mut readings = Vec::with_capacity(polled.len());
        for (handle, (reading, baseline)) in handles.iter_mut().zip(polled) {
            handle.previous = Some(baseline);
            readings.push(reading);
        }
        Ok(readings)
    }

    fn stop_group(&mut self, handle: Self::Handle) -> Result<(), BackendError> {
        fs::remove_dir(&handle.dir).map_err(|e| BackendError::io(&handle.dir, e))?;
        debug!("Stopped resctrl group {}", handle.name);
        Ok(())
    }

    fn close(&mut self) -> Result<(), BackendError> {
        self.open = false;
        Ok(())
    }
}

fn read_trimmed(path: &Path) -> Result<String, BackendError> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| BackendError::io(path, e))
}
