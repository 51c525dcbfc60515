//! Synthetic backend producing plausible RDT telemetry.
//!
//! Used on hosts without resctrl support, by the `test` subcommand and in
//! demos. Bandwidth counters accumulate across polls so deltas behave like
//! real hardware counters.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::{BackendError, MonitoringBackend, Reading};
use crate::core_group::CoreGroup;
use crate::events::{EventMask, MonitoringCapability, MonitoringEvent};
use crate::platform::{CpuCore, Platform};

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

/// Monitoring context of one synthetic group.
#[derive(Debug)]
pub struct SyntheticHandle {
    num_cores: u64,
    mbm_local: u64,
    mbm_remote: u64,
}

/// Backend generating random counter values.
pub struct SyntheticBackend {
    num_cores: usize,
    cores_per_socket: usize,
    rng: StdRng,
    open: bool,
    started: usize,
}

impl SyntheticBackend {
    /// Creates a backend reporting `num_cores` cores on a single socket.
    pub fn new(num_cores: usize) -> Self {
        Self::with_rng(num_cores, StdRng::from_entropy())
    }

    /// Creates a backend with reproducible values.
    pub fn with_seed(num_cores: usize, seed: u64) -> Self {
        Self::with_rng(num_cores, StdRng::seed_from_u64(seed))
    }

    fn with_rng(num_cores: usize, rng: StdRng) -> Self {
        Self {
            num_cores,
            cores_per_socket: num_cores.max(1),
            rng,
            open: false,
            started: 0,
        }
    }

    /// Spreads the cores over sockets of `cores_per_socket` cores each.
    pub fn cores_per_socket(mut self, cores_per_socket: usize) -> Self {
        self.cores_per_socket = cores_per_socket.max(1);
        self
    }

    /// Number of groups currently started.
    pub fn started_groups(&self) -> usize {
        self.started
    }
}

impl MonitoringBackend for SyntheticBackend {
    type Handle = SyntheticHandle;

    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn open(&mut self) -> Result<Platform, BackendError> {
        let cores = (0..self.num_cores)
            .map(|i| CpuCore {
                lcore: i as u32,
                socket: (i / self.cores_per_socket) as u32,
            })
            .collect();

        // Reports the LLC miss event too, it is up to the caller to drop it.
        let events = [
            EventMask::L3_OCCUP,
            EventMask::LMEM_BW,
            EventMask::TMEM_BW,
            EventMask::RMEM_BW,
            EventMask::PERF_LLC_MISS,
            EventMask::PERF_IPC,
        ]
        .into_iter()
        .map(|event| MonitoringEvent {
            event,
            scale_factor: 1,
        })
        .collect();

        self.open = true;
        debug!("Synthetic backend opened with {} cores", self.num_cores);

        Ok(Platform {
            cores,
            monitoring: Some(MonitoringCapability {
                max_rmid: self.num_cores as u32,
                l3_size: 32 * MIB,
                events,
            }),
        })
    }

    fn start_group(&mut self, group: &CoreGroup) -> Result<Self::Handle, BackendError> {
        if !self.open {
            return Err(BackendError::NotOpen);
        }
        if let Some(core) = group
            .cores()
            .iter()
            .find(|&&c| c as usize >= self.num_cores)
        {
            return Err(BackendError::Other(format!(
                "core {} does not exist, platform has {} cores",
                core, self.num_cores
            )));
        }

        self.started += 1;
        Ok(SyntheticHandle {
            num_cores: group.cores().len() as u64,
            mbm_local: 0,
            mbm_remote: 0,
        })
    }

    fn poll_all(&mut self, handles: &mut [Self::Handle]) -> Result<Vec<Reading>, BackendError> {
        if !self.open {
            return Err(BackendError::NotOpen);
        }

        let rng = &mut self.rng;
        let readings = handles
            .iter_mut()
            .map(|handle| {
                let local_delta = handle.num_cores * rng.gen_range(0..64 * MIB);
                let remote_delta = handle.num_cores * rng.gen_range(0..8 * MIB);
                handle.mbm_local += local_delta;
                handle.mbm_remote += remote_delta;

                Reading {
                    llc: handle.num_cores * rng.gen_range(256 * KIB..2 * MIB),
                    ipc: rng.gen_range(0.3..2.5),
                    mbm_local: handle.mbm_local,
                    mbm_remote: handle.mbm_remote,
                    mbm_total: handle.mbm_local + handle.mbm_remote,
                    mbm_local_delta: local_delta,
                    mbm_remote_delta: remote_delta,
                    mbm_total_delta: local_delta + remote_delta,
                }
            })
            .collect();

        Ok(readings)
    }

    fn stop_group(&mut self, _handle: Self::Handle) -> Result<(), BackendError> {
        self.started = self.started.saturating_sub(1);
        Ok(())
    }

    fn close(&mut self) -> Result<(), BackendError> {
        self.open = false;
        Ok(())
    }
}
