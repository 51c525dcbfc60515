//! Platform description reported by a monitoring backend.

use serde::Serialize;

use crate::events::MonitoringCapability;

/// A logical core as enumerated by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CpuCore {
    /// Logical core index (the OS CPU number).
    pub lcore: u32,
    /// Physical package the core belongs to.
    pub socket: u32,
}

/// Everything the core-group model needs to know about the platform.
#[derive(Debug, Clone, Default)]
pub struct Platform {
    /// Cores in platform enumeration order.
    pub cores: Vec<CpuCore>,
    /// Monitoring capability, `None` when the platform has none.
    pub monitoring: Option<MonitoringCapability>,
}

impl Platform {
    /// Number of distinct sockets among the enumerated cores.
    pub fn num_sockets(&self) -> usize {
        let mut sockets: Vec<u32> = self.cores.iter().map(|c| c.socket).collect();
        sockets.sort_unstable();
        sockets.dedup();
        sockets.len()
    }
}
