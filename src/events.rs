//! Monitoring event kinds and capability-driven event selection.

use bitflags::bitflags;
use serde::Serialize;

bitflags! {
    /// Set of monitorable event kinds.
    ///
    /// Bit values follow the platform QoS library layout so masks can be
    /// compared with the library's own debug output.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventMask: u32 {
        /// Last level cache occupancy.
        const L3_OCCUP = 0x0001;
        /// Local memory bandwidth.
        const LMEM_BW = 0x0002;
        /// Total memory bandwidth.
        const TMEM_BW = 0x0004;
        /// Remote memory bandwidth.
        const RMEM_BW = 0x0008;
        /// Perf-backed last level cache misses.
        const PERF_LLC_MISS = 0x4000;
        /// Perf-backed instructions per cycle.
        const PERF_IPC = 0x8000;
    }
}

impl EventMask {
    /// Every memory bandwidth event. Any of them enables the `mbm` series.
    pub const MBM: EventMask = EventMask::LMEM_BW
        .union(EventMask::TMEM_BW)
        .union(EventMask::RMEM_BW);

    /// Events that are never offered for monitoring.
    pub const EXCLUDED: EventMask = EventMask::PERF_LLC_MISS;

    /// Returns true if any memory bandwidth event is set.
    pub fn has_mbm(&self) -> bool {
        self.intersects(Self::MBM)
    }
}

impl Serialize for EventMask {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:#06x}", self.bits()))
    }
}

/// A single event the platform reports as monitorable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitoringEvent {
    pub event: EventMask,
    /// Upscaling factor the platform applies to raw counter values.
    pub scale_factor: u32,
}

/// Monitoring capability descriptor reported by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitoringCapability {
    /// Maximum number of resource monitoring IDs.
    pub max_rmid: u32,
    /// Last level cache size in bytes.
    pub l3_size: u64,
    pub events: Vec<MonitoringEvent>,
}

/// Derives the event mask used for every core group from the platform
/// capability descriptor.
///
/// The result is the union of all supported events with
/// [`EventMask::EXCLUDED`] removed.
pub fn select_events(capability: &MonitoringCapability) -> EventMask {
    capability
        .events
        .iter()
        .fold(EventMask::empty(), |mask, e| mask | e.event)
        .difference(EventMask::EXCLUDED)
}
