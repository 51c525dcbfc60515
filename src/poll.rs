//! Per-tick poll and dispatch.
//!
//! Every tick polls all group handles in one batched backend call, then
//! dispatches the series enabled by each group's event mask. A failed poll
//! dispatches nothing.

use thiserror::Error;
use tracing::{debug, enabled, error, instrument, Level};

use crate::backend::{BackendError, MonitoringBackend, Reading};
use crate::core_group::CoreGroupTable;
use crate::events::EventMask;
use crate::sink::{MetricSink, Series, SeriesType};

/// Errors ending a tick without dispatching.
#[derive(Debug, Error)]
pub enum TickError {
    #[error("monitoring is not running")]
    NotMonitoring,

    #[error("failed to poll monitoring data: {0}")]
    Poll(#[source] BackendError),

    #[error("backend returned {got} readings for {expected} groups")]
    ReadingCount { expected: usize, got: usize },
}

/// Polls every handle once and dispatches the enabled series.
///
/// Returns the number of series dispatched.
#[instrument(skip_all, fields(groups = table.len()))]
pub fn tick<B, S>(
    backend: &mut B,
    table: &CoreGroupTable,
    handles: &mut [B::Handle],
    host: &str,
    sink: &mut S,
) -> Result<usize, TickError>
where
    B: MonitoringBackend,
    S: MetricSink + ?Sized,
{
    let readings = backend.poll_all(handles).map_err(|e| {
        error!("Failed to poll monitoring data: {}", e);
        TickError::Poll(e)
    })?;

    if readings.len() != table.len() {
        error!(
            "Backend returned {} readings for {} groups",
            readings.len(),
            table.len()
        );
        return Err(TickError::ReadingCount {
            expected: table.len(),
            got: readings.len(),
        });
    }

    if enabled!(Level::DEBUG) {
        dump_readings(table, &readings);
    }

    Ok(dispatch_readings(table, &readings, host, sink))
}

/// Dispatches the series of every group, gated by its event mask.
///
/// `readings` must be in table order.
pub fn dispatch_readings<S>(
    table: &CoreGroupTable,
    readings: &[Reading],
    host: &str,
    sink: &mut S,
) -> usize
where
    S: MetricSink + ?Sized,
{
    let mut dispatched = 0;

    for (group, reading) in table.iter().zip(readings) {
        let events = group.events();
        let desc = group.description();

        if events.contains(EventMask::L3_OCCUP) {
            sink.dispatch(Series::new(host, desc, SeriesType::Llc, vec![reading.llc as f64]));
            dispatched += 1;
        }

        if events.contains(EventMask::PERF_IPC) {
            sink.dispatch(Series::new(host, desc, SeriesType::Ipc, vec![reading.ipc]));
            dispatched += 1;
        }

        if events.has_mbm() {
            sink.dispatch(Series::new(host, desc, SeriesType::Mbm, mbm_values(reading)));
            dispatched += 1;
        }
    }

    dispatched
}

/// The six `mbm` values: absolute local, remote, total, then their deltas.
pub fn mbm_values(reading: &Reading) -> Vec<f64> {
    vec![
        reading.mbm_local as f64,
        reading.mbm_remote as f64,
        reading.mbm_total as f64,
        reading.mbm_local_delta as f64,
        reading.mbm_remote_delta as f64,
        reading.mbm_total_delta as f64,
    ]
}

pub fn bytes_to_kb(bytes: f64) -> f64 {
    bytes / 1024.0
}

pub fn bytes_to_mb(bytes: f64) -> f64 {
    bytes / (1024.0 * 1024.0)
}

/// Logs one line per group: LLC in KB, local and remote bandwidth deltas in MB.
fn dump_readings(table: &CoreGroupTable, readings: &[Reading]) {
    debug!("  GROUP      LLC[KB]    MBL[MB]    MBR[MB]");
    for (group, reading) in table.iter().zip(readings) {
        debug!(
            " [{}] {:10.1} {:10.1} {:10.1}",
            group.description(),
            bytes_to_kb(reading.llc as f64),
            bytes_to_mb(reading.mbm_local_delta as f64),
            bytes_to_mb(reading.mbm_remote_delta as f64)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_group::CoreGroup;

    fn reading(seed: u64) -> Reading {
        Reading {
            llc: seed * 1024,
            ipc: seed as f64 / 10.0,
            mbm_local: seed,
            mbm_remote: seed + 1,
            mbm_total: seed + 2,
            mbm_local_delta: seed + 3,
            mbm_remote_delta: seed + 4,
            mbm_total_delta: seed + 5,
        }
    }

    fn make_table(events: EventMask, groups: &[&[u32]]) -> CoreGroupTable {
        let groups = groups
            .iter()
            .map(|cores| CoreGroup::new(format!("{}", cores[0]), cores.to_vec()));
        CoreGroupTable::build(groups, events, 16).unwrap()
    }

    #[test]
    fn dispatch_all_categories() {
        let events = EventMask::L3_OCCUP | EventMask::PERF_IPC | EventMask::LMEM_BW;
        let table = make_table(events, &[&[0], &[1]]);
        let mut sink: Vec<Series> = Vec::new();

        let n = dispatch_readings(&table, &[reading(1), reading(2)], "host", &mut sink);

        assert_eq!(n, 6);
        let types: Vec<_> = sink.iter().map(|s| (s.plugin_instance.as_str(), s.series_type)).collect();
        assert_eq!(
            types,
            vec![
                ("[0]", SeriesType::Llc),
                ("[0]", SeriesType::Ipc),
                ("[0]", SeriesType::Mbm),
                ("[1]", SeriesType::Llc),
                ("[1]", SeriesType::Ipc),
                ("[1]", SeriesType::Mbm),
            ]
        );
        assert_eq!(sink[0].values, vec![1024.0]);
        assert_eq!(sink[1].values, vec![0.1]);
        assert_eq!(sink[5].values, vec![2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn dispatch_gated_by_mask() {
        let table = make_table(EventMask::L3_OCCUP, &[&[0]]);
        let mut sink: Vec<Series> = Vec::new();
        assert_eq!(dispatch_readings(&table, &[reading(3)], "h", &mut sink), 1);
        assert_eq!(sink[0].series_type, SeriesType::Llc);

        let table = make_table(EventMask::empty(), &[&[0]]);
        let mut sink: Vec<Series> = Vec::new();
        assert_eq!(dispatch_readings(&table, &[reading(3)], "h", &mut sink), 0);
    }

    #[test]
    fn any_bandwidth_bit_emits_full_mbm() {
        for bit in [EventMask::LMEM_BW, EventMask::TMEM_BW, EventMask::RMEM_BW] {
            let table = make_table(bit, &[&[0]]);
            let mut sink: Vec<Series> = Vec::new();
            dispatch_readings(&table, &[reading(0)], "h", &mut sink);
            assert_eq!(sink.len(), 1);
            assert_eq!(sink[0].series_type, SeriesType::Mbm);
            assert_eq!(sink[0].values.len(), 6);
        }
    }

    #[test]
    fn raw_values_are_not_converted() {
        let table = make_table(EventMask::L3_OCCUP, &[&[0]]);
        let mut sink: Vec<Series> = Vec::new();
        let r = Reading {
            llc: 3 * 1024 * 1024,
            ..Reading::default()
        };
        dispatch_readings(&table, &[r], "h", &mut sink);
        assert_eq!(sink[0].values, vec![3145728.0]);
    }

    #[test]
    fn unit_conversions() {
        assert_eq!(bytes_to_kb(2048.0), 2.0);
        assert_eq!(bytes_to_mb(3.0 * 1024.0 * 1024.0), 3.0);
    }
}
