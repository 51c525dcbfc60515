//! Prometheus metrics definitions for herakles-rdt-exporter.
//!
//! Every dispatched series lands in one of three gauge vectors, labelled by
//! host and core group instance. The exporter also tracks its own tick
//! activity.

use herakles_rdt_exporter::sink::{MetricSink, Series, SeriesType, MBM_VALUE_NAMES};
use prometheus::{Counter, Gauge, GaugeVec, Opts, Registry};
use tracing::warn;

/// Collection of Prometheus metrics exposed on `/metrics`.
#[derive(Clone)]
pub struct RdtMetrics {
    // ========== Core Group Metrics ==========
    pub llc_bytes: GaugeVec, // labels: host, instance
    pub ipc: GaugeVec,       // labels: host, instance
    pub mbm_bytes: GaugeVec, // labels: host, instance, kind

    // ========== Exporter Metrics ==========
    pub ticks_total: Counter,
    pub tick_failures_total: Counter,
    pub groups: Gauge,
    pub tick_duration_seconds: Gauge,
}

impl RdtMetrics {
    /// Creates and registers all Prometheus metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, Box<dyn std::error::Error>> {
        // ========== Core Group Metrics ==========
        let llc_bytes = GaugeVec::new(
            Opts::new(
                "herakles_rdt_llc_bytes",
                "Last level cache occupancy of the core group in bytes",
            ),
            &["host", "instance"],
        )?;
        let ipc = GaugeVec::new(
            Opts::new(
                "herakles_rdt_ipc",
                "Instructions per cycle of the core group",
            ),
            &["host", "instance"],
        )?;
        let mbm_bytes = GaugeVec::new(
            Opts::new(
                "herakles_rdt_mbm_bytes",
                "Memory bandwidth counters of the core group in bytes (absolute and per tick)",
            ),
            &["host", "instance", "kind"],
        )?;

        // ========== Exporter Metrics ==========
        let ticks_total = Counter::new(
            "herakles_rdt_exporter_ticks_total",
            "Total number of monitoring ticks",
        )?;
        let tick_failures_total = Counter::new(
            "herakles_rdt_exporter_tick_failures_total",
            "Total number of monitoring ticks that dispatched nothing because polling failed",
        )?;
        let groups = Gauge::new(
            "herakles_rdt_exporter_groups",
            "Number of monitored core groups",
        )?;
        let tick_duration_seconds = Gauge::new(
            "herakles_rdt_exporter_tick_duration_seconds",
            "Duration of the last monitoring tick in seconds",
        )?;

        registry.register(Box::new(llc_bytes.clone()))?;
        registry.register(Box::new(ipc.clone()))?;
        registry.register(Box::new(mbm_bytes.clone()))?;

        registry.register(Box::new(ticks_total.clone()))?;
        registry.register(Box::new(tick_failures_total.clone()))?;
        registry.register(Box::new(groups.clone()))?;
        registry.register(Box::new(tick_duration_seconds.clone()))?;

        Ok(Self {
            llc_bytes,
            ipc,
            mbm_bytes,
            ticks_total,
            tick_failures_total,
            groups,
            tick_duration_seconds,
        })
    }

    /// Drops every core group series, e.g. after the group table changed.
    pub fn reset_groups(&self) {
        self.llc_bytes.reset();
        self.ipc.reset();
        self.mbm_bytes.reset();
    }

    /// Counts a failed tick and drops the stale group series it left behind.
    pub fn record_tick_failure(&self) {
        self.tick_failures_total.inc();
        self.reset_groups();
    }
}

/// Sink writing dispatched series into the Prometheus gauges.
pub struct PrometheusSink<'a> {
    metrics: &'a RdtMetrics,
}

impl<'a> PrometheusSink<'a> {
    pub fn new(metrics: &'a RdtMetrics) -> Self {
        Self { metrics }
    }
}

impl MetricSink for PrometheusSink<'_> {
    fn dispatch(&mut self, series: Series) {
        let host = series.host.as_str();
        let instance = series.plugin_instance.as_str();

        if series.values.len() != series.series_type.value_count() {
            warn!(
                "Dropping {}: expected {} values, got {}",
                series.identifier(),
                series.series_type.value_count(),
                series.values.len()
            );
            return;
        }

        match series.series_type {
            SeriesType::Llc => self
                .metrics
                .llc_bytes
                .with_label_values(&[host, instance])
                .set(series.values[0]),
            SeriesType::Ipc => self
                .metrics
                .ipc
                .with_label_values(&[host, instance])
                .set(series.values[0]),
            SeriesType::Mbm => {
                for (kind, value) in MBM_VALUE_NAMES.into_iter().zip(&series.values) {
                    self.metrics
                        .mbm_bytes
                        .with_label_values(&[host, instance, kind])
                        .set(*value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, TextEncoder};

    fn render(registry: &Registry) -> String {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn sink_sets_gauges() {
        let registry = Registry::new();
        let metrics = RdtMetrics::new(&registry).unwrap();
        let mut sink = PrometheusSink::new(&metrics);

        sink.dispatch(Series::new("node1", "0-3", SeriesType::Llc, vec![4096.0]));
        sink.dispatch(Series::new("node1", "0-3", SeriesType::Ipc, vec![1.25]));
        sink.dispatch(Series::new(
            "node1",
            "0-3",
            SeriesType::Mbm,
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        ));

        assert_eq!(
            metrics
                .llc_bytes
                .with_label_values(&["node1", "[0-3]"])
                .get(),
            4096.0
        );
        assert_eq!(
            metrics
                .mbm_bytes
                .with_label_values(&["node1", "[0-3]", "remote_delta"])
                .get(),
            5.0
        );

        let text = render(&registry);
        assert!(text.contains("herakles_rdt_ipc{host=\"node1\",instance=\"[0-3]\"} 1.25"));
        assert!(text.contains("kind=\"total_delta\""));
    }

    #[test]
    fn wrong_value_count_is_dropped() {
        let registry = Registry::new();
        let metrics = RdtMetrics::new(&registry).unwrap();
        let mut sink = PrometheusSink::new(&metrics);

        sink.dispatch(Series::new("node1", "1", SeriesType::Mbm, vec![1.0]));
        assert!(!render(&registry).contains("herakles_rdt_mbm_bytes{"));
    }

    #[test]
    fn failed_tick_clears_previous_values() {
        let registry = Registry::new();
        let metrics = RdtMetrics::new(&registry).unwrap();
        let mut sink = PrometheusSink::new(&metrics);
        sink.dispatch(Series::new("node1", "0-3", SeriesType::Llc, vec![4096.0]));

        metrics.record_tick_failure();

        let text = render(&registry);
        assert!(!text.contains("herakles_rdt_llc_bytes{"));
        assert!(text.contains("herakles_rdt_exporter_tick_failures_total 1"));
    }

    #[test]
    fn reset_drops_group_series() {
        let registry = Registry::new();
        let metrics = RdtMetrics::new(&registry).unwrap();
        PrometheusSink::new(&metrics).dispatch(Series::new(
            "node1",
            "2",
            SeriesType::Llc,
            vec![1.0],
        ));
        metrics.reset_groups();
        assert!(!render(&registry).contains("herakles_rdt_llc_bytes{"));
    }
}
