//! Metric series and the sink they are dispatched to.

use serde::Serialize;
use std::fmt;

/// Source name attached to every series.
pub const PLUGIN_NAME: &str = "rdtmon";

/// Kind of a dispatched series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesType {
    /// Last level cache occupancy, one value.
    Llc,
    /// Instructions per cycle, one value.
    Ipc,
    /// Memory bandwidth, six values.
    Mbm,
}

impl SeriesType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesType::Llc => "llc",
            SeriesType::Ipc => "ipc",
            SeriesType::Mbm => "mbm",
        }
    }

    /// Number of values a series of this type carries.
    pub fn value_count(&self) -> usize {
        match self {
            SeriesType::Llc | SeriesType::Ipc => 1,
            SeriesType::Mbm => MBM_VALUE_NAMES.len(),
        }
    }
}

impl fmt::Display for SeriesType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names of the `mbm` values, in dispatch order.
pub const MBM_VALUE_NAMES: [&str; 6] = [
    "local",
    "remote",
    "total",
    "local_delta",
    "remote_delta",
    "total_delta",
];

/// One dispatched value list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub host: String,
    pub plugin: &'static str,
    /// Group description wrapped in brackets, e.g. `[0-3]`.
    pub plugin_instance: String,
    #[serde(rename = "type")]
    pub series_type: SeriesType,
    pub values: Vec<f64>,
}

impl Series {
    pub fn new(host: &str, group: &str, series_type: SeriesType, values: Vec<f64>) -> Self {
        Self {
            host: host.to_string(),
            plugin: PLUGIN_NAME,
            plugin_instance: instance_label(group),
            series_type,
            values,
        }
    }

    /// Full identifier `host/plugin-instance/type`.
    pub fn identifier(&self) -> String {
        format!(
            "{}/{}-{}/{}",
            self.host, self.plugin, self.plugin_instance, self.series_type
        )
    }
}

/// Instance label of a group: its description in square brackets.
pub fn instance_label(description: &str) -> String {
    format!("[{}]", description)
}

/// Receiver of dispatched series.
pub trait MetricSink {
    fn dispatch(&mut self, series: Series);
}

/// Collects series in memory.
impl MetricSink for Vec<Series> {
    fn dispatch(&mut self, series: Series) {
        self.push(series);
    }
}

impl<S: MetricSink + ?Sized> MetricSink for &mut S {
    fn dispatch(&mut self, series: Series) {
        (**self).dispatch(series);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_identity() {
        let series = Series::new("node1", "0-3", SeriesType::Llc, vec![1.0]);
        assert_eq!(series.plugin, "rdtmon");
        assert_eq!(series.plugin_instance, "[0-3]");
        assert_eq!(series.identifier(), "node1/rdtmon-[0-3]/llc");
    }

    #[test]
    fn value_counts() {
        assert_eq!(SeriesType::Llc.value_count(), 1);
        assert_eq!(SeriesType::Ipc.value_count(), 1);
        assert_eq!(SeriesType::Mbm.value_count(), 6);
    }

    #[test]
    fn vec_sink_records() {
        fn forward<S: MetricSink>(mut sink: S) {
            sink.dispatch(Series::new("h", "1", SeriesType::Ipc, vec![0.5]));
        }

        let mut sink: Vec<Series> = Vec::new();
        forward(&mut sink);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].series_type, SeriesType::Ipc);
    }
}
