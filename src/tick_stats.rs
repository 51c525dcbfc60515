//! Tick statistics for the exporter.
//!
//! This module tracks how monitoring ticks went: how many ran, how many
//! failed, how long they took and how many series they dispatched.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock as StdRwLock};
use std::time::Instant;

/// Running statistics for a single metric.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    /// Returns `(last, avg, max, min, count)`.
    pub fn snapshot(&self) -> (f64, f64, f64, f64, u64) {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min, s.count)
        } else {
            (0.0, 0.0, 0.0, 0.0, 0)
        }
    }
}

/// Outcome of the most recent tick.
#[derive(Debug, Clone, Serialize)]
pub struct LastTick {
    pub time: DateTime<Utc>,
    pub ok: bool,
    pub series: usize,
    pub error: Option<String>,
}

pub struct TickStats {
    pub total_ticks: AtomicU64,
    pub failed_ticks: AtomicU64,
    pub series_dispatched: Stat,
    pub tick_duration_seconds: Stat,
    pub start_time: Instant,
    last_tick: StdRwLock<Option<LastTick>>,
}

impl Default for TickStats {
    fn default() -> Self {
        Self {
            total_ticks: AtomicU64::new(0),
            failed_ticks: AtomicU64::new(0),
            series_dispatched: Stat::default(),
            tick_duration_seconds: Stat::default(),
            start_time: Instant::now(),
            last_tick: StdRwLock::new(None),
        }
    }
}

impl TickStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_success(&self, series: usize, duration_seconds: f64) {
        self.total_ticks.fetch_add(1, Ordering::Relaxed);
        self.series_dispatched.add_sample(series as f64);
        self.tick_duration_seconds.add_sample(duration_seconds);
        self.set_last(LastTick {
            time: Utc::now(),
            ok: true,
            series,
            error: None,
        });
    }

    pub fn record_failure(&self, error: &str, duration_seconds: f64) {
        self.total_ticks.fetch_add(1, Ordering::Relaxed);
        self.failed_ticks.fetch_add(1, Ordering::Relaxed);
        self.tick_duration_seconds.add_sample(duration_seconds);
        self.set_last(LastTick {
            time: Utc::now(),
            ok: false,
            series: 0,
            error: Some(error.to_string()),
        });
    }

    fn set_last(&self, tick: LastTick) {
        if let Ok(mut guard) = self.last_tick.write() {
            *guard = Some(tick);
        }
    }

    pub fn last_tick(&self) -> Option<LastTick> {
        self.last_tick.read().ok().and_then(|guard| guard.clone())
    }

    pub fn get_success_rate(&self) -> f64 {
        let total = self.total_ticks.load(Ordering::Relaxed);
        let failed = self.failed_ticks.load(Ordering::Relaxed);
        if total == 0 {
            100.0
        } else {
            ((total - failed) as f64 / total as f64) * 100.0
        }
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn render_table(&self) -> String {
        let (sd_cur, sd_avg, sd_max, sd_min, _) = self.series_dispatched.snapshot();
        let (td_cur, td_avg, td_max, td_min, _) = self.tick_duration_seconds.snapshot();
        let total = self.total_ticks.load(Ordering::Relaxed);
        let failed = self.failed_ticks.load(Ordering::Relaxed);
        let last = self
            .last_tick()
            .map(|t| t.time.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "N/A".to_string());

        let left_col = 26usize;
        let col_w = 12usize;

        let mut out = String::new();

        writeln!(out, "TICK STATISTICS").ok();
        writeln!(out, "===============").ok();
        writeln!(out).ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();
        writeln!(out, "{}", "-".repeat(left_col + 4 * (col_w + 3))).ok();

        writeln!(
            out,
            "{:left$} | {:>col$.0} | {:>col$.1} | {:>col$.0} | {:>col$.0}",
            "series dispatched",
            sd_cur,
            sd_avg,
            sd_max,
            sd_min,
            left = left_col,
            col = col_w
        )
        .ok();
        writeln!(
            out,
            "{:left$} | {:>col$.4} | {:>col$.4} | {:>col$.4} | {:>col$.4}",
            "tick duration (s)",
            td_cur,
            td_avg,
            td_max,
            td_min,
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out).ok();
        writeln!(out, "{:left$} : {}", "total ticks", total, left = left_col).ok();
        writeln!(out, "{:left$} : {}", "failed ticks", failed, left = left_col).ok();
        writeln!(
            out,
            "{:left$} : {:.1}%",
            "success rate",
            self.get_success_rate(),
            left = left_col
        )
        .ok();
        writeln!(out, "{:left$} : {}", "last tick", last, left = left_col).ok();

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_stat_tracks_extremes() {
        let mut stat = RunningStat::default();
        stat.add(3.0);
        stat.add(1.0);
        stat.add(5.0);
        assert_eq!(stat.min, 1.0);
        assert_eq!(stat.max, 5.0);
        assert_eq!(stat.last, 5.0);
        assert_eq!(stat.avg(), 3.0);
    }

    #[test]
    fn failures_lower_success_rate() {
        let stats = TickStats::new();
        assert_eq!(stats.get_success_rate(), 100.0);
        assert!(stats.last_tick().is_none());

        stats.record_success(6, 0.01);
        stats.record_failure("poll failed", 0.02);

        assert_eq!(stats.total_ticks.load(Ordering::Relaxed), 2);
        assert_eq!(stats.get_success_rate(), 50.0);
        let last = stats.last_tick().unwrap();
        assert!(!last.ok);
        assert_eq!(last.error.as_deref(), Some("poll failed"));
    }

    #[test]
    fn table_lists_counters() {
        let stats = TickStats::new();
        stats.record_success(3, 0.5);
        let table = stats.render_table();
        assert!(table.contains("total ticks"));
        assert!(table.contains("series dispatched"));
        assert!(!table.contains("N/A"));
    }
}
