//! Synthetic monitoring example
//!
//! Runs a few ticks against the synthetic backend and prints every
//! dispatched series.
//!
//! # Running the example
//!
//! ```bash
//! cargo run --example synthetic_ticks -- 0-1 2-3
//! ```
//!
//! Without arguments every core becomes its own group.

use anyhow::Context;
use herakles_rdt_exporter::{ConfigItem, MonitoringContext, Series, SyntheticBackend};
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let groups: Vec<String> = std::env::args().skip(1).collect();

    let mut ctx = MonitoringContext::new(SyntheticBackend::new(4), "demo");
    ctx.configure(&[ConfigItem::strings("Cores", groups)])
        .context("invalid core groups")?;
    ctx.initialize().context("failed to start monitoring")?;

    for tick in 1..=3 {
        let mut sink: Vec<Series> = Vec::new();
        let dispatched = ctx
            .read(&mut sink)
            .with_context(|| format!("tick {} failed", tick))?;
        println!("tick {}: {} series", tick, dispatched);
        for series in &sink {
            println!("  {} = {:?}", series.identifier(), series.values);
        }
        std::thread::sleep(Duration::from_millis(200));
    }

    ctx.shutdown()?;
    Ok(())
}
