//! Groups command implementation.
//!
//! Resolves the configured core groups against the platform and prints the
//! resulting table.

use herakles_rdt_exporter::{rangelist, CoreGroupTable, EventMask};
use std::fmt::Write as FmtWrite;

use crate::config::Config;
use crate::monitor::{build_monitor, resolve_hostname};

/// Lists the resolved core groups.
pub fn command_groups(verbose: bool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let host = resolve_hostname(config);
    let mut monitor = build_monitor(config, &host)?;
    monitor.configure(&config.rdt_items())?;

    let events = monitor.available_events().unwrap_or_else(EventMask::empty);
    print!(
        "{}",
        render_groups(monitor.table(), events, monitor.backend_name(), verbose)
    );

    if let Err(e) = monitor.shutdown() {
        eprintln!("⚠️  {}", e);
    }
    Ok(())
}

/// Renders the table the way the debug dump lays it out.
pub fn render_groups(
    table: &CoreGroupTable,
    events: EventMask,
    backend: &str,
    verbose: bool,
) -> String {
    let mut out = String::new();

    writeln!(out, "📋 Core Groups ({} backend)", backend).ok();
    writeln!(out, "=============================").ok();
    writeln!(out, "Available events: {:#x} {:?}", events.bits(), events).ok();
    writeln!(out, "Groups: {} of {}", table.len(), table.capacity()).ok();
    writeln!(out).ok();

    for (i, group) in table.iter().enumerate() {
        let cores: Vec<u64> = group.cores().iter().map(|&c| u64::from(c)).collect();
        writeln!(out, "group[{}]: [{}]", i, group.description()).ok();
        writeln!(out, "  cores:  {}", rangelist::render(&cores)).ok();
        writeln!(out, "  events: {:#x}", group.events().bits()).ok();
        if verbose {
            let list: Vec<String> = group.cores().iter().map(|c| c.to_string()).collect();
            writeln!(out, "  count:  {}", list.len()).ok();
            writeln!(out, "  list:   {}", list.join(" ")).ok();
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use herakles_rdt_exporter::CoreGroup;

    #[test]
    fn renders_each_group() {
        let events = EventMask::L3_OCCUP | EventMask::PERF_IPC;
        let table = CoreGroupTable::build(
            vec![
                CoreGroup::new("0-3", vec![0, 1, 2, 3]),
                CoreGroup::new("8", vec![8]),
            ],
            events,
            16,
        )
        .unwrap();

        let text = render_groups(&table, events, "synthetic", true);
        assert!(text.contains("group[0]: [0-3]"));
        assert!(text.contains("group[1]: [8]"));
        assert!(text.contains("events: 0x8001"));
        assert!(text.contains("list:   0 1 2 3"));
        assert!(text.contains("Groups: 2 of 16"));
    }
}
