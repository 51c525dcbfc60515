//! End-to-end tests of the monitoring context over a fake resctrl mount.

use std::fs;
use std::path::Path;

use herakles_rdt_exporter::{
    ConfigItem, ContextState, EventMask, MonitoringContext, ResctrlBackend, Series, SeriesType,
};
use tempfile::TempDir;

fn fake_mount(features: &str, online: &str) -> (TempDir, ResctrlBackend) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("resctrl");
    fs::create_dir_all(root.join("info/L3_MON")).unwrap();
    fs::create_dir_all(root.join("mon_groups")).unwrap();
    fs::write(root.join("info/L3_MON/mon_features"), features).unwrap();
    fs::write(root.join("info/L3_MON/num_rmids"), "64\n").unwrap();

    let sys_cpu = tmp.path().join("cpu");
    fs::create_dir_all(&sys_cpu).unwrap();
    fs::write(sys_cpu.join("online"), online).unwrap();

    let backend = ResctrlBackend::new(&root).with_sys_cpu_path(&sys_cpu);
    (tmp, backend)
}

fn write_domain(group_dir: &Path, llc: u64, local: u64, total: u64) {
    let dir = group_dir.join("mon_data/mon_L3_00");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("llc_occupancy"), format!("{}\n", llc)).unwrap();
    fs::write(dir.join("mbm_local_bytes"), format!("{}\n", local)).unwrap();
    fs::write(dir.join("mbm_total_bytes"), format!("{}\n", total)).unwrap();
}

#[test]
fn test_configured_groups_become_mon_groups() {
    let (tmp, backend) = fake_mount("llc_occupancy\nmbm_total_bytes\nmbm_local_bytes\n", "0-7\n");
    let mut ctx = MonitoringContext::new(backend, "node1");

    ctx.configure(&[ConfigItem::strings("Cores", ["0-3", "4-7"])])
        .unwrap();
    ctx.initialize().unwrap();

    let mon_groups = tmp.path().join("resctrl/mon_groups");
    assert_eq!(
        fs::read_to_string(mon_groups.join("herakles-rdt-0/cpus_list")).unwrap(),
        "0,1,2,3"
    );
    assert_eq!(
        fs::read_to_string(mon_groups.join("herakles-rdt-1/cpus_list")).unwrap(),
        "4,5,6,7"
    );

    let events = ctx.available_events().unwrap();
    assert!(events.contains(EventMask::RMEM_BW));
    assert!(!events.contains(EventMask::PERF_IPC));

    write_domain(&mon_groups.join("herakles-rdt-0"), 2048, 100, 300);
    write_domain(&mon_groups.join("herakles-rdt-1"), 4096, 0, 0);

    let mut sink: Vec<Series> = Vec::new();
    assert_eq!(ctx.read(&mut sink).unwrap(), 4);
    assert!(sink.iter().all(|s| s.series_type != SeriesType::Ipc));

    let mbm = sink
        .iter()
        .find(|s| s.series_type == SeriesType::Mbm && s.plugin_instance == "[0-3]")
        .unwrap();
    assert_eq!(mbm.values, vec![100.0, 200.0, 300.0, 0.0, 0.0, 0.0]);

    write_domain(&mon_groups.join("herakles-rdt-0"), 2048, 150, 400);
    sink.clear();
    ctx.read(&mut sink).unwrap();
    let mbm = sink
        .iter()
        .find(|s| s.series_type == SeriesType::Mbm && s.plugin_instance == "[0-3]")
        .unwrap();
    assert_eq!(&mbm.values[3..], &[50.0, 50.0, 100.0]);

    ctx.shutdown().unwrap();
    assert_eq!(ctx.state(), ContextState::Shutdown);
}

#[test]
fn test_default_groups_follow_online_cores() {
    let (tmp, backend) = fake_mount("llc_occupancy\n", "0,2\n");
    let mut ctx = MonitoringContext::new(backend, "node1");

    ctx.initialize().unwrap();
    let descriptions: Vec<&str> = ctx.table().iter().map(|g| g.description()).collect();
    assert_eq!(descriptions, vec!["0", "2"]);

    let mon_groups = tmp.path().join("resctrl/mon_groups");
    write_domain(&mon_groups.join("herakles-rdt-0"), 10, 0, 0);
    write_domain(&mon_groups.join("herakles-rdt-1"), 20, 0, 0);

    let mut sink: Vec<Series> = Vec::new();
    assert_eq!(ctx.read(&mut sink).unwrap(), 2);
    assert_eq!(sink[1].plugin_instance, "[2]");
    assert_eq!(sink[1].values, vec![20.0]);
}

#[test]
fn test_missing_counters_fail_the_tick() {
    let (tmp, backend) = fake_mount("llc_occupancy\n", "0-1\n");
    let mut ctx = MonitoringContext::new(backend, "node1");
    ctx.initialize().unwrap();

    // Only the first group has mon_data, the second read_dir fails
    write_domain(&tmp.path().join("resctrl/mon_groups/herakles-rdt-0"), 10, 0, 0);

    let mut sink: Vec<Series> = Vec::new();
    assert!(ctx.read(&mut sink).is_err());
    assert!(sink.is_empty());
}
