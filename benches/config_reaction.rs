//! Performance benchmarks for config reactions
//!
//! Covers the hot paths of a change notification: parsing and validating the
//! file, the self-write check and a full repair cycle.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mousefix_helper::{
    config::{default_config, ConfigParser, ConfigSchema, ConfigValidator, MonitorConfig, RepairPolicy},
    monitor::diagnostics::RecordingSink,
    ConfigFileMonitor, ConfigMap, ConfigValue,
};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn create_parser() -> ConfigParser {
    ConfigParser::new(ConfigValidator::new(ConfigSchema::default()).expect("validator"))
}

/// Valid config with `apps` excluded applications
fn create_config(apps: usize) -> ConfigMap {
    let mut config = default_config();
    config.insert(
        "ExcludedApps".to_string(),
        ConfigValue::Array(
            (0..apps)
                .map(|i| ConfigValue::from(format!("com.example.app{}", i)))
                .collect(),
        ),
    );
    config
}

fn create_monitor(dir: &TempDir) -> ConfigFileMonitor {
    let config = MonitorConfig {
        repair_policy: RepairPolicy::DefaultsOnly,
        max_backups: 1,
        ..MonitorConfig::for_path(dir.path().join("config.json"))
    };
    ConfigFileMonitor::new(&config, Arc::new(RecordingSink::new())).expect("monitor")
}

fn bench_parse(c: &mut Criterion) {
    let parser = create_parser();
    let mut group = c.benchmark_group("parse");

    for apps in [0usize, 10, 100].iter() {
        let bytes = parser.serialize(&create_config(*apps)).expect("serialize");
        group.bench_with_input(BenchmarkId::new("valid", apps), &bytes, |b, bytes| {
            b.iter(|| parser.parse(black_box(bytes)))
        });
    }

    group.bench_function("malformed", |b| {
        b.iter(|| parser.parse(black_box(b"{\"ScrollSpeed\": 5,,}")))
    });

    group.finish();
}

fn bench_unchanged_reaction(c: &mut Criterion) {
    let dir = TempDir::new().expect("tempdir");
    let monitor = create_monitor(&dir);
    monitor.store().config();

    c.bench_function("unchanged_reaction", |b| {
        b.iter(|| black_box(monitor.react_to_config_file_change()))
    });
}

fn bench_repair_cycle(c: &mut Criterion) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.json");
    let monitor = create_monitor(&dir);
    monitor.store().config();

    c.bench_function("repair_cycle", |b| {
        b.iter_with_setup(
            || fs::write(&path, "{not json").expect("corrupt config"),
            |_| black_box(monitor.react_to_config_file_change()),
        )
    });
}

criterion_group!(
    benches,
    bench_parse,
    bench_unchanged_reaction,
    bench_repair_cycle
);
criterion_main!(benches);
