//! Stress tests for LoRaMetrics
//!
//! Run with: cargo test --release stress -- --ignored

use lorametrics::*;
use lorametrics_testdata::{generate_sweep, Scenario};
use std::time::{Duration, Instant};

#[test]
#[ignore] // Run manually with --ignored
fn stress_test_full_catalog() {
    let config = Scenario::MixedInterference
        .config()
        .with_messages(20)
        .with_shadowing(4.0)
        .with_contention(8)
        .with_seed(1);
    let log = generate_sweep(&config, &[250, 500, 1000, 2000]);
    let csv = log.to_csv_string();

    let start = Instant::now();
    let dataset = Dataset::from_reader(csv.as_bytes()).unwrap();
    let load = start.elapsed();
    let output = Analyzer::default().analyze(dataset);
    let elapsed = start.elapsed();

    let rate = log.len() as f64 / elapsed.as_secs_f64();
    println!("Loaded {} records in {:?}", log.len(), load);
    println!(
        "Analyzed in {:?} ({} tables, {:.0} records/second)",
        elapsed,
        output.tables.len(),
        rate
    );

    assert!(output.report.skipped.is_empty(), "{:?}", output.report.skipped);
    assert!(
        rate > 50_000.0,
        "Should analyze at least 50k records/s, got {:.0}",
        rate
    );
}

#[test]
#[ignore]
fn stress_test_wide_grouping() {
    // One group per (device, message) pair
    let config = Scenario::Static.config().with_messages(50).with_seed(2);
    let log = generate_sweep(&config, &[2000]);
    let dataset = Dataset::from_reader(log.to_csv_string().as_bytes()).unwrap();

    let start = Instant::now();
    let table = aggregate(&dataset, &["deviceId", "messageId"], "rssi", Reducer::Mean).unwrap();
    let elapsed = start.elapsed();

    println!("{} groups in {:?}", table.rows.len(), elapsed);
    assert_eq!(table.rows.len(), 2000 * 50);
    assert_eq!(table.total_count(), dataset.len());
    assert!(elapsed < Duration::from_secs(5));
}

#[test]
#[ignore]
fn stress_test_fine_resampling() {
    let config = Scenario::Mobile.config().with_devices(500).with_messages(200).with_seed(3);
    let log = generate_sweep(&config, &[500]);
    let dataset = Dataset::from_reader(log.to_csv_string().as_bytes()).unwrap();

    let start = Instant::now();
    let series = resample(&dataset, Duration::from_secs(1), "rssi", Some("deviceId")).unwrap();
    let elapsed = start.elapsed();

    println!("{} windows in {:?}", series.rows.len(), elapsed);
    let counted: usize = series.rows.iter().map(|r| r.count).sum();
    assert_eq!(counted, dataset.len());
}
