//! End-to-end tests: generated simulator logs through load, enrichment,
//! the table catalog and export.

use lorametrics::derive::device_bucket;
use lorametrics::error::DataLoadError;
use lorametrics::record::columns;
use lorametrics::*;
use lorametrics_testdata::{generate_log, generate_sweep, GeneratorConfig, Scenario, SimulatorLog};
use rand::prelude::*;
use rand::rngs::StdRng;
use std::collections::BTreeSet;
use tempfile::tempdir;

fn load(log: &SimulatorLog) -> Dataset {
    Dataset::from_reader(log.to_csv_string().as_bytes()).unwrap()
}

fn mixed(devices: u32, seed: u64) -> GeneratorConfig {
    Scenario::Mixed
        .config()
        .with_devices(devices)
        .with_messages(6)
        .with_seed(seed)
}

#[test]
fn test_mixed_fleet_end_to_end() {
    let log = generate_log(&mixed(36, 1));
    let output = Analyzer::default().analyze(load(&log));

    assert_eq!(output.report.records, 36 * 6);
    assert_eq!(output.summary.total_messages, 36 * 6);
    assert_eq!(output.summary.devices, 36);

    // Half of every block moves
    let mobility = output.summary.mobility.as_ref().unwrap();
    assert_eq!(mobility.devices(MobilityType::Static), 18);
    assert_eq!(mobility.devices(MobilityType::Mobile), 18);

    let by_mobility = output.tables["success_rate_mobility"].as_aggregate().unwrap();
    let labels: Vec<String> = by_mobility.rows.iter().map(|r| r.keys[0].to_string()).collect();
    assert_eq!(labels, vec!["mobile", "static"]);

    // Every record lands in exactly one group
    let grid = output.tables["success_rate_sf_txPower"].as_aggregate().unwrap();
    assert_eq!(grid.rows.len(), 3 * 2);
    assert_eq!(grid.total_count() + grid.dropped, 36 * 6);
    assert!(grid
        .rows
        .iter()
        .all(|r| r.value.is_some_and(|v| (0.0..=1.0).contains(&v))));

    // No interference model, so the interference tables are skipped
    assert!(output.report.was_skipped("interference_distribution"));
    assert!(output.report.was_produced("distance_distribution_mobility"));
}

#[test]
fn test_interference_tables_follow_the_log() {
    let log = generate_log(&Scenario::MixedInterference.config().with_devices(40).with_messages(3).with_seed(5));
    let output = Analyzer::default().analyze(load(&log));

    for name in ["interference_distribution", "interference_impact_sf", "interference_over_time"] {
        assert!(output.report.was_produced(name), "{} not produced", name);
    }

    let Table::Histogram(hist) = &output.tables["interference_distribution"] else {
        panic!("interference_distribution is not a histogram");
    };
    assert_eq!(hist.bins.len(), AnalysisConfig::default().interference_bins);
    assert_eq!(hist.total(), 40 * 3);
}

#[test]
fn test_population_sweep_buckets() {
    let config = GeneratorConfig::new()
        .with_spreading_factors(&[7])
        .with_tx_powers(&[14.0])
        .with_payloads(&[50])
        .with_messages(3)
        .with_contention(1)
        .with_seed(11);
    let log = generate_sweep(&config, &[60, 800]);
    let output = Analyzer::default().analyze(load(&log));

    let pdr = output.tables["pdr_vs_nDevices"].as_aggregate().unwrap();
    let keys: Vec<KeyValue> = pdr.rows.iter().map(|r| r.keys[0].clone()).collect();
    assert_eq!(
        keys,
        vec![KeyValue::Number(0.0), KeyValue::Number(50.0), KeyValue::Number(800.0)]
    );

    // Anchor row is flagged and carries no value
    assert!(pdr.rows[0].synthetic);
    assert_eq!(pdr.rows[0].value, None);
    assert_eq!(pdr.rows[0].count, 0);

    // Contention grows with the population
    let small = pdr.find(&[KeyValue::Number(50.0)]).unwrap().value.unwrap();
    let large = pdr.find(&[KeyValue::Number(800.0)]).unwrap().value.unwrap();
    assert!(large < small, "pdr {} at 800 devices vs {} at 60", large, small);

    // The two-key table keeps raw device counts
    let by_sf = output.tables["pdr_vs_nDevices_sf"].as_aggregate().unwrap();
    assert!(by_sf.rows.iter().all(|r| !r.synthetic));
    assert_eq!(by_sf.rows.len(), 2);
}

#[test]
fn test_anchor_can_be_disabled() {
    let log = generate_sweep(&mixed(0, 3), &[60, 120]);
    let config = AnalysisConfig {
        anchor_device_buckets: false,
        ..Default::default()
    };
    let output = Analyzer::new(config).analyze(load(&log));

    let pdr = output.tables["pdr_vs_nDevices"].as_aggregate().unwrap();
    assert!(pdr.rows.iter().all(|r| !r.synthetic));
    assert_eq!(pdr.rows[0].keys[0], KeyValue::Number(50.0));
}

#[test]
fn test_energy_efficiency_column() {
    let output = Analyzer::default().analyze(load(&generate_log(&mixed(18, 2))));
    assert!(output.dataset.has_column(columns::ENERGY_EFFICIENCY));

    for record in output.dataset.records() {
        let payload = f64::from(record.payload.unwrap());
        let energy = record.energy_consumed.unwrap();
        if energy == 0.0 {
            assert!(record.energy_efficiency.is_nan());
        } else {
            let expected = payload * 8.0 / (energy * 3.6);
            assert!((record.energy_efficiency - expected).abs() <= expected * 1e-12);
        }
    }
}

#[test]
fn test_export_writes_every_table() {
    let dir = tempdir().unwrap();
    let output = Analyzer::default().analyze(load(&generate_log(&mixed(18, 4))));
    let written = export_all(&output, dir.path()).unwrap();

    assert_eq!(written.len(), output.tables.len() + 2);
    for name in output.tables.keys() {
        assert!(dir.path().join(format!("{}.csv", name)).exists(), "{}", name);
    }

    let summary = std::fs::read_to_string(dir.path().join("summary.json")).unwrap();
    let summary: serde_json::Value = serde_json::from_str(&summary).unwrap();
    assert_eq!(summary["total_messages"], 18 * 6);

    let report = std::fs::read_to_string(dir.path().join("report.json")).unwrap();
    let report: RunReport = serde_json::from_str(&report).unwrap();
    assert_eq!(report, output.report);
}

#[test]
fn test_file_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.csv");
    let log = generate_log(&mixed(12, 8));
    log.to_csv(&path).unwrap();

    let output = Analyzer::default().analyze_file(&path).unwrap();
    assert_eq!(output.report.records, log.len());
    assert_eq!(output.summary.success_rate, log.success_rate());
}

#[test]
fn test_partial_schema_degrades() {
    let csv = "sf,success\n7,1\n7,0\n9,1\n";
    let output = Analyzer::default().analyze(Dataset::from_reader(csv.as_bytes()).unwrap());

    assert!(output.report.was_skipped("success_rate_sf_txPower"));
    assert!(output.report.was_skipped("pdr_vs_nDevices"));
    assert!(output.report.was_skipped("success_rate_over_time"));
    assert!(output.summary.mobility.is_none());

    // sf_stats still runs on the columns that exist
    let Table::Profile(stats) = &output.tables["sf_stats"] else {
        panic!("sf_stats is not a profile");
    };
    assert_eq!(stats.metrics, vec!["success".to_string()]);
    assert_eq!(stats.rows.len(), 2);
}

#[test]
fn test_missing_success_is_fatal() {
    let csv = "deviceId,sf\n1,7\n";
    let err = Dataset::from_reader(csv.as_bytes()).unwrap_err();
    assert!(matches!(err, DataLoadError::MissingColumn(ref c) if c == "success"));

    let dir = tempdir().unwrap();
    let missing = dir.path().join("absent.csv");
    assert!(matches!(
        Analyzer::default().analyze_file(&missing),
        Err(Error::Load(DataLoadError::NotFound(_)))
    ));
}

#[test]
fn test_random_populations_bucket_and_group() {
    let mut rng = StdRng::seed_from_u64(99);
    let width = 50;

    let records: Vec<TelemetryRecord> = (0..500)
        .map(|_| {
            TelemetryRecord::new(rng.gen_bool(0.7))
                .with_n_devices(rng.gen_range(1..2000))
                .with_radio([7u8, 9, 12][rng.gen_range(0..3)], 14.0)
        })
        .collect();
    let dataset = Dataset::from_records(["success", "nDevices", "sf", "txPower"], records);

    for record in dataset.records() {
        let n = record.n_devices.unwrap();
        let bucket = device_bucket(n, width);
        assert_eq!(bucket % width, 0);
        assert!(bucket <= n && n < bucket + width);
    }

    let table = aggregate(&dataset, &["sf"], "success", Reducer::RatioOfSums).unwrap();
    assert_eq!(table.total_count(), 500);
    let sfs: BTreeSet<String> = table.rows.iter().map(|r| r.keys[0].to_string()).collect();
    assert_eq!(sfs.into_iter().collect::<Vec<_>>(), vec!["12", "7", "9"]);
}
