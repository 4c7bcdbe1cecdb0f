//! Example: Generate one simulator log per scenario, plus a population sweep.
//!
//! Run with: cargo run --example generate_log [output_dir]

use lorametrics_testdata::{generate_log, generate_sweep, Scenario};
use std::fs;
use std::path::PathBuf;

fn main() {
    println!("LoRaMetrics Testdata Generator");
    println!("==============================\n");

    let out_dir: PathBuf = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "datasets".to_string())
        .into();
    fs::create_dir_all(&out_dir).unwrap();

    for scenario in Scenario::ALL {
        let config = scenario.config().with_devices(200).with_seed(42);
        let log = generate_log(&config).with_scenario(scenario.name());

        let path = out_dir.join(format!("lorawan_{}.csv", scenario));
        log.to_csv(&path).unwrap();
        println!(
            "  {:<20} {:>6} rows, success rate {:.1}%",
            scenario.name(),
            log.len(),
            log.success_rate().unwrap_or(0.0) * 100.0
        );
    }

    let sweep_config = Scenario::MixedInterference
        .config()
        .with_shadowing(4.0)
        .with_contention(8)
        .with_messages(10)
        .with_seed(7);
    let populations = [50, 100, 200, 400, 800];
    let sweep = generate_sweep(&sweep_config, &populations).with_scenario("sweep");

    let path = out_dir.join("lorawan_sweep.csv");
    sweep.to_csv(&path).unwrap();
    println!(
        "  {:<20} {:>6} rows over populations {:?}",
        "sweep",
        sweep.len(),
        populations
    );

    println!("\nLogs written to {}", out_dir.display());
}
