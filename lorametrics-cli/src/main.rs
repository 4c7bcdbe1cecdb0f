// LoRaMetrics CLI - Command-line front end
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # LoRaMetrics CLI
//!
//! Loads one simulator log, runs the table catalog, and exports the tables,
//! the run summary and the run report.
//!
//! ## Usage
//!
//! ```bash
//! # Analyze a log with defaults
//! lorametrics results/lorawan-logistics-mab-mixed_ALL.csv
//!
//! # One-minute windows, 100-device buckets, custom output directory
//! lorametrics run.csv --out analysis --window-secs 60 --bucket-width 100
//! ```

use clap::Parser;
use lorametrics::{export_all, AnalysisConfig, AnalysisOutput, Analyzer, RunReport, RunSummary};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// LoRaWAN simulator log analyzer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Simulator log (CSV with a header row)
    input: PathBuf,

    /// Output directory for tables, summary and report
    #[arg(short, long, default_value = "lorametrics_out")]
    out: PathBuf,

    /// JSON analysis configuration; flags below override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Resampling window width in seconds
    #[arg(long)]
    window_secs: Option<u64>,

    /// Device-count bucket width
    #[arg(long)]
    bucket_width: Option<u32>,

    /// Do not anchor device-count tables at bucket 0
    #[arg(long)]
    no_anchor: bool,

    /// Print the run report as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Configuration file (or defaults) with flag overrides applied.
    fn analysis_config(&self) -> lorametrics::Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_json_file(path)?,
            None => AnalysisConfig::default(),
        };

        if let Some(secs) = self.window_secs {
            config.resample_window_secs = secs;
        }
        if let Some(width) = self.bucket_width {
            config.device_bucket_width = width;
        }
        if self.no_anchor {
            config.anchor_device_buckets = false;
        }

        config.validate()?;
        Ok(config)
    }
}

fn run(args: &Args) -> lorametrics::Result<AnalysisOutput> {
    let config = args.analysis_config()?;
    let analyzer = Analyzer::new(config);

    info!("Analyzing {}", args.input.display());
    let output = analyzer.analyze_file(&args.input)?;

    let written = export_all(&output, &args.out)?;
    info!("{} files written to {}", written.len(), args.out.display());
    Ok(output)
}

fn print_report(report: &RunReport, summary: &RunSummary) {
    println!("Records:  {}", report.records);
    println!("Devices:  {}", summary.devices);
    if let Some(rate) = summary.success_rate {
        println!("PDR:      {:.2}%", rate * 100.0);
    }
    if let (Some(start), Some(end)) = (summary.period_start, summary.period_end) {
        println!("Period:   {} .. {}", start, end);
    }

    println!("\nProduced ({}):", report.produced.len());
    for artifact in &report.produced {
        println!("  {:<36} {:>6} rows", artifact.name, artifact.rows);
    }

    if !report.skipped.is_empty() {
        println!("\nSkipped ({}):", report.skipped.len());
        for artifact in &report.skipped {
            println!("  {:<36} {}", artifact.name, artifact.reason);
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("LoRaMetrics v{}", lorametrics::VERSION);

    match run(&args) {
        Ok(output) => {
            if args.json {
                match serde_json::to_string_pretty(&output.report) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        error!("Failed to encode report: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                print_report(&output.report, &output.summary);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
