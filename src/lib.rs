// LoRaMetrics - Telemetry aggregation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # LoRaMetrics
//!
//! Derived metrics and aggregated tables from LoRaWAN simulator logs.
//!
//! ## Key Features
//!
//! - **Tolerant ingestion**: partial schemas load; only `success` is mandatory
//! - **Mobility labels**: static vs mobile per device, from observed positions
//! - **Derived metrics**: energy efficiency, device-count buckets, composite keys
//! - **Aggregation**: multi-key grouping with mean, count, sum, std, ratio-of-sums
//! - **Resampling**: fixed-width time windows with explicit empty windows
//!
//! ## Quick Start
//!
//! ```rust
//! use lorametrics::{Analyzer, Dataset};
//!
//! let log = "deviceId,time,x,y,sf,txPower,payload,success,rssi,snr,energyConsumed,nDevices\n\
//!            1,2025-05-01 10:00:00,0,0,7,14,20,1,-101.5,6.0,0.01,100\n\
//!            1,2025-05-01 10:00:12,0,0,7,14,20,0,-118.0,-4.5,0.01,100\n\
//!            2,2025-05-01 10:00:05,10,20,9,20,20,1,-96.0,8.0,0.02,100\n";
//!
//! let dataset = Dataset::from_reader(log.as_bytes()).unwrap();
//! let output = Analyzer::default().analyze(dataset);
//!
//! let pdr = output.tables["pdr_vs_nDevices"].as_aggregate().unwrap();
//! assert!(pdr.rows[0].synthetic); // bucket 0 anchor
//! assert_eq!(output.summary.devices, 2);
//! ```
//!
//! ## Modules
//!
//! - [`dataset`]: Record ingestion and the in-memory table
//! - [`mobility`]: Static / mobile classification
//! - [`derive`]: Per-record derived metrics
//! - [`aggregate`]: Grouping and reduction
//! - [`resample`]: Time windows and time-of-day profiles
//! - [`analysis`]: The catalog of named tables and the run report
//! - [`export`]: CSV and JSON output

pub mod aggregate;
pub mod analysis;
pub mod config;
pub mod dataset;
pub mod derive;
pub mod error;
pub mod export;
pub mod histogram;
pub mod mobility;
pub mod record;
pub mod resample;
pub mod summary;

// Re-exports for convenient access
pub use aggregate::{
    aggregate, aggregate_by_device_bucket, anchor_at_origin, describe, profile, AggregateRow,
    AggregateTable, PivotTable, ProfileTable, Reducer, StatsRow, StatsTable,
};
pub use analysis::{
    AnalysisOutput, Analyzer, CatalogEntry, Query, RunReport, Table, DEFAULT_CATALOG,
};
pub use config::AnalysisConfig;
pub use dataset::Dataset;
pub use error::{DataLoadError, Error, ExportError, MissingColumnWarning, Result, SkipReason};
pub use export::export_all;
pub use histogram::{histogram, Histogram, HistogramBin};
pub use mobility::{classify, MobilityDistribution, MobilityIndex};
pub use record::{columns, KeyValue, MobilityType, TelemetryRecord};
pub use resample::{resample, time_of_day_profile, ResampledRow, ResampledSeries};
pub use summary::RunSummary;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_basic_pipeline() {
        let records = vec![
            TelemetryRecord::new(true)
                .with_device("a")
                .with_position(0.0, 0.0)
                .with_radio(7, 14.0),
            TelemetryRecord::new(false)
                .with_device("a")
                .with_position(0.0, 0.0)
                .with_radio(7, 14.0),
        ];
        let mut dataset = Dataset::from_records(["deviceId", "x", "y", "sf", "txPower", "success"], records);
        classify(&mut dataset).unwrap();

        let table = aggregate(&dataset, &["mobilityType"], "success", Reducer::RatioOfSums).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].keys[0], KeyValue::from("static"));
        assert_eq!(table.rows[0].value, Some(0.5));
    }
}
