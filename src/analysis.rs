// LoRaMetrics - Telemetry aggregation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Analyzer - enrichment followed by the catalog of named tables.
//!
//! The analyzer owns the ordering constraint of a run: every enrichment
//! pass (mobility labels, energy efficiency, device buckets, composite keys)
//! completes before the first query reads the dataset. A query whose
//! columns are absent is skipped with a warning and recorded in the
//! [`RunReport`]; the rest of the catalog still runs.

use crate::aggregate::{
    aggregate, aggregate_by_device_bucket, describe, profile, AggregateTable, ProfileTable,
    Reducer, StatsTable,
};
use crate::config::AnalysisConfig;
use crate::dataset::Dataset;
use crate::derive::{add_composite_key, add_device_buckets, add_energy_efficiency};
use crate::error::{Result, SkipReason};
use crate::histogram::{histogram, Histogram};
use crate::mobility::classify;
use crate::record::columns::*;
use crate::resample::{resample, time_of_day_profile, ResampledSeries};
use crate::summary::RunSummary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Composite legend keys built during enrichment.
pub const COMPOSITE_KEYS: &[(&str, &str)] = &[(SF, PAYLOAD), (SF, TX_POWER), (TX_POWER, BW)];

/// Metrics profiled per mobility type and per spreading factor.
const LINK_PROFILE: &[&str] = &[
    SUCCESS,
    RSSI,
    SNR,
    DISTANCE,
    ENERGY_CONSUMED,
    INTERFERENCE_LOSS,
];

/// Which configured bin count a histogram uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bins {
    Distance,
    Interference,
}

/// One query of the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Aggregate {
        keys: &'static [&'static str],
        metric: &'static str,
        reducer: Reducer,
    },
    /// Aggregate by `nDevicesBinned`, anchored per configuration.
    DeviceBuckets {
        metric: &'static str,
        reducer: Reducer,
    },
    Describe {
        keys: &'static [&'static str],
        metric: &'static str,
    },
    Profile {
        keys: &'static [&'static str],
        metrics: &'static [&'static str],
    },
    Resample {
        metric: &'static str,
        segment: Option<&'static str>,
    },
    TimeOfDay {
        metric: &'static str,
        hue: Option<&'static str>,
    },
    Histogram {
        column: &'static str,
        bins: Bins,
        segment: Option<&'static str>,
    },
}

/// A named query.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub query: Query,
}

const fn entry(name: &'static str, query: Query) -> CatalogEntry {
    CatalogEntry { name, query }
}

const fn success_rate(name: &'static str, keys: &'static [&'static str]) -> CatalogEntry {
    entry(
        name,
        Query::Aggregate {
            keys,
            metric: SUCCESS,
            reducer: Reducer::Mean,
        },
    )
}

const fn by_message(
    name: &'static str,
    metric: &'static str,
    keys: &'static [&'static str],
) -> CatalogEntry {
    entry(
        name,
        Query::Aggregate {
            keys,
            metric,
            reducer: Reducer::Mean,
        },
    )
}

const fn over_day(name: &'static str, metric: &'static str, hue: Option<&'static str>) -> CatalogEntry {
    entry(name, Query::TimeOfDay { metric, hue })
}

const fn per_bucket(name: &'static str, metric: &'static str, reducer: Reducer) -> CatalogEntry {
    entry(name, Query::DeviceBuckets { metric, reducer })
}

const fn stats_by(name: &'static str, keys: &'static [&'static str], metric: &'static str) -> CatalogEntry {
    entry(name, Query::Describe { keys, metric })
}

/// Tables produced by a default run.
pub const DEFAULT_CATALOG: &[CatalogEntry] = &[
    // Success-rate heatmaps
    success_rate("success_rate_sf_txPower", &[SF, TX_POWER]),
    success_rate("success_rate_sf_payload", &[SF, PAYLOAD]),
    success_rate("success_rate_sf_bw", &[SF, BW]),
    success_rate("success_rate_sf_mobility", &[SF, MOBILITY_TYPE]),
    success_rate("success_rate_mobility", &[MOBILITY_TYPE]),
    // Per-dimension statistics
    stats_by("rssi_vs_sf", &[SF], RSSI),
    stats_by("snr_vs_sf", &[SF], SNR),
    stats_by("energy_vs_sf", &[SF], ENERGY_CONSUMED),
    stats_by("toa_vs_sf", &[SF], TIME_ON_AIR),
    stats_by("interference_impact_sf", &[SF], INTERFERENCE_LOSS),
    stats_by("interference_impact_mobility", &[MOBILITY_TYPE], INTERFERENCE_LOSS),
    entry(
        "mobility_stats",
        Query::Profile {
            keys: &[MOBILITY_TYPE],
            metrics: LINK_PROFILE,
        },
    ),
    entry(
        "sf_stats",
        Query::Profile {
            keys: &[SF],
            metrics: LINK_PROFILE,
        },
    ),
    entry(
        "power_stats",
        Query::Profile {
            keys: &[TX_POWER],
            metrics: &[SUCCESS, RSSI, SNR, DISTANCE, ENERGY_CONSUMED],
        },
    ),
    entry(
        "payload_stats",
        Query::Profile {
            keys: &[PAYLOAD],
            metrics: &[SUCCESS, RSSI, SNR, TIME_ON_AIR],
        },
    ),
    // Fixed-window time series
    entry(
        "success_rate_over_time",
        Query::Resample {
            metric: SUCCESS,
            segment: None,
        },
    ),
    entry(
        "success_rate_over_time_mobility",
        Query::Resample {
            metric: SUCCESS,
            segment: Some(MOBILITY_TYPE),
        },
    ),
    entry(
        "rssi_over_time_sf",
        Query::Resample {
            metric: RSSI,
            segment: Some(SF),
        },
    ),
    entry(
        "interference_over_time",
        Query::Resample {
            metric: INTERFERENCE_LOSS,
            segment: None,
        },
    ),
    entry(
        "distance_over_time",
        Query::Resample {
            metric: DISTANCE,
            segment: Some(DEVICE_ID),
        },
    ),
    // Per-message series, one line per composite legend value
    by_message("snr_vs_message_sf_payload", SNR, &[SF_PAYLOAD, MESSAGE_ID]),
    by_message("rssi_vs_message_sf_payload", RSSI, &[SF_PAYLOAD, MESSAGE_ID]),
    by_message("snr_vs_message_sf_txPower", SNR, &[SF_TX_POWER, MESSAGE_ID]),
    by_message("rssi_vs_message_sf_txPower", RSSI, &[SF_TX_POWER, MESSAGE_ID]),
    by_message("snr_vs_message_txPower_bw", SNR, &[TX_POWER_BW, MESSAGE_ID]),
    by_message("rssi_vs_message_txPower_bw", RSSI, &[TX_POWER_BW, MESSAGE_ID]),
    // Time-of-day profiles
    over_day("snr_vs_time", SNR, None),
    over_day("rssi_vs_time", RSSI, None),
    over_day("snr_vs_time_sf", SNR, Some(SF)),
    over_day("snr_vs_time_txPower", SNR, Some(TX_POWER)),
    over_day("rssi_vs_time_sf", RSSI, Some(SF)),
    over_day("rssi_vs_time_txPower", RSSI, Some(TX_POWER)),
    over_day("toa_vs_time_sf", TIME_ON_AIR, Some(SF)),
    over_day("toa_vs_time_txPower", TIME_ON_AIR, Some(TX_POWER)),
    over_day("efficiency_vs_time_sf", ENERGY_EFFICIENCY, Some(SF)),
    over_day("efficiency_vs_time_txPower", ENERGY_EFFICIENCY, Some(TX_POWER)),
    over_day("energy_vs_time_sf", ENERGY_CONSUMED, Some(SF)),
    over_day("energy_vs_time_txPower", ENERGY_CONSUMED, Some(TX_POWER)),
    // Population scaling
    per_bucket("toa_vs_nDevices", TIME_ON_AIR, Reducer::Mean),
    per_bucket("snr_vs_nDevices", SNR, Reducer::Mean),
    per_bucket("rssi_vs_nDevices", RSSI, Reducer::Mean),
    per_bucket("energy_vs_nDevices", ENERGY_CONSUMED, Reducer::Mean),
    per_bucket("efficiency_vs_nDevices", ENERGY_EFFICIENCY, Reducer::Mean),
    per_bucket("pdr_vs_nDevices", SUCCESS, Reducer::RatioOfSums),
    entry(
        "pdr_vs_nDevices_sf",
        Query::Aggregate {
            keys: &[N_DEVICES, SF],
            metric: SUCCESS,
            reducer: Reducer::RatioOfSums,
        },
    ),
    entry(
        "efficiency_vs_nDevices_sf",
        Query::Aggregate {
            keys: &[N_DEVICES, SF],
            metric: ENERGY_EFFICIENCY,
            reducer: Reducer::Mean,
        },
    ),
    // Distributions
    entry(
        "distance_distribution",
        Query::Histogram {
            column: DISTANCE,
            bins: Bins::Distance,
            segment: None,
        },
    ),
    entry(
        "distance_distribution_mobility",
        Query::Histogram {
            column: DISTANCE,
            bins: Bins::Distance,
            segment: Some(MOBILITY_TYPE),
        },
    ),
    entry(
        "interference_distribution",
        Query::Histogram {
            column: INTERFERENCE_LOSS,
            bins: Bins::Interference,
            segment: None,
        },
    ),
];

/// Any table a query can produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Table {
    Aggregate(AggregateTable),
    Stats(StatsTable),
    Profile(ProfileTable),
    Series(ResampledSeries),
    Histogram(Histogram),
}

impl Table {
    /// Number of output rows.
    pub fn len(&self) -> usize {
        match self {
            Table::Aggregate(t) => t.rows.len(),
            Table::Stats(t) => t.rows.len(),
            Table::Profile(t) => t.rows.len(),
            Table::Series(t) => t.rows.len(),
            Table::Histogram(t) => t.bins.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_aggregate(&self) -> Option<&AggregateTable> {
        match self {
            Table::Aggregate(t) => Some(t),
            _ => None,
        }
    }
}

/// An artifact written by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducedArtifact {
    pub name: String,
    pub rows: usize,
}

/// An artifact left out of a run, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedArtifact {
    pub name: String,
    pub column: String,
    pub reason: String,
}

/// Produced and skipped artifacts of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub records: usize,
    /// Columns present after enrichment.
    pub columns: Vec<String>,
    pub produced: Vec<ProducedArtifact>,
    pub skipped: Vec<SkippedArtifact>,
}

impl RunReport {
    fn produce(&mut self, name: &str, rows: usize) {
        self.produced.push(ProducedArtifact {
            name: name.to_string(),
            rows,
        });
    }

    fn skip(&mut self, name: &str, reason: impl Into<SkipReason>) {
        let reason = reason.into();
        warn!("Skipping {}: {}", name, reason);
        self.skipped.push(SkippedArtifact {
            name: name.to_string(),
            column: reason.column().to_string(),
            reason: reason.to_string(),
        });
    }

    /// Whether an artifact was produced.
    pub fn was_produced(&self, name: &str) -> bool {
        self.produced.iter().any(|p| p.name == name)
    }

    /// Whether an artifact was skipped.
    pub fn was_skipped(&self, name: &str) -> bool {
        self.skipped.iter().any(|s| s.name == name)
    }
}

/// Everything one run produces.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    /// The enriched dataset.
    pub dataset: Dataset,
    pub tables: BTreeMap<String, Table>,
    pub summary: RunSummary,
    pub report: RunReport,
}

/// Runs enrichment and the catalog against one dataset.
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: AnalysisConfig,
    catalog: Vec<CatalogEntry>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl Analyzer {
    /// Create an analyzer running the default catalog.
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            catalog: DEFAULT_CATALOG.to_vec(),
        }
    }

    /// Replace the catalog.
    pub fn with_catalog(mut self, catalog: Vec<CatalogEntry>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn catalog(&self) -> &[CatalogEntry] {
        &self.catalog
    }

    /// Load a simulator log and analyze it.
    pub fn analyze_file(&self, path: impl AsRef<Path>) -> Result<AnalysisOutput> {
        self.config.validate()?;
        let dataset = Dataset::from_csv(path)?;
        Ok(self.analyze(dataset))
    }

    /// Enrich `dataset`, run every catalog query and summarize the run.
    pub fn analyze(&self, mut dataset: Dataset) -> AnalysisOutput {
        let mut report = RunReport {
            records: dataset.len(),
            ..Default::default()
        };

        self.enrich(&mut dataset, &mut report);
        report.columns = dataset.columns().iter().map(|c| c.to_string()).collect();

        let mut tables = BTreeMap::new();
        for entry in &self.catalog {
            match self.run_query(&dataset, &entry.query) {
                Ok(table) => {
                    if let Table::Profile(profile) = &table {
                        for warning in &profile.skipped {
                            debug!("{} without {}", entry.name, warning.column);
                        }
                    }
                    report.produce(entry.name, table.len());
                    tables.insert(entry.name.to_string(), table);
                }
                Err(reason) => report.skip(entry.name, reason),
            }
        }

        let summary = RunSummary::from_dataset(&dataset);
        info!(
            "Analysis complete: {} tables produced, {} skipped",
            report.produced.len(),
            report.skipped.len()
        );

        AnalysisOutput {
            dataset,
            tables,
            summary,
            report,
        }
    }

    /// Add every derived column whose inputs are present.
    ///
    /// Each skipped derivation is recorded under the derived column name.
    pub fn enrich(&self, dataset: &mut Dataset, report: &mut RunReport) {
        if let Err(warning) = classify(dataset) {
            report.skip(MOBILITY_TYPE, warning);
        }
        if let Err(warning) = add_energy_efficiency(dataset) {
            report.skip(ENERGY_EFFICIENCY, warning);
        }
        if let Err(warning) = add_device_buckets(dataset, self.config.device_bucket_width) {
            report.skip(N_DEVICES_BINNED, warning);
        }
        for (first, second) in COMPOSITE_KEYS {
            if let Err(warning) =
                add_composite_key(dataset, first, second, &self.config.composite_separator)
            {
                report.skip(&crate::derive::composite_column(first, second), warning);
            }
        }
    }

    /// Run a single query against an enriched dataset.
    pub fn run_query(
        &self,
        dataset: &Dataset,
        query: &Query,
    ) -> std::result::Result<Table, SkipReason> {
        let table = match query {
            Query::Aggregate {
                keys,
                metric,
                reducer,
            } => Table::Aggregate(aggregate(dataset, keys, metric, *reducer)?),
            Query::DeviceBuckets { metric, reducer } => {
                Table::Aggregate(aggregate_by_device_bucket(
                    dataset,
                    metric,
                    *reducer,
                    self.config.anchor_device_buckets,
                )?)
            }
            Query::Describe { keys, metric } => Table::Stats(describe(dataset, keys, metric)?),
            Query::Profile { keys, metrics } => Table::Profile(profile(dataset, keys, metrics)?),
            Query::Resample { metric, segment } => Table::Series(resample(
                dataset,
                self.config.resample_window(),
                metric,
                *segment,
            )?),
            Query::TimeOfDay { metric, hue } => {
                Table::Aggregate(time_of_day_profile(dataset, metric, *hue)?)
            }
            Query::Histogram {
                column,
                bins,
                segment,
            } => {
                let bins = match bins {
                    Bins::Distance => self.config.distance_bins,
                    Bins::Interference => self.config.interference_bins,
                };
                Table::Histogram(histogram(dataset, column, bins, *segment)?)
            }
        };
        Ok(table)
    }
}
