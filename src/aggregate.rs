// LoRaMetrics - Telemetry aggregation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Grouping and reduction of records into summary tables.
//!
//! Rows come out in ascending key order (primary key first), one row per key
//! combination observed in the data. Missing metric values never take part
//! in a reduction; records with a missing key value are left out of every
//! group and counted in `dropped`.
//!
//! ```rust
//! use lorametrics::{aggregate, Dataset, Reducer, TelemetryRecord};
//!
//! let records = vec![
//!     TelemetryRecord::new(true).with_radio(7, 14.0),
//!     TelemetryRecord::new(false).with_radio(7, 14.0),
//!     TelemetryRecord::new(true).with_radio(9, 14.0),
//! ];
//! let dataset = Dataset::from_records(["success", "sf", "txPower"], records);
//!
//! let table = aggregate(&dataset, &["sf"], "success", Reducer::RatioOfSums).unwrap();
//! assert_eq!(table.rows.len(), 2);
//! assert_eq!(table.rows[0].value, Some(0.5));
//! assert_eq!(table.rows[1].value, Some(1.0));
//! ```

use crate::dataset::Dataset;
use crate::error::MissingColumnWarning;
use crate::record::{columns, KeyValue, TelemetryRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Reduction applied to the metric values of one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    /// Arithmetic mean of the observed values.
    Mean,
    /// Number of observed (non-missing) values.
    Count,
    /// Sum of the observed values.
    Sum,
    /// Sum of a 0/1 metric over the number of records, clipped to [0, 1].
    RatioOfSums,
    /// Sample standard deviation (n - 1).
    Std,
}

impl Reducer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reducer::Mean => "mean",
            Reducer::Count => "count",
            Reducer::Sum => "sum",
            Reducer::RatioOfSums => "ratio_of_sums",
            Reducer::Std => "std",
        }
    }

    /// Reduce the observed values of a group holding `records` records.
    pub fn reduce(&self, values: &[f64], records: usize) -> Option<f64> {
        let n = values.len();
        match self {
            Reducer::Count => Some(n as f64),
            Reducer::Sum => (n > 0).then(|| values.iter().sum()),
            Reducer::Mean => (n > 0).then(|| values.iter().sum::<f64>() / n as f64),
            Reducer::RatioOfSums => {
                if records == 0 {
                    return None;
                }
                let ratio = values.iter().sum::<f64>() / records as f64;
                Some(ratio.clamp(0.0, 1.0))
            }
            Reducer::Std => sample_std(values),
        }
    }
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One group of an aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    /// Key values, in group-key order.
    pub keys: Vec<KeyValue>,
    /// Reduced statistic; `None` when undefined.
    pub value: Option<f64>,
    /// Number of records in the group.
    pub count: usize,
    /// Row fabricated by a post-processing step, not backed by data.
    #[serde(default)]
    pub synthetic: bool,
}

/// Result of [`aggregate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateTable {
    pub group_keys: Vec<String>,
    pub metric: String,
    pub reducer: Reducer,
    pub rows: Vec<AggregateRow>,
    /// Records left out because a key value was missing.
    pub dropped: usize,
}

impl AggregateTable {
    /// Sum of the record counts of all data-backed rows.
    pub fn total_count(&self) -> usize {
        self.rows.iter().map(|r| r.count).sum()
    }

    /// Row with the given key values.
    pub fn find(&self, keys: &[KeyValue]) -> Option<&AggregateRow> {
        self.rows.iter().find(|r| r.keys == keys)
    }

    /// Row-by-column matrix view of a two-key table.
    pub fn pivot(&self) -> Option<PivotTable> {
        if self.group_keys.len() != 2 {
            return None;
        }

        let mut row_labels: Vec<KeyValue> = Vec::new();
        let mut column_labels: Vec<KeyValue> = self.rows.iter().map(|r| r.keys[1].clone()).collect();
        column_labels.sort();
        column_labels.dedup();

        let mut cells: Vec<Vec<Option<f64>>> = Vec::new();
        for row in &self.rows {
            if row_labels.last() != Some(&row.keys[0]) {
                row_labels.push(row.keys[0].clone());
                cells.push(vec![None; column_labels.len()]);
            }
            if let (Ok(col), Some(line)) = (column_labels.binary_search(&row.keys[1]), cells.last_mut()) {
                line[col] = row.value;
            }
        }

        Some(PivotTable {
            row_key: self.group_keys[0].clone(),
            column_key: self.group_keys[1].clone(),
            row_labels,
            column_labels,
            cells,
        })
    }
}

/// Matrix view of a two-key aggregate, for heatmap consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotTable {
    pub row_key: String,
    pub column_key: String,
    pub row_labels: Vec<KeyValue>,
    pub column_labels: Vec<KeyValue>,
    /// `cells[row][column]`; `None` for absent combinations.
    pub cells: Vec<Vec<Option<f64>>>,
}

impl PivotTable {
    /// Cell at the given labels.
    pub fn get(&self, row: &KeyValue, column: &KeyValue) -> Option<f64> {
        let r = self.row_labels.iter().position(|l| l == row)?;
        let c = self.column_labels.iter().position(|l| l == column)?;
        self.cells[r][c]
    }
}

/// Descriptive statistics of one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRow {
    pub keys: Vec<KeyValue>,
    /// Number of observed values.
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Result of [`describe`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsTable {
    pub group_keys: Vec<String>,
    pub metric: String,
    pub rows: Vec<StatsRow>,
    pub dropped: usize,
}

/// Means of several metrics for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub keys: Vec<KeyValue>,
    /// Number of records in the group.
    pub count: usize,
    /// One mean per profiled metric, in metric order.
    pub means: Vec<Option<f64>>,
}

/// Result of [`profile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileTable {
    pub group_keys: Vec<String>,
    /// Metrics present in the dataset, in requested order.
    pub metrics: Vec<String>,
    pub rows: Vec<ProfileRow>,
    pub dropped: usize,
    /// Requested metrics that were absent.
    #[serde(skip)]
    pub skipped: Vec<MissingColumnWarning>,
}

type Groups<'a> = BTreeMap<Vec<KeyValue>, Vec<&'a TelemetryRecord>>;

/// Partition records by key tuple. Records with a missing key are dropped.
fn group_records<'a>(dataset: &'a Dataset, group_keys: &[&str]) -> (Groups<'a>, usize) {
    let mut groups: Groups<'a> = BTreeMap::new();
    let mut dropped = 0usize;

    for record in dataset.records() {
        let keys: Option<Vec<KeyValue>> = group_keys.iter().map(|k| record.key(k)).collect();
        match keys {
            Some(keys) => groups.entry(keys).or_default().push(record),
            None => dropped += 1,
        }
    }

    (groups, dropped)
}

fn observed(records: &[&TelemetryRecord], metric: &str) -> Vec<f64> {
    records.iter().filter_map(|r| r.metric(metric)).collect()
}

fn operation_name(group_keys: &[&str], metric: &str) -> String {
    format!("{} by {}", metric, group_keys.join(", "))
}

fn to_strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Group `dataset` by `group_keys` and reduce `metric` in each group.
///
/// Fails with a [`MissingColumnWarning`] if a key or the metric column is
/// absent; callers skip that table and carry on.
pub fn aggregate(
    dataset: &Dataset,
    group_keys: &[&str],
    metric: &str,
    reducer: Reducer,
) -> Result<AggregateTable, MissingColumnWarning> {
    let operation = operation_name(group_keys, metric);
    dataset.require_all(group_keys, &operation)?;
    dataset.require(metric, &operation)?;

    let (groups, dropped) = group_records(dataset, group_keys);

    let rows = groups
        .into_iter()
        .map(|(keys, records)| {
            let values = observed(&records, metric);
            AggregateRow {
                keys,
                value: reducer.reduce(&values, records.len()),
                count: records.len(),
                synthetic: false,
            }
        })
        .collect();

    Ok(AggregateTable {
        group_keys: to_strings(group_keys),
        metric: metric.to_string(),
        reducer,
        rows,
        dropped,
    })
}

/// Aggregate by device-count bucket, optionally anchored at the origin.
///
/// The dataset must already carry `nDevicesBinned`.
pub fn aggregate_by_device_bucket(
    dataset: &Dataset,
    metric: &str,
    reducer: Reducer,
    anchor: bool,
) -> Result<AggregateTable, MissingColumnWarning> {
    let mut table = aggregate(dataset, &[columns::N_DEVICES_BINNED], metric, reducer)?;
    if anchor {
        anchor_at_origin(&mut table);
    }
    Ok(table)
}

/// Prepend a synthetic missing row at key 0 when no group has key 0.
///
/// This is the only place the engine fabricates a row. It applies to
/// single-key tables; returns whether a row was added.
pub fn anchor_at_origin(table: &mut AggregateTable) -> bool {
    if table.group_keys.len() != 1 || table.rows.iter().any(|r| r.keys[0].is_zero()) {
        return false;
    }

    table.rows.insert(
        0,
        AggregateRow {
            keys: vec![KeyValue::Number(0.0)],
            value: None,
            count: 0,
            synthetic: true,
        },
    );
    true
}

/// Count, mean, standard deviation, min and max of `metric` per group.
pub fn describe(
    dataset: &Dataset,
    group_keys: &[&str],
    metric: &str,
) -> Result<StatsTable, MissingColumnWarning> {
    let operation = operation_name(group_keys, metric);
    dataset.require_all(group_keys, &operation)?;
    dataset.require(metric, &operation)?;

    let (groups, dropped) = group_records(dataset, group_keys);

    let rows = groups
        .into_iter()
        .map(|(keys, records)| {
            let values = observed(&records, metric);
            StatsRow {
                keys,
                count: values.len(),
                mean: Reducer::Mean.reduce(&values, records.len()),
                std: sample_std(&values),
                min: values.iter().copied().reduce(f64::min),
                max: values.iter().copied().reduce(f64::max),
            }
        })
        .collect();

    Ok(StatsTable {
        group_keys: to_strings(group_keys),
        metric: metric.to_string(),
        rows,
        dropped,
    })
}

/// Mean of several metrics per group.
///
/// Absent metric columns are left out of the table and listed in `skipped`;
/// only absent key columns fail the whole table.
pub fn profile(
    dataset: &Dataset,
    group_keys: &[&str],
    metrics: &[&str],
) -> Result<ProfileTable, MissingColumnWarning> {
    dataset.require_all(group_keys, &format!("profile by {}", group_keys.join(", ")))?;

    let mut present = Vec::new();
    let mut skipped = Vec::new();
    for metric in metrics {
        match dataset.require(metric, &operation_name(group_keys, metric)) {
            Ok(()) => present.push(*metric),
            Err(warning) => skipped.push(warning),
        }
    }

    let (groups, dropped) = group_records(dataset, group_keys);

    let rows = groups
        .into_iter()
        .map(|(keys, records)| ProfileRow {
            means: present
                .iter()
                .map(|m| Reducer::Mean.reduce(&observed(&records, m), records.len()))
                .collect(),
            count: records.len(),
            keys,
        })
        .collect();

    Ok(ProfileTable {
        group_keys: to_strings(group_keys),
        metrics: to_strings(&present),
        rows,
        dropped,
        skipped,
    })
}

/// Sample standard deviation; undefined below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    Some(variance.max(0.0).sqrt())
}
