// LoRaMetrics - Telemetry aggregation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Fixed-width time windows.
//!
//! Windows are aligned to multiples of the width since the Unix epoch and
//! keyed by full date-time, so records from different days never share a
//! window. Each segment covers its own first to last window; windows
//! without observations are emitted with a missing value. A series that
//! would expand past [`MAX_WINDOWS`] is refused instead of materialized.

use crate::aggregate::{aggregate, AggregateTable, Reducer};
use crate::dataset::Dataset;
use crate::error::{MissingColumnWarning, SkipReason};
use crate::record::{columns, KeyValue, DATE_FORMAT, TIME_OF_DAY_FORMAT};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Upper bound on the windows one resampled series may hold, gaps included.
pub const MAX_WINDOWS: u64 = 1_000_000;

/// Mean of one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampledRow {
    pub segment: Option<KeyValue>,
    pub window_start: NaiveDateTime,
    /// `None` when the window holds no observed value.
    pub value: Option<f64>,
    /// Records falling in the window.
    pub count: usize,
}

impl ResampledRow {
    pub fn date(&self) -> String {
        self.window_start.format(DATE_FORMAT).to_string()
    }

    pub fn time_of_day(&self) -> String {
        self.window_start.format(TIME_OF_DAY_FORMAT).to_string()
    }
}

/// Result of [`resample`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampledSeries {
    pub metric: String,
    pub segment_column: Option<String>,
    pub window_secs: u64,
    /// Rows ordered by segment, then by window start.
    pub rows: Vec<ResampledRow>,
}

#[derive(Default)]
struct Window {
    values: Vec<f64>,
    records: usize,
}

/// Mean of `metric` per `window`, optionally per value of `segment`.
///
/// Records without a timestamp or segment value are ignored. Fails with
/// [`SkipReason::TooManyWindows`] when the segments together span more than
/// [`MAX_WINDOWS`] windows.
pub fn resample(
    dataset: &Dataset,
    window: Duration,
    metric: &str,
    segment: Option<&str>,
) -> Result<ResampledSeries, SkipReason> {
    let operation = format!("{} resampled over time", metric);
    dataset.require_all(&[columns::TIME, metric], &operation)?;
    if let Some(segment) = segment {
        dataset.require(segment, &operation)?;
    }

    let width = window.as_secs().max(1) as i64;

    let mut segments: BTreeMap<Option<KeyValue>, BTreeMap<i64, Window>> = BTreeMap::new();
    for record in dataset.records() {
        let Some(time) = record.time else {
            continue;
        };
        let key = match segment {
            Some(segment) => match record.key(segment) {
                Some(key) => Some(key),
                None => continue,
            },
            None => None,
        };
        let start = time.and_utc().timestamp().div_euclid(width) * width;
        let slot = segments.entry(key).or_default().entry(start).or_default();
        slot.records += 1;
        if let Some(value) = record.metric(metric) {
            slot.values.push(value);
        }
    }

    let spanned: u64 = segments
        .values()
        .filter_map(|windows| {
            let first = *windows.keys().next()?;
            let last = *windows.keys().next_back()?;
            Some(((last - first) / width) as u64 + 1)
        })
        .sum();
    if spanned > MAX_WINDOWS {
        return Err(SkipReason::TooManyWindows {
            operation,
            windows: spanned,
            limit: MAX_WINDOWS,
        });
    }

    let mut rows = Vec::with_capacity(spanned as usize);
    for (key, windows) in segments {
        let (Some(first), Some(last)) = (
            windows.keys().next().copied(),
            windows.keys().next_back().copied(),
        ) else {
            continue;
        };

        let mut start = first;
        while start <= last {
            let Some(window_start) = DateTime::from_timestamp(start, 0).map(|t| t.naive_utc())
            else {
                break;
            };
            let (value, count) = match windows.get(&start) {
                Some(w) => (Reducer::Mean.reduce(&w.values, w.records), w.records),
                None => (None, 0),
            };
            rows.push(ResampledRow {
                segment: key.clone(),
                window_start,
                value,
                count,
            });
            start += width;
        }
    }

    debug!("Resampled {} into {} windows of {}s", metric, rows.len(), width);

    Ok(ResampledSeries {
        metric: metric.to_string(),
        segment_column: segment.map(str::to_string),
        window_secs: width as u64,
        rows,
    })
}

/// Mean of `metric` per time-of-day sample, optionally per `hue` value.
///
/// Keys are `(hue, date, timeOfDay)` when the dataset spans several dates,
/// `(hue, timeOfDay)` otherwise; `hue` is left out when not given.
pub fn time_of_day_profile(
    dataset: &Dataset,
    metric: &str,
    hue: Option<&str>,
) -> Result<AggregateTable, MissingColumnWarning> {
    let mut keys: Vec<&str> = Vec::new();
    if let Some(hue) = hue {
        keys.push(hue);
    }
    if dataset.dates().len() > 1 {
        keys.push(columns::DATE);
    }
    keys.push(columns::TIME_OF_DAY);

    aggregate(dataset, &keys, metric, Reducer::Mean)
}
