// LoRaMetrics - Telemetry aggregation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Equal-width histograms of one numeric column.
//!
//! Bin edges are computed once over the observed range of the whole column,
//! so segmented histograms share edges and stay comparable.

use crate::dataset::Dataset;
use crate::error::MissingColumnWarning;
use crate::record::KeyValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One bin. The last bin of a histogram includes its upper edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub segment: Option<KeyValue>,
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub column: String,
    pub segment_column: Option<String>,
    /// Bins ordered by segment, then by lower edge.
    pub bins: Vec<HistogramBin>,
}

impl Histogram {
    /// Total number of counted values.
    pub fn total(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }

    /// Bins of one segment.
    pub fn segment<'a>(&'a self, segment: &'a KeyValue) -> impl Iterator<Item = &'a HistogramBin> {
        self.bins
            .iter()
            .filter(move |b| b.segment.as_ref() == Some(segment))
    }
}

/// Bin edges over `[min, max]`. A degenerate range is widened by 0.5 on
/// each side.
fn edges(min: f64, max: f64, bins: usize) -> Vec<f64> {
    let (lo, hi) = if min == max {
        (min - 0.5, max + 0.5)
    } else {
        (min, max)
    };
    let width = (hi - lo) / bins as f64;
    (0..=bins)
        .map(|i| if i == bins { hi } else { lo + width * i as f64 })
        .collect()
}

fn bin_index(value: f64, edges: &[f64]) -> usize {
    let bins = edges.len() - 1;
    let lo = edges[0];
    let hi = edges[bins];
    if value >= hi {
        return bins - 1;
    }
    let idx = ((value - lo) / (hi - lo) * bins as f64).floor() as usize;
    idx.min(bins - 1)
}

/// Histogram of `column` with `bins` equal-width bins, optionally one per
/// value of `segment`.
///
/// Records with a missing value (or a missing segment) are not counted.
pub fn histogram(
    dataset: &Dataset,
    column: &str,
    bins: usize,
    segment: Option<&str>,
) -> Result<Histogram, MissingColumnWarning> {
    let operation = format!("histogram of {}", column);
    dataset.require(column, &operation)?;
    if let Some(segment) = segment {
        dataset.require(segment, &operation)?;
    }
    let bins = bins.max(1);

    let mut values: BTreeMap<Option<KeyValue>, Vec<f64>> = BTreeMap::new();
    for record in dataset.records() {
        let Some(value) = record.metric(column) else {
            continue;
        };
        let key = match segment {
            Some(segment) => match record.key(segment) {
                Some(key) => Some(key),
                None => continue,
            },
            None => None,
        };
        values.entry(key).or_default().push(value);
    }

    let all = values.values().flatten().copied();
    let range = all.fold(None, |acc: Option<(f64, f64)>, v| match acc {
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        None => Some((v, v)),
    });

    let mut out = Vec::new();
    if let Some((min, max)) = range {
        let edges = edges(min, max, bins);
        for (key, group) in values {
            let mut counts = vec![0usize; bins];
            for v in group {
                counts[bin_index(v, &edges)] += 1;
            }
            out.extend(counts.into_iter().enumerate().map(|(i, count)| HistogramBin {
                segment: key.clone(),
                start: edges[i],
                end: edges[i + 1],
                count,
            }));
        }
    }

    Ok(Histogram {
        column: column.to_string(),
        segment_column: segment.map(str::to_string),
        bins: out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TelemetryRecord;

    fn distances(values: &[f64]) -> Dataset {
        let records = values
            .iter()
            .enumerate()
            .map(|(i, d)| {
                TelemetryRecord::new(true)
                    .with_distance(*d)
                    .with_device(if i % 2 == 0 { "a" } else { "b" })
            })
            .collect();
        Dataset::from_records(["success", "distance", "deviceId"], records)
    }

    #[test]
    fn test_equal_width_bins() {
        let dataset = distances(&[0.0, 1.0, 2.0, 3.0, 4.0, 10.0]);
        let hist = histogram(&dataset, "distance", 5, None).unwrap();

        assert_eq!(hist.bins.len(), 5);
        assert_eq!(hist.bins[0].start, 0.0);
        assert_eq!(hist.bins[4].end, 10.0);
        assert_eq!(hist.bins[0].count, 2);
        assert_eq!(hist.bins[1].count, 2);
        assert_eq!(hist.bins[2].count, 1);
        // Upper edge lands in the last bin
        assert_eq!(hist.bins[4].count, 1);
        assert_eq!(hist.total(), 6);
    }

    #[test]
    fn test_degenerate_range() {
        let dataset = distances(&[5.0, 5.0]);
        let hist = histogram(&dataset, "distance", 4, None).unwrap();
        assert_eq!(hist.bins[0].start, 4.5);
        assert_eq!(hist.bins[3].end, 5.5);
        assert_eq!(hist.total(), 2);
    }

    #[test]
    fn test_segmented_bins_share_edges() {
        let dataset = distances(&[0.0, 1.0, 2.0, 9.0]);
        let hist = histogram(&dataset, "distance", 3, Some("deviceId")).unwrap();

        assert_eq!(hist.bins.len(), 6);
        let a = KeyValue::from("a");
        let b = KeyValue::from("b");
        let a_edges: Vec<f64> = hist.segment(&a).map(|bin| bin.start).collect();
        let b_edges: Vec<f64> = hist.segment(&b).map(|bin| bin.start).collect();
        assert_eq!(a_edges, b_edges);
        assert_eq!(hist.segment(&a).map(|bin| bin.count).sum::<usize>(), 2);
    }

    #[test]
    fn test_empty_column() {
        let dataset = Dataset::from_records(["success", "distance"], Vec::new());
        let hist = histogram(&dataset, "distance", 10, None).unwrap();
        assert!(hist.bins.is_empty());
    }

    #[test]
    fn test_missing_column() {
        let dataset = distances(&[1.0]);
        let warning = histogram(&dataset, "interferenceLoss", 10, None).unwrap_err();
        assert_eq!(warning.column, "interferenceLoss");
    }
}
