// LoRaMetrics - Telemetry aggregation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Whole-run statistics.

use crate::dataset::Dataset;
use crate::mobility::{position_bits, MobilityDistribution, MobilityIndex};
use crate::record::{columns, TelemetryRecord};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Running statistics of one numeric column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub count: u64,
    pub mean: Option<f64>,
    /// Sample variance.
    pub variance: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    #[serde(skip)]
    sum: f64,
    #[serde(skip)]
    sum_sq: f64,
}

impl ColumnStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistics over every observed value of `column`.
    pub fn of_column(dataset: &Dataset, column: &str) -> Option<Self> {
        if !dataset.has_column(column) {
            return None;
        }
        let mut stats = Self::new();
        for value in dataset.column(column).into_iter().flatten() {
            stats.add_sample(value);
        }
        Some(stats)
    }

    pub fn add_sample(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        self.recompute();
    }

    fn recompute(&mut self) {
        let n = self.count as f64;
        let mean = self.sum / n;
        self.mean = Some(mean);
        self.variance = if self.count > 1 {
            Some(((self.sum_sq - n * mean * mean) / (n - 1.0)).max(0.0))
        } else {
            None
        };
    }
}

/// Spread of the observed positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSpread {
    pub unique_positions: usize,
    pub x_variance: Option<f64>,
    pub y_variance: Option<f64>,
    /// Mean distance travelled between consecutive transmissions of a device.
    pub mean_movement: Option<f64>,
}

/// Headline numbers of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_messages: usize,
    pub devices: usize,
    pub period_start: Option<NaiveDateTime>,
    pub period_end: Option<NaiveDateTime>,
    /// Overall delivery ratio.
    pub success_rate: Option<f64>,
    pub mean_rssi: Option<f64>,
    pub mean_snr: Option<f64>,
    pub distance: Option<ColumnStats>,
    pub mean_energy_consumed: Option<f64>,
    pub mean_interference_loss: Option<f64>,
    pub mobility: Option<MobilityDistribution>,
    pub positions: Option<PositionSpread>,
}

impl RunSummary {
    /// Summarize a dataset. Absent columns leave their fields empty.
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let mean_of = |column: &str| ColumnStats::of_column(dataset, column).and_then(|s| s.mean);
        let (period_start, period_end) = dataset.time_range().unzip();

        Self {
            total_messages: dataset.len(),
            devices: dataset.device_ids().len(),
            period_start,
            period_end,
            success_rate: mean_of(columns::SUCCESS),
            mean_rssi: mean_of(columns::RSSI),
            mean_snr: mean_of(columns::SNR),
            distance: ColumnStats::of_column(dataset, columns::DISTANCE),
            mean_energy_consumed: mean_of(columns::ENERGY_CONSUMED),
            mean_interference_loss: mean_of(columns::INTERFERENCE_LOSS),
            mobility: MobilityIndex::build(dataset).ok().map(|m| m.distribution()),
            positions: position_spread(dataset),
        }
    }
}

fn position_spread(dataset: &Dataset) -> Option<PositionSpread> {
    dataset
        .require_all(&[columns::X, columns::Y], "position spread")
        .ok()?;

    let unique: HashSet<(u64, u64)> = dataset
        .records()
        .iter()
        .filter_map(|r| r.position())
        .map(|(x, y)| (position_bits(x), position_bits(y)))
        .collect();

    let variance = |column: &str| ColumnStats::of_column(dataset, column).and_then(|s| s.variance);

    Some(PositionSpread {
        unique_positions: unique.len(),
        x_variance: variance(columns::X),
        y_variance: variance(columns::Y),
        mean_movement: mean_movement(dataset),
    })
}

/// Mean step length between time-ordered transmissions of each device.
pub fn mean_movement(dataset: &Dataset) -> Option<f64> {
    let mut tracks: HashMap<&str, Vec<&TelemetryRecord>> = HashMap::new();
    for record in dataset.records() {
        if let Some(id) = record.device_id.as_deref() {
            tracks.entry(id).or_default().push(record);
        }
    }

    let mut steps = ColumnStats::new();
    for track in tracks.values_mut() {
        // Untimed records keep source order after the timed ones
        track.sort_by_key(|r| (r.time.is_none(), r.time));
        let positions: Vec<(f64, f64)> = track.iter().filter_map(|r| r.position()).collect();
        for pair in positions.windows(2) {
            let (dx, dy) = (pair[1].0 - pair[0].0, pair[1].1 - pair[0].1);
            steps.add_sample((dx * dx + dy * dy).sqrt());
        }
    }
    steps.mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MobilityType;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn at(s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(10, 0, s)
            .unwrap()
    }

    fn dataset() -> Dataset {
        let records = vec![
            TelemetryRecord::new(true)
                .with_device("A")
                .with_time(at(0))
                .with_position(0.0, 0.0)
                .with_link(-100.0, 4.0)
                .with_distance(100.0),
            TelemetryRecord::new(false)
                .with_device("A")
                .with_time(at(10))
                .with_position(0.0, 0.0)
                .with_link(-110.0, 2.0)
                .with_distance(100.0),
            TelemetryRecord::new(true)
                .with_device("B")
                .with_time(at(20))
                .with_position(3.0, 4.0)
                .with_link(-90.0, 6.0)
                .with_distance(300.0),
            TelemetryRecord::new(true)
                .with_device("B")
                .with_time(at(5))
                .with_position(0.0, 0.0)
                .with_link(-120.0, 0.0)
                .with_distance(500.0),
        ];
        Dataset::from_records(
            ["deviceId", "time", "x", "y", "success", "rssi", "snr", "distance"],
            records,
        )
    }

    #[test]
    fn test_run_summary() {
        let summary = RunSummary::from_dataset(&dataset());

        assert_eq!(summary.total_messages, 4);
        assert_eq!(summary.devices, 2);
        assert_eq!(summary.period_start, Some(at(0)));
        assert_eq!(summary.period_end, Some(at(20)));
        assert_eq!(summary.success_rate, Some(0.75));
        assert_eq!(summary.mean_rssi, Some(-105.0));
        assert_eq!(summary.mean_snr, Some(3.0));

        let distance = summary.distance.unwrap();
        assert_eq!(distance.mean, Some(250.0));
        assert_eq!(distance.min, Some(100.0));
        assert_eq!(distance.max, Some(500.0));

        assert_eq!(summary.mean_energy_consumed, None);
        assert_eq!(summary.mean_interference_loss, None);

        let mobility = summary.mobility.unwrap();
        assert_eq!(mobility.devices(MobilityType::Static), 1);
        assert_eq!(mobility.devices(MobilityType::Mobile), 1);
    }

    #[test]
    fn test_position_spread() {
        let spread = RunSummary::from_dataset(&dataset()).positions.unwrap();
        assert_eq!(spread.unique_positions, 2);
        // A never moves; B moves 5 m between its two timed records
        assert_relative_eq!(spread.mean_movement.unwrap(), 5.0 / 2.0, max_relative = 1e-12);
        assert!(spread.x_variance.unwrap() > 0.0);
    }

    #[test]
    fn test_signed_zero_is_one_position() {
        let records = vec![
            TelemetryRecord::new(true).with_device("A").with_position(0.0, 0.0),
            TelemetryRecord::new(true).with_device("A").with_position(-0.0, 0.0),
            TelemetryRecord::new(true).with_device("A").with_position(0.0, -0.0),
        ];
        let dataset = Dataset::from_records(["deviceId", "x", "y", "success"], records);
        let summary = RunSummary::from_dataset(&dataset);

        assert_eq!(summary.positions.unwrap().unique_positions, 1);
        let mobility = summary.mobility.unwrap();
        assert_eq!(mobility.devices(MobilityType::Static), 1);
    }

    #[test]
    fn test_partial_schema() {
        let dataset = Dataset::from_records(
            ["success"],
            vec![TelemetryRecord::new(true), TelemetryRecord::new(false)],
        );
        let summary = RunSummary::from_dataset(&dataset);

        assert_eq!(summary.total_messages, 2);
        assert_eq!(summary.success_rate, Some(0.5));
        assert!(summary.mean_rssi.is_none());
        assert!(summary.distance.is_none());
        assert!(summary.mobility.is_none());
        assert!(summary.positions.is_none());
    }

    #[test]
    fn test_column_stats() {
        let mut stats = ColumnStats::new();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stats.add_sample(v);
        }
        assert_eq!(stats.count, 8);
        assert_eq!(stats.mean, Some(5.0));
        assert_relative_eq!(stats.variance.unwrap(), 32.0 / 7.0, max_relative = 1e-12);
        assert_eq!(stats.min, Some(2.0));
        assert_eq!(stats.max, Some(9.0));
    }
}
