// LoRaMetrics - Telemetry aggregation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Per-device mobility classification.
//!
//! Devices are grouped by identifier, each group gets exactly one label, and
//! the label is broadcast back to every record of the group. A device is
//! [`MobilityType::Static`] when all its records share one `(x, y)` position.

use crate::dataset::Dataset;
use crate::error::MissingColumnWarning;
use crate::record::{columns, MobilityType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Device identifier to label mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MobilityIndex {
    labels: HashMap<String, MobilityType>,
}

impl MobilityIndex {
    /// Build the index from the positions observed in a dataset.
    pub fn build(dataset: &Dataset) -> Result<Self, MissingColumnWarning> {
        dataset.require_all(
            &[columns::DEVICE_ID, columns::X, columns::Y],
            "mobility classification",
        )?;

        // Positions are compared bitwise; -0.0 and 0.0 are the same spot
        let mut positions: HashMap<&str, HashSet<(u64, u64)>> = HashMap::new();
        for record in dataset.records() {
            let Some(device_id) = record.device_id.as_deref() else {
                continue;
            };
            let seen = positions.entry(device_id).or_default();
            if let Some((x, y)) = record.position() {
                seen.insert((position_bits(x), position_bits(y)));
            }
        }

        let labels = positions
            .into_iter()
            .map(|(device_id, seen)| {
                let label = if seen.len() <= 1 {
                    MobilityType::Static
                } else {
                    MobilityType::Mobile
                };
                (device_id.to_string(), label)
            })
            .collect();

        Ok(Self { labels })
    }

    /// Label of a device.
    pub fn get(&self, device_id: &str) -> Option<MobilityType> {
        self.labels.get(device_id).copied()
    }

    /// Number of classified devices.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Device counts per label.
    pub fn distribution(&self) -> MobilityDistribution {
        let mut counts: BTreeMap<MobilityType, usize> = BTreeMap::new();
        for label in self.labels.values() {
            *counts.entry(*label).or_default() += 1;
        }
        let total = self.labels.len();
        let entries = counts
            .into_iter()
            .map(|(mobility_type, devices)| MobilityShare {
                mobility_type,
                devices,
                fraction: devices as f64 / total as f64,
            })
            .collect();
        MobilityDistribution { total, entries }
    }
}

/// Share of devices per mobility label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobilityDistribution {
    /// Number of classified devices.
    pub total: usize,
    /// One entry per label observed, static first.
    pub entries: Vec<MobilityShare>,
}

impl MobilityDistribution {
    /// Number of devices with a given label.
    pub fn devices(&self, mobility_type: MobilityType) -> usize {
        self.entries
            .iter()
            .find(|e| e.mobility_type == mobility_type)
            .map_or(0, |e| e.devices)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobilityShare {
    pub mobility_type: MobilityType,
    pub devices: usize,
    pub fraction: f64,
}

/// Classify every device and attach the label to each of its records.
///
/// Re-running on a labeled dataset recomputes identical labels.
pub fn classify(dataset: &mut Dataset) -> Result<MobilityIndex, MissingColumnWarning> {
    let index = MobilityIndex::build(dataset)?;

    for record in dataset.records_mut() {
        record.mobility_type = record.device_id.as_deref().and_then(|id| index.get(id));
    }
    dataset.add_column(columns::MOBILITY_TYPE);

    debug!(
        "Classified {} devices: {:?}",
        index.len(),
        index.distribution().entries
    );
    Ok(index)
}

/// Bit pattern of a coordinate with `-0.0` folded onto `0.0`.
pub(crate) fn position_bits(v: f64) -> u64 {
    if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TelemetryRecord;

    fn schema() -> [&'static str; 4] {
        ["deviceId", "x", "y", "success"]
    }

    fn record(device: &str, x: f64, y: f64) -> TelemetryRecord {
        TelemetryRecord::new(true)
            .with_device(device)
            .with_position(x, y)
    }

    #[test]
    fn test_static_and_mobile_devices() {
        let mut records = Vec::new();
        for _ in 0..4 {
            records.push(record("A", 0.0, 0.0));
        }
        for i in 0..4 {
            records.push(record("B", i as f64, 0.0));
        }
        let mut dataset = Dataset::from_records(schema(), records);

        classify(&mut dataset).unwrap();

        for r in dataset.records() {
            let expected = match r.device_id.as_deref() {
                Some("A") => MobilityType::Static,
                _ => MobilityType::Mobile,
            };
            assert_eq!(r.mobility_type, Some(expected));
        }
        assert!(dataset.has_column("mobilityType"));
    }

    #[test]
    fn test_single_record_device_is_static() {
        let mut dataset = Dataset::from_records(schema(), vec![record("solo", 5.0, 7.0)]);
        classify(&mut dataset).unwrap();
        assert_eq!(
            dataset.records()[0].mobility_type,
            Some(MobilityType::Static)
        );
    }

    #[test]
    fn test_return_to_start_is_still_mobile() {
        let records = vec![
            record("C", 0.0, 0.0),
            record("C", 10.0, 0.0),
            record("C", 0.0, 0.0),
        ];
        let mut dataset = Dataset::from_records(schema(), records);
        classify(&mut dataset).unwrap();
        assert!(dataset
            .records()
            .iter()
            .all(|r| r.mobility_type == Some(MobilityType::Mobile)));
    }

    #[test]
    fn test_classification_is_idempotent() {
        let records = vec![
            record("A", 1.0, 1.0),
            record("B", 1.0, 1.0),
            record("B", 2.0, 1.0),
        ];
        let mut dataset = Dataset::from_records(schema(), records);
        let first = classify(&mut dataset).unwrap();
        let labels: Vec<_> = dataset.records().iter().map(|r| r.mobility_type).collect();

        let second = classify(&mut dataset).unwrap();
        let relabeled: Vec<_> = dataset.records().iter().map(|r| r.mobility_type).collect();

        assert_eq!(first, second);
        assert_eq!(labels, relabeled);
    }

    #[test]
    fn test_missing_position_column() {
        let mut dataset = Dataset::from_records(
            ["deviceId", "success"],
            vec![TelemetryRecord::new(true).with_device("A")],
        );
        let warning = classify(&mut dataset).unwrap_err();
        assert_eq!(warning.column, "x");
        assert!(!dataset.has_column("mobilityType"));
    }

    #[test]
    fn test_distribution() {
        let records = vec![
            record("A", 0.0, 0.0),
            record("B", 0.0, 0.0),
            record("C", 0.0, 0.0),
            record("C", 1.0, 0.0),
        ];
        let dataset = Dataset::from_records(schema(), records);
        let distribution = MobilityIndex::build(&dataset).unwrap().distribution();

        assert_eq!(distribution.total, 3);
        assert_eq!(distribution.devices(MobilityType::Static), 2);
        assert_eq!(distribution.devices(MobilityType::Mobile), 1);
        assert_eq!(distribution.entries[0].mobility_type, MobilityType::Static);
        assert!((distribution.entries[1].fraction - 1.0 / 3.0).abs() < 1e-12);
    }
}
