// LoRaMetrics - Telemetry aggregation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Derived per-record metrics.
//!
//! Each derivation checks its input columns first. An absent column yields a
//! [`MissingColumnWarning`] and leaves the dataset untouched; an undefined
//! value (zero or missing denominator) yields `f64::NAN` on that record only.

use crate::dataset::Dataset;
use crate::error::MissingColumnWarning;
use crate::record::{columns, TelemetryRecord};
use tracing::debug;

/// Joules per milliwatt-hour.
pub const JOULES_PER_MWH: f64 = 3.6;

/// Energy efficiency in bits delivered per joule.
///
/// NaN when the energy is zero or unknown, or the payload is unknown.
pub fn energy_efficiency(payload: Option<u32>, energy_consumed_mwh: Option<f64>) -> f64 {
    match (payload, energy_consumed_mwh) {
        (Some(payload), Some(energy)) if energy != 0.0 => {
            (f64::from(payload) * 8.0) / (energy * JOULES_PER_MWH)
        }
        _ => f64::NAN,
    }
}

/// Lower edge of the fixed-width bucket containing `n_devices`.
///
/// `width` must be positive.
pub fn device_bucket(n_devices: u32, width: u32) -> u32 {
    (n_devices / width) * width
}

/// Column name of the composite key built from two columns.
pub fn composite_column(first: &str, second: &str) -> String {
    format!("{}_{}", first, second)
}

/// Add the `energyEfficiency` column.
pub fn add_energy_efficiency(dataset: &mut Dataset) -> Result<(), MissingColumnWarning> {
    dataset.require_all(
        &[columns::PAYLOAD, columns::ENERGY_CONSUMED],
        "energy efficiency",
    )?;

    let mut undefined = 0usize;
    for record in dataset.records_mut() {
        record.energy_efficiency = energy_efficiency(record.payload, record.energy_consumed);
        if record.energy_efficiency.is_nan() {
            undefined += 1;
        }
    }
    dataset.add_column(columns::ENERGY_EFFICIENCY);

    debug!("Energy efficiency undefined for {} records", undefined);
    Ok(())
}

/// Add the `nDevicesBinned` column.
pub fn add_device_buckets(dataset: &mut Dataset, width: u32) -> Result<(), MissingColumnWarning> {
    dataset.require(columns::N_DEVICES, "device-count buckets")?;

    let width = width.max(1);
    for record in dataset.records_mut() {
        record.n_devices_binned = record.n_devices.map(|n| device_bucket(n, width));
    }
    dataset.add_column(columns::N_DEVICES_BINNED);
    Ok(())
}

/// Add a composite legend key `"{first}{separator}{second}"`.
///
/// Records missing either part get no composite value. Returns the new
/// column name.
pub fn add_composite_key(
    dataset: &mut Dataset,
    first: &str,
    second: &str,
    separator: &str,
) -> Result<String, MissingColumnWarning> {
    let column = composite_column(first, second);
    dataset.require_all(&[first, second], &format!("composite key {}", column))?;

    for record in dataset.records_mut() {
        match composite_value(record, first, second, separator) {
            Some(value) => {
                record.composites.insert(column.clone(), value);
            }
            None => {
                record.composites.remove(&column);
            }
        }
    }
    dataset.add_column(&column);
    Ok(column)
}

fn composite_value(
    record: &TelemetryRecord,
    first: &str,
    second: &str,
    separator: &str,
) -> Option<String> {
    let a = record.key(first)?;
    let b = record.key(second)?;
    Some(format!("{}{}{}", a, separator, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_energy_efficiency_formula() {
        let value = energy_efficiency(Some(20), Some(0.01));
        assert_relative_eq!(value, 160.0 / 0.036, max_relative = 1e-12);
        assert_relative_eq!(value, 4444.444444, epsilon = 1e-3);
    }

    #[test]
    fn test_energy_efficiency_undefined() {
        assert!(energy_efficiency(Some(20), Some(0.0)).is_nan());
        assert!(energy_efficiency(Some(20), None).is_nan());
        assert!(energy_efficiency(None, Some(0.01)).is_nan());
    }

    #[test]
    fn test_device_bucket_bounds() {
        for n in [0u32, 1, 49, 50, 51, 99, 100, 149, 1234] {
            let bucket = device_bucket(n, 50);
            assert_eq!(bucket % 50, 0);
            assert!(bucket <= n);
            assert!(n < bucket + 50);
        }
        assert_eq!(device_bucket(149, 50), 100);
    }

    #[test]
    fn test_add_energy_efficiency() {
        let records = vec![
            TelemetryRecord::new(true).with_payload(20).with_energy(0.01),
            TelemetryRecord::new(true).with_payload(20).with_energy(0.0),
        ];
        let mut dataset =
            Dataset::from_records(["success", "payload", "energyConsumed"], records);

        add_energy_efficiency(&mut dataset).unwrap();

        assert!(dataset.has_column("energyEfficiency"));
        assert_relative_eq!(
            dataset.records()[0].energy_efficiency,
            4444.444444444444,
            max_relative = 1e-9
        );
        assert!(dataset.records()[1].energy_efficiency.is_nan());
    }

    #[test]
    fn test_energy_efficiency_requires_energy_column() {
        let mut dataset = Dataset::from_records(
            ["success", "payload"],
            vec![TelemetryRecord::new(true).with_payload(20)],
        );
        let warning = add_energy_efficiency(&mut dataset).unwrap_err();
        assert_eq!(warning.column, "energyConsumed");
        assert!(!dataset.has_column("energyEfficiency"));
    }

    #[test]
    fn test_add_device_buckets() {
        let records = vec![
            TelemetryRecord::new(true).with_n_devices(75),
            TelemetryRecord::new(true),
        ];
        let mut dataset = Dataset::from_records(["success", "nDevices"], records);
        add_device_buckets(&mut dataset, 50).unwrap();

        assert_eq!(dataset.records()[0].n_devices_binned, Some(50));
        assert_eq!(dataset.records()[1].n_devices_binned, None);
    }

    #[test]
    fn test_composite_key() {
        let records = vec![
            TelemetryRecord::new(true).with_radio(7, 14.0).with_payload(20),
            TelemetryRecord::new(true).with_radio(12, 20.0),
        ];
        let mut dataset = Dataset::from_records(["success", "sf", "txPower", "payload"], records);

        let column = add_composite_key(&mut dataset, "sf", "payload", "-").unwrap();
        assert_eq!(column, "sf_payload");
        assert_eq!(
            dataset.records()[0].composites.get("sf_payload").map(|s| s.as_str()),
            Some("7-20")
        );
        assert!(dataset.records()[1].composites.get("sf_payload").is_none());
        assert!(dataset.has_column("sf_payload"));
    }

    #[test]
    fn test_composite_key_missing_part() {
        let mut dataset = Dataset::from_records(["success", "txPower"], Vec::new());
        let warning = add_composite_key(&mut dataset, "txPower", "bw", "-").unwrap_err();
        assert_eq!(warning.column, "bw");
        assert_eq!(warning.operation, "composite key txPower_bw");
    }
}
