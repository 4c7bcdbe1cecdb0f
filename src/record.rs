// LoRaMetrics - Telemetry aggregation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Telemetry record types.
//!
//! A [`TelemetryRecord`] is one simulated transmission attempt. Columns the
//! simulator may omit are `Option`s; enrichment fields are filled by the
//! mobility classifier and the derived-metric computer.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Column names as they appear in simulator logs and output tables.
pub mod columns {
    pub const DEVICE_ID: &str = "deviceId";
    pub const MESSAGE_ID: &str = "messageId";
    pub const TIME: &str = "time";
    pub const X: &str = "x";
    pub const Y: &str = "y";
    pub const SF: &str = "sf";
    pub const TX_POWER: &str = "txPower";
    pub const BW: &str = "bw";
    pub const PAYLOAD: &str = "payload";
    pub const SUCCESS: &str = "success";
    pub const RSSI: &str = "rssi";
    pub const SNR: &str = "snr";
    pub const ENERGY_CONSUMED: &str = "energyConsumed";
    pub const TIME_ON_AIR: &str = "timeOnAir";
    pub const INTERFERENCE_LOSS: &str = "interferenceLoss";
    pub const DISTANCE: &str = "distance";
    pub const N_DEVICES: &str = "nDevices";

    // Synthetic, derived at load time from `time`
    pub const DATE: &str = "date";
    pub const TIME_OF_DAY: &str = "timeOfDay";

    // Enrichment
    pub const MOBILITY_TYPE: &str = "mobilityType";
    pub const ENERGY_EFFICIENCY: &str = "energyEfficiency";
    pub const N_DEVICES_BINNED: &str = "nDevicesBinned";

    // Composite legend keys
    pub const SF_PAYLOAD: &str = "sf_payload";
    pub const SF_TX_POWER: &str = "sf_txPower";
    pub const TX_POWER_BW: &str = "txPower_bw";

    /// Columns with a typed field on [`super::TelemetryRecord`].
    pub const KNOWN: &[&str] = &[
        DEVICE_ID,
        MESSAGE_ID,
        TIME,
        X,
        Y,
        SF,
        TX_POWER,
        BW,
        PAYLOAD,
        SUCCESS,
        RSSI,
        SNR,
        ENERGY_CONSUMED,
        TIME_ON_AIR,
        INTERFERENCE_LOSS,
        DISTANCE,
        N_DEVICES,
    ];
}

/// Display format of the `time` column.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Display format of the `date` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Display format of the `timeOfDay` column.
pub const TIME_OF_DAY_FORMAT: &str = "%H:%M:%S";

/// Per-device mobility classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MobilityType {
    Static,
    Mobile,
}

impl MobilityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MobilityType::Static => "static",
            MobilityType::Mobile => "mobile",
        }
    }
}

impl fmt::Display for MobilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A categorical value used as a grouping key.
///
/// Numbers order before text; numbers compare with `f64::total_cmp` so that
/// sorting is total and stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    Number(f64),
    Text(String),
}

impl KeyValue {
    /// Numeric view of the key, if it is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            KeyValue::Number(v) => Some(*v),
            KeyValue::Text(_) => None,
        }
    }

    /// Whether the key is the number zero.
    pub fn is_zero(&self) -> bool {
        matches!(self, KeyValue::Number(v) if *v == 0.0)
    }
}

impl PartialEq for KeyValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyValue {}

impl PartialOrd for KeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyValue::Number(a), KeyValue::Number(b)) => a.total_cmp(b),
            (KeyValue::Number(_), KeyValue::Text(_)) => Ordering::Less,
            (KeyValue::Text(_), KeyValue::Number(_)) => Ordering::Greater,
            (KeyValue::Text(a), KeyValue::Text(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Number(v) => write!(f, "{}", format_number(*v)),
            KeyValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for KeyValue {
    fn from(s: &str) -> Self {
        KeyValue::Text(s.to_string())
    }
}

impl From<f64> for KeyValue {
    fn from(v: f64) -> Self {
        KeyValue::Number(v)
    }
}

/// Format a number the way a spreadsheet would show it: integral values
/// without a fractional part.
pub fn format_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// One simulated transmission attempt.
#[derive(Debug, Clone)]
pub struct TelemetryRecord {
    pub device_id: Option<String>,
    pub message_id: Option<u64>,
    pub time: Option<NaiveDateTime>,
    /// Position in meters.
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub sf: Option<u8>,
    /// Transmit power in dBm.
    pub tx_power: Option<f64>,
    /// Bandwidth in Hz.
    pub bw: Option<f64>,
    /// Payload size in bytes.
    pub payload: Option<u32>,
    pub success: bool,
    pub rssi: Option<f64>,
    pub snr: Option<f64>,
    /// Energy in milliwatt-hours.
    pub energy_consumed: Option<f64>,
    /// Time on air in milliseconds.
    pub time_on_air: Option<f64>,
    pub interference_loss: Option<f64>,
    pub distance: Option<f64>,
    pub n_devices: Option<u32>,
    /// Columns without a typed field, verbatim.
    pub extra: BTreeMap<String, String>,

    // Enrichment
    pub mobility_type: Option<MobilityType>,
    /// Bits per joule; NaN when undefined.
    pub energy_efficiency: f64,
    pub n_devices_binned: Option<u32>,
    /// Composite legend keys, by column name.
    pub composites: BTreeMap<String, String>,
}

impl Default for TelemetryRecord {
    fn default() -> Self {
        Self {
            device_id: None,
            message_id: None,
            time: None,
            x: None,
            y: None,
            sf: None,
            tx_power: None,
            bw: None,
            payload: None,
            success: false,
            rssi: None,
            snr: None,
            energy_consumed: None,
            time_on_air: None,
            interference_loss: None,
            distance: None,
            n_devices: None,
            extra: BTreeMap::new(),
            mobility_type: None,
            energy_efficiency: f64::NAN,
            n_devices_binned: None,
            composites: BTreeMap::new(),
        }
    }
}

impl TelemetryRecord {
    /// Create a record with only the mandatory outcome set.
    pub fn new(success: bool) -> Self {
        Self {
            success,
            ..Default::default()
        }
    }

    pub fn with_device(mut self, device_id: &str) -> Self {
        self.device_id = Some(device_id.to_string());
        self
    }

    pub fn with_message_id(mut self, message_id: u64) -> Self {
        self.message_id = Some(message_id);
        self
    }

    pub fn with_time(mut self, time: NaiveDateTime) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn with_radio(mut self, sf: u8, tx_power: f64) -> Self {
        self.sf = Some(sf);
        self.tx_power = Some(tx_power);
        self
    }

    pub fn with_bw(mut self, bw: f64) -> Self {
        self.bw = Some(bw);
        self
    }

    pub fn with_payload(mut self, payload: u32) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_link(mut self, rssi: f64, snr: f64) -> Self {
        self.rssi = Some(rssi);
        self.snr = Some(snr);
        self
    }

    pub fn with_energy(mut self, energy_consumed: f64) -> Self {
        self.energy_consumed = Some(energy_consumed);
        self
    }

    pub fn with_time_on_air(mut self, time_on_air: f64) -> Self {
        self.time_on_air = Some(time_on_air);
        self
    }

    pub fn with_interference(mut self, loss: f64) -> Self {
        self.interference_loss = Some(loss);
        self
    }

    pub fn with_distance(mut self, distance: f64) -> Self {
        self.distance = Some(distance);
        self
    }

    pub fn with_n_devices(mut self, n_devices: u32) -> Self {
        self.n_devices = Some(n_devices);
        self
    }

    pub fn with_extra(mut self, column: &str, value: &str) -> Self {
        self.extra.insert(column.to_string(), value.to_string());
        self
    }

    /// Calendar date of the timestamp.
    pub fn date(&self) -> Option<NaiveDate> {
        self.time.map(|t| t.date())
    }

    /// Time-of-day of the timestamp.
    pub fn time_of_day(&self) -> Option<NaiveTime> {
        self.time.map(|t| t.time())
    }

    /// Position pair, if both coordinates are known.
    pub fn position(&self) -> Option<(f64, f64)> {
        self.x.zip(self.y)
    }

    /// Categorical view of a column, for grouping.
    ///
    /// Returns `None` when the value is missing (including NaN).
    pub fn key(&self, column: &str) -> Option<KeyValue> {
        use columns::*;

        match column {
            DEVICE_ID => self.device_id.as_deref().map(|id| {
                match id.parse::<f64>() {
                    Ok(v) if v.is_finite() => KeyValue::Number(v),
                    _ => KeyValue::Text(id.to_string()),
                }
            }),
            TIME => self
                .time
                .map(|t| KeyValue::Text(t.format(DATETIME_FORMAT).to_string())),
            DATE => self
                .date()
                .map(|d| KeyValue::Text(d.format(DATE_FORMAT).to_string())),
            TIME_OF_DAY => self
                .time_of_day()
                .map(|t| KeyValue::Text(t.format(TIME_OF_DAY_FORMAT).to_string())),
            MOBILITY_TYPE => self
                .mobility_type
                .map(|m| KeyValue::Text(m.as_str().to_string())),
            _ => {
                if let Some(v) = self.composites.get(column) {
                    return Some(KeyValue::Text(v.clone()));
                }
                if let Some(v) = self.numeric(column) {
                    return Some(KeyValue::Number(v));
                }
                self.extra
                    .get(column)
                    .filter(|s| !s.is_empty())
                    .map(|s| KeyValue::Text(s.clone()))
            }
        }
    }

    /// Numeric view of a column, for reductions.
    ///
    /// `success` reads as 0/1. Missing values and NaN markers read as `None`.
    pub fn metric(&self, column: &str) -> Option<f64> {
        self.numeric(column)
    }

    fn numeric(&self, column: &str) -> Option<f64> {
        use columns::*;

        let value = match column {
            MESSAGE_ID => self.message_id.map(|v| v as f64),
            X => self.x,
            Y => self.y,
            SF => self.sf.map(f64::from),
            TX_POWER => self.tx_power,
            BW => self.bw,
            PAYLOAD => self.payload.map(f64::from),
            SUCCESS => Some(if self.success { 1.0 } else { 0.0 }),
            RSSI => self.rssi,
            SNR => self.snr,
            ENERGY_CONSUMED => self.energy_consumed,
            TIME_ON_AIR => self.time_on_air,
            INTERFERENCE_LOSS => self.interference_loss,
            DISTANCE => self.distance,
            N_DEVICES => self.n_devices.map(f64::from),
            ENERGY_EFFICIENCY => Some(self.energy_efficiency),
            N_DEVICES_BINNED => self.n_devices_binned.map(f64::from),
            _ => self.extra.get(column).and_then(|s| s.trim().parse().ok()),
        };
        value.filter(|v| !v.is_nan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ordering_numbers_before_text() {
        let mut keys = vec![
            KeyValue::from("mobile"),
            KeyValue::Number(12.0),
            KeyValue::Number(7.0),
            KeyValue::from("static"),
        ];
        keys.sort();
        assert_eq!(keys[0], KeyValue::Number(7.0));
        assert_eq!(keys[1], KeyValue::Number(12.0));
        assert_eq!(keys[2], KeyValue::from("mobile"));
        assert_eq!(keys[3], KeyValue::from("static"));
    }

    #[test]
    fn test_key_display() {
        assert_eq!(KeyValue::Number(125000.0).to_string(), "125000");
        assert_eq!(KeyValue::Number(13.5).to_string(), "13.5");
        assert_eq!(KeyValue::from("7-20").to_string(), "7-20");
    }

    #[test]
    fn test_success_metric_is_binary() {
        assert_eq!(TelemetryRecord::new(true).metric("success"), Some(1.0));
        assert_eq!(TelemetryRecord::new(false).metric("success"), Some(0.0));
    }

    #[test]
    fn test_nan_reads_as_missing() {
        let record = TelemetryRecord::new(true);
        assert!(record.energy_efficiency.is_nan());
        assert_eq!(record.metric("energyEfficiency"), None);
        assert_eq!(record.key("energyEfficiency"), None);
    }

    #[test]
    fn test_extra_columns() {
        let record = TelemetryRecord::new(true)
            .with_extra("cr", "1")
            .with_extra("scenario", "rural");
        assert_eq!(record.metric("cr"), Some(1.0));
        assert_eq!(record.key("cr"), Some(KeyValue::Number(1.0)));
        assert_eq!(record.key("scenario"), Some(KeyValue::from("rural")));
        assert_eq!(record.key("unknown"), None);
    }

    #[test]
    fn test_numeric_device_ids_sort_as_numbers() {
        let mut keys: Vec<KeyValue> = ["2", "10", "1", "gw-a"]
            .iter()
            .filter_map(|id| TelemetryRecord::new(true).with_device(id).key("deviceId"))
            .collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                KeyValue::Number(1.0),
                KeyValue::Number(2.0),
                KeyValue::Number(10.0),
                KeyValue::from("gw-a"),
            ]
        );
        assert_eq!(keys[2].to_string(), "10");
    }

    #[test]
    fn test_date_and_time_of_day_keys() {
        let time = NaiveDate::from_ymd_opt(2025, 7, 10)
            .unwrap()
            .and_hms_opt(18, 18, 34)
            .unwrap();
        let record = TelemetryRecord::new(true).with_time(time);
        assert_eq!(record.key("date"), Some(KeyValue::from("2025-07-10")));
        assert_eq!(record.key("timeOfDay"), Some(KeyValue::from("18:18:34")));
        assert_eq!(
            record.key("time"),
            Some(KeyValue::from("2025-07-10 18:18:34"))
        );
    }
}
