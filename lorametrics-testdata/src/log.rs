// LoRaMetrics Testdata - Simulator log
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Simulator log rows and their CSV / JSON encodings.
//!
//! The CSV layout is the one the network simulator writes: one row per
//! uplink, `interferenceLoss` present only when the interference model is on.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Timestamp layout of the `time` column.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Columns always written, in order.
pub const BASE_COLUMNS: [&str; 20] = [
    "deviceId",
    "messageId",
    "time",
    "x",
    "y",
    "z",
    "distance",
    "txPower",
    "sf",
    "bw",
    "cr",
    "payload",
    "nDevices",
    "rssi",
    "snr",
    "success",
    "energyConsumed",
    "timeOnAir",
    "totalTx",
    "totalRx",
];

/// Column appended when interference is simulated.
pub const INTERFERENCE_COLUMN: &str = "interferenceLoss";

/// Log error types.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One uplink as logged by the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRow {
    pub device_id: u32,
    pub message_id: u32,
    pub time: NaiveDateTime,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub distance: f64,
    pub tx_power: f64,
    pub sf: u8,
    pub bw: u32,
    pub cr: u8,
    pub payload: u32,
    pub n_devices: u32,
    pub rssi: f64,
    pub snr: f64,
    pub success: bool,
    /// Cumulative device energy in mWh up to and including this frame.
    pub energy_consumed: f64,
    /// Milliseconds.
    pub time_on_air: f64,
    pub total_tx: u32,
    pub total_rx: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interference_loss: Option<f64>,
}

/// Log metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Population sizes simulated, in run order.
    #[serde(default)]
    pub populations: Vec<u32>,
}

/// A complete simulator log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulatorLog {
    pub rows: Vec<LogRow>,
    /// Whether rows carry `interferenceLoss`.
    pub interference: bool,
    #[serde(default)]
    pub metadata: LogMetadata,
}

impl SimulatorLog {
    pub fn new(interference: bool) -> Self {
        Self {
            rows: Vec::new(),
            interference,
            metadata: LogMetadata::default(),
        }
    }

    pub fn push(&mut self, row: LogRow) {
        self.rows.push(row);
    }

    /// Append another run. Interference columns survive only if both carry them.
    pub fn append(&mut self, mut other: SimulatorLog) {
        self.interference &= other.interference;
        self.metadata.populations.append(&mut other.metadata.populations);
        self.rows.append(&mut other.rows);
    }

    pub fn rows(&self) -> &[LogRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Delivered fraction of all uplinks.
    pub fn success_rate(&self) -> Option<f64> {
        if self.rows.is_empty() {
            return None;
        }
        let delivered = self.rows.iter().filter(|r| r.success).count();
        Some(delivered as f64 / self.rows.len() as f64)
    }

    pub fn with_scenario(mut self, name: &str) -> Self {
        self.metadata.scenario = Some(name.to_string());
        self
    }

    /// Column names in write order.
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = BASE_COLUMNS.to_vec();
        if self.interference {
            columns.push(INTERFERENCE_COLUMN);
        }
        columns
    }

    /// Write the CSV encoding.
    pub fn write_csv<W: Write>(&self, mut writer: W) -> Result<(), LogError> {
        writeln!(writer, "{}", self.columns().join(","))?;

        for row in &self.rows {
            write!(
                writer,
                "{},{},{},{:.2},{:.2},{:.2},{:.2},{},{},{},{},{},{},{:.2},{:.2},{},{},{:.2},{},{}",
                row.device_id,
                row.message_id,
                row.time.format(TIME_FORMAT),
                row.x,
                row.y,
                row.z,
                row.distance,
                row.tx_power,
                row.sf,
                row.bw,
                row.cr,
                row.payload,
                row.n_devices,
                row.rssi,
                row.snr,
                u8::from(row.success),
                row.energy_consumed,
                row.time_on_air,
                row.total_tx,
                row.total_rx,
            )?;
            if self.interference {
                match row.interference_loss {
                    Some(loss) => write!(writer, ",{:.2}", loss)?,
                    None => write!(writer, ",")?,
                }
            }
            writeln!(writer)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Export to CSV file.
    pub fn to_csv(&self, path: impl AsRef<Path>) -> Result<(), LogError> {
        let file = File::create(path)?;
        self.write_csv(BufWriter::new(file))
    }

    /// CSV encoding in memory.
    pub fn to_csv_string(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail
        if self.write_csv(&mut buf).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Export to JSON file.
    pub fn to_json(&self, path: impl AsRef<Path>) -> Result<(), LogError> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Import from JSON file.
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let file = File::open(path)?;
        let log = serde_json::from_reader(BufReader::new(file))?;
        Ok(log)
    }
}
