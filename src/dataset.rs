// LoRaMetrics - Telemetry aggregation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Dataset structures and record ingestion.
//!
//! A [`Dataset`] owns every record of one simulator log together with the set
//! of columns present in it. Enrichment passes add columns in place; nothing
//! ever removes a record.

use crate::error::{DataLoadError, MissingColumnWarning};
use crate::record::{columns, TelemetryRecord};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Accepted layouts of the `time` column, besides plain seconds.
const TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
];

/// An ordered collection of telemetry records sharing one schema.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Present column names, sorted.
    columns: BTreeSet<String>,
    /// Records in source order.
    records: Vec<TelemetryRecord>,
}

impl Dataset {
    /// Create an empty dataset with the given schema.
    ///
    /// `date` and `timeOfDay` are added whenever `time` is present.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set: BTreeSet<String> = columns
            .into_iter()
            .map(|c| c.as_ref().trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if set.contains(columns::TIME) {
            set.insert(columns::DATE.to_string());
            set.insert(columns::TIME_OF_DAY.to_string());
        }
        Self {
            columns: set,
            records: Vec::new(),
        }
    }

    /// Create a dataset from already-built records.
    pub fn from_records<I, S>(columns: I, records: Vec<TelemetryRecord>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dataset = Self::new(columns);
        dataset.records = records;
        dataset
    }

    /// Load a simulator log from a delimited file with one header row.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self, DataLoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DataLoadError::NotFound(path.to_path_buf()));
        }

        let file = File::open(path)?;
        let dataset = Self::from_reader(BufReader::new(file))?;

        info!(
            "Loaded {}: {} records, columns [{}]",
            path.display(),
            dataset.len(),
            dataset.columns().join(", ")
        );
        Ok(dataset)
    }

    /// Load a simulator log from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DataLoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

        // First occurrence wins on duplicate headers
        let mut index: HashMap<&str, usize> = HashMap::new();
        for (i, name) in headers.iter().enumerate() {
            if !name.is_empty() {
                index.entry(name.as_str()).or_insert(i);
            }
        }

        if !index.contains_key(columns::SUCCESS) {
            return Err(DataLoadError::MissingColumn(columns::SUCCESS.to_string()));
        }

        let extra_columns: Vec<(&str, usize)> = index
            .iter()
            .filter(|(name, _)| !columns::KNOWN.contains(name))
            .map(|(name, i)| (*name, *i))
            .collect();

        let mut dataset = Dataset::new(index.keys());
        let mut time_notation: Option<TimeNotation> = None;

        for result in reader.records() {
            let row = result?;
            let line = row.position().map(|p| p.line()).unwrap_or(0);
            let cells = RowCells {
                row: &row,
                index: &index,
                line,
            };

            let mut record = TelemetryRecord::new(cells.success()?);
            record.device_id = cells.text(columns::DEVICE_ID);
            record.message_id = cells.unsigned(columns::MESSAGE_ID)?;
            if let Some((time, kind)) = cells.time(columns::TIME)? {
                // Calendar and epoch-second cells cannot share one time axis
                if *time_notation.get_or_insert(kind) != kind {
                    return Err(cells.invalid(columns::TIME));
                }
                record.time = Some(time);
            }
            record.x = cells.float(columns::X)?;
            record.y = cells.float(columns::Y)?;
            record.sf = cells.unsigned(columns::SF)?;
            record.tx_power = cells.float(columns::TX_POWER)?;
            record.bw = cells.float(columns::BW)?;
            record.payload = cells.unsigned(columns::PAYLOAD)?;
            record.rssi = cells.float(columns::RSSI)?;
            record.snr = cells.float(columns::SNR)?;
            record.energy_consumed = cells.float(columns::ENERGY_CONSUMED)?;
            record.time_on_air = cells.float(columns::TIME_ON_AIR)?;
            record.interference_loss = cells.float(columns::INTERFERENCE_LOSS)?;
            record.distance = cells.float(columns::DISTANCE)?;
            record.n_devices = cells.unsigned(columns::N_DEVICES)?;

            if record.payload == Some(0) {
                return Err(cells.invalid(columns::PAYLOAD));
            }
            if record.energy_consumed.is_some_and(|e| e < 0.0) {
                return Err(cells.invalid(columns::ENERGY_CONSUMED));
            }

            for (name, i) in &extra_columns {
                if let Some(cell) = row.get(*i) {
                    record.extra.insert(name.to_string(), cell.to_string());
                }
            }

            dataset.records.push(record);
        }

        debug!(
            "Parsed {} records, {} extra columns",
            dataset.records.len(),
            extra_columns.len()
        );
        Ok(dataset)
    }

    /// Present column names, sorted.
    pub fn columns(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.as_str()).collect()
    }

    /// Whether a column is present (source or derived).
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    /// Check that a column is present before running `operation`.
    pub fn require(&self, column: &str, operation: &str) -> Result<(), MissingColumnWarning> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(MissingColumnWarning::new(column, operation))
        }
    }

    /// Check several columns at once; reports the first absent one.
    pub fn require_all(
        &self,
        columns: &[&str],
        operation: &str,
    ) -> Result<(), MissingColumnWarning> {
        columns
            .iter()
            .try_for_each(|column| self.require(column, operation))
    }

    /// Register a derived column.
    pub(crate) fn add_column(&mut self, column: &str) {
        self.columns.insert(column.to_string());
    }

    /// Append a record.
    pub fn push(&mut self, record: TelemetryRecord) {
        self.records.push(record);
    }

    /// All records, in source order.
    pub fn records(&self) -> &[TelemetryRecord] {
        &self.records
    }

    pub(crate) fn records_mut(&mut self) -> &mut [TelemetryRecord] {
        &mut self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct device identifiers, in order of first appearance.
    pub fn device_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter_map(|r| r.device_id.as_deref())
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Distinct calendar dates, sorted.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let set: BTreeSet<NaiveDate> = self.records.iter().filter_map(|r| r.date()).collect();
        set.into_iter().collect()
    }

    /// Earliest and latest timestamp.
    pub fn time_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let mut times = self.records.iter().filter_map(|r| r.time);
        let first = times.next()?;
        Some(times.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))))
    }

    /// Records carrying a timestamp, stably sorted by time.
    pub fn sorted_by_time(&self) -> Vec<&TelemetryRecord> {
        let mut sorted: Vec<&TelemetryRecord> =
            self.records.iter().filter(|r| r.time.is_some()).collect();
        sorted.sort_by_key(|r| r.time);
        sorted
    }

    /// A column as a vector of numeric values.
    pub fn column(&self, column: &str) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.metric(column)).collect()
    }
}

/// Typed access to the cells of one CSV row.
struct RowCells<'a> {
    row: &'a csv::StringRecord,
    index: &'a HashMap<&'a str, usize>,
    line: u64,
}

impl RowCells<'_> {
    fn raw(&self, column: &str) -> Option<&str> {
        let i = *self.index.get(column)?;
        self.row.get(i).filter(|cell| !is_missing(cell))
    }

    fn invalid(&self, column: &str) -> DataLoadError {
        let i = self.index.get(column).copied();
        DataLoadError::InvalidValue {
            line: self.line,
            column: column.to_string(),
            value: i
                .and_then(|i| self.row.get(i))
                .unwrap_or_default()
                .to_string(),
        }
    }

    fn text(&self, column: &str) -> Option<String> {
        self.raw(column).map(|s| s.to_string())
    }

    fn float(&self, column: &str) -> Result<Option<f64>, DataLoadError> {
        self.raw(column)
            .map(|s| s.parse::<f64>().map_err(|_| self.invalid(column)))
            .transpose()
    }

    /// Integer cell; integral floats such as `7.0` are accepted.
    fn unsigned<T>(&self, column: &str) -> Result<Option<T>, DataLoadError>
    where
        T: FromStr + TryFrom<u64>,
    {
        let Some(s) = self.raw(column) else {
            return Ok(None);
        };
        if let Ok(v) = s.parse::<T>() {
            return Ok(Some(v));
        }
        let v: f64 = s.parse().map_err(|_| self.invalid(column))?;
        if v < 0.0 || v.fract() != 0.0 || v > u64::MAX as f64 {
            return Err(self.invalid(column));
        }
        T::try_from(v as u64)
            .map(Some)
            .map_err(|_| self.invalid(column))
    }

    fn success(&self) -> Result<bool, DataLoadError> {
        let s = self
            .raw(columns::SUCCESS)
            .ok_or_else(|| self.invalid(columns::SUCCESS))?;
        parse_bool(s).ok_or_else(|| self.invalid(columns::SUCCESS))
    }

    fn time(
        &self,
        column: &str,
    ) -> Result<Option<(NaiveDateTime, TimeNotation)>, DataLoadError> {
        self.raw(column)
            .map(|s| parse_time_notation(s).ok_or_else(|| self.invalid(column)))
            .transpose()
    }
}

fn is_missing(cell: &str) -> bool {
    cell.is_empty()
        || cell.eq_ignore_ascii_case("nan")
        || cell.eq_ignore_ascii_case("na")
        || cell.eq_ignore_ascii_case("null")
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        return Some(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Some(false);
    }
    match s.parse::<f64>() {
        Ok(v) if v == 1.0 => Some(true),
        Ok(v) if v == 0.0 => Some(false),
        _ => None,
    }
}

/// How a `time` cell was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeNotation {
    Calendar,
    EpochSeconds,
}

/// Parse a timestamp cell: a calendar date-time, or seconds since the epoch.
pub fn parse_time(s: &str) -> Option<NaiveDateTime> {
    parse_time_notation(s).map(|(t, _)| t)
}

fn parse_time_notation(s: &str) -> Option<(NaiveDateTime, TimeNotation)> {
    for format in TIME_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, format) {
            return Some((t, TimeNotation::Calendar));
        }
    }

    let secs: f64 = s.parse().ok()?;
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
        .map(|t| (t.naive_utc(), TimeNotation::EpochSeconds))
}
