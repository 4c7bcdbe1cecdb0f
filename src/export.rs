// LoRaMetrics - Telemetry aggregation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Table export.
//!
//! One output directory per run: `<table>.csv` for every produced table,
//! plus `summary.json` and `report.json`. Missing values are empty cells.

use crate::analysis::{AnalysisOutput, Table};
use crate::error::ExportError;
use crate::record::{format_number, KeyValue, DATETIME_FORMAT};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the run summary.
pub const SUMMARY_FILE: &str = "summary.json";

/// File name of the run report.
pub const REPORT_FILE: &str = "report.json";

fn cell(value: Option<f64>) -> String {
    value.map(format_number).unwrap_or_default()
}

fn key_cell(key: Option<&KeyValue>) -> String {
    key.map(|k| k.to_string()).unwrap_or_default()
}

/// Write one table as CSV.
pub fn write_table<W: Write>(table: &Table, writer: W) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);

    match table {
        Table::Aggregate(t) => {
            let mut header = t.group_keys.clone();
            header.extend(["value", "count", "synthetic"].map(String::from));
            csv.write_record(&header)?;
            for row in &t.rows {
                let mut record: Vec<String> = row.keys.iter().map(|k| k.to_string()).collect();
                record.push(cell(row.value));
                record.push(row.count.to_string());
                record.push(row.synthetic.to_string());
                csv.write_record(&record)?;
            }
        }
        Table::Stats(t) => {
            let mut header = t.group_keys.clone();
            header.extend(["count", "mean", "std", "min", "max"].map(String::from));
            csv.write_record(&header)?;
            for row in &t.rows {
                let mut record: Vec<String> = row.keys.iter().map(|k| k.to_string()).collect();
                record.push(row.count.to_string());
                record.extend([row.mean, row.std, row.min, row.max].map(cell));
                csv.write_record(&record)?;
            }
        }
        Table::Profile(t) => {
            let mut header = t.group_keys.clone();
            header.push("count".to_string());
            header.extend(t.metrics.iter().cloned());
            csv.write_record(&header)?;
            for row in &t.rows {
                let mut record: Vec<String> = row.keys.iter().map(|k| k.to_string()).collect();
                record.push(row.count.to_string());
                record.extend(row.means.iter().map(|m| cell(*m)));
                csv.write_record(&record)?;
            }
        }
        Table::Series(t) => {
            let segmented = t.segment_column.is_some();
            let mut header = Vec::new();
            if segmented {
                header.push("segment");
            }
            header.extend(["window_start", "date", "time_of_day", "value", "count"]);
            csv.write_record(&header)?;
            for row in &t.rows {
                let mut record = Vec::new();
                if segmented {
                    record.push(key_cell(row.segment.as_ref()));
                }
                record.push(row.window_start.format(DATETIME_FORMAT).to_string());
                record.push(row.date());
                record.push(row.time_of_day());
                record.push(cell(row.value));
                record.push(row.count.to_string());
                csv.write_record(&record)?;
            }
        }
        Table::Histogram(t) => {
            let segmented = t.segment_column.is_some();
            let mut header = Vec::new();
            if segmented {
                header.push("segment");
            }
            header.extend(["bin_start", "bin_end", "count"]);
            csv.write_record(&header)?;
            for bin in &t.bins {
                let mut record = Vec::new();
                if segmented {
                    record.push(key_cell(bin.segment.as_ref()));
                }
                record.push(format_number(bin.start));
                record.push(format_number(bin.end));
                record.push(bin.count.to_string());
                csv.write_record(&record)?;
            }
        }
    }

    csv.flush()?;
    Ok(())
}

/// Write a value as pretty-printed JSON.
pub fn write_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<(), ExportError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

/// Export every table, the summary and the report into `dir`.
///
/// Creates `dir` if needed; returns the written paths.
pub fn export_all(output: &AnalysisOutput, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, ExportError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(output.tables.len() + 2);
    for (name, table) in &output.tables {
        let path = dir.join(format!("{}.csv", name));
        let file = File::create(&path)?;
        write_table(table, BufWriter::new(file))?;
        written.push(path);
    }

    let summary = dir.join(SUMMARY_FILE);
    write_json(&output.summary, &summary)?;
    written.push(summary);

    let report = dir.join(REPORT_FILE);
    write_json(&output.report, &report)?;
    written.push(report);

    info!("Exported {} files to {}", written.len(), dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{AggregateRow, AggregateTable, Reducer};
    use crate::histogram::{Histogram, HistogramBin};
    use crate::resample::{ResampledRow, ResampledSeries};
    use chrono::NaiveDate;

    fn render(table: &Table) -> String {
        let mut buf = Vec::new();
        write_table(table, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_aggregate_layout() {
        let table = Table::Aggregate(AggregateTable {
            group_keys: vec!["nDevicesBinned".to_string()],
            metric: "success".to_string(),
            reducer: Reducer::Mean,
            rows: vec![
                AggregateRow {
                    keys: vec![KeyValue::Number(0.0)],
                    value: None,
                    count: 0,
                    synthetic: true,
                },
                AggregateRow {
                    keys: vec![KeyValue::Number(50.0)],
                    value: Some(0.75),
                    count: 4,
                    synthetic: false,
                },
            ],
            dropped: 0,
        });

        assert_eq!(
            render(&table),
            "nDevicesBinned,value,count,synthetic\n0,,0,true\n50,0.75,4,false\n"
        );
    }

    #[test]
    fn test_series_layout() {
        let start = NaiveDate::from_ymd_opt(2025, 2, 3)
            .unwrap()
            .and_hms_opt(4, 5, 0)
            .unwrap();
        let table = Table::Series(ResampledSeries {
            metric: "rssi".to_string(),
            segment_column: Some("sf".to_string()),
            window_secs: 10,
            rows: vec![ResampledRow {
                segment: Some(KeyValue::Number(7.0)),
                window_start: start,
                value: Some(-101.5),
                count: 2,
            }],
        });

        assert_eq!(
            render(&table),
            "segment,window_start,date,time_of_day,value,count\n\
             7,2025-02-03 04:05:00,2025-02-03,04:05:00,-101.5,2\n"
        );
    }

    #[test]
    fn test_histogram_layout() {
        let table = Table::Histogram(Histogram {
            column: "distance".to_string(),
            segment_column: None,
            bins: vec![HistogramBin {
                segment: None,
                start: 0.0,
                end: 12.5,
                count: 3,
            }],
        });
        assert_eq!(render(&table), "bin_start,bin_end,count\n0,12.5,3\n");
    }
}
