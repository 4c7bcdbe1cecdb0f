// LoRaMetrics - Telemetry aggregation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for LoRaMetrics
//!
//! Three tiers, matching how a run degrades:
//!
//! - [`DataLoadError`]: fatal, the log cannot be turned into a dataset.
//! - [`MissingColumnWarning`] and the wider [`SkipReason`]: one computation
//!   is skipped, the run goes on.
//! - Undefined metric values are not errors at all: per-record columns carry
//!   `f64::NAN`, reduced outputs carry `None`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for LoRaMetrics operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for LoRaMetrics operations
#[derive(Error, Debug)]
pub enum Error {
    /// The input log could not be loaded
    #[error("Load error: {0}")]
    Load(#[from] DataLoadError),

    /// A computation needed a column the dataset does not have
    #[error("{0}")]
    MissingColumn(#[from] MissingColumnWarning),

    /// A computation was left out of the run
    #[error("{0}")]
    Skipped(#[from] SkipReason),

    /// Writing tables failed
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Invalid analysis configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Fatal errors while reading a telemetry log
#[derive(Error, Debug)]
pub enum DataLoadError {
    /// Source file does not exist
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Underlying I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed delimited input
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Mandatory column absent from the header
    #[error("Missing mandatory column: {0}")]
    MissingColumn(String),

    /// A cell could not be decoded into its column type
    #[error("Invalid value at line {line}, column {column}: {value:?}")]
    InvalidValue {
        line: u64,
        column: String,
        value: String,
    },
}

/// A single derived metric or grouping was skipped for lack of a column
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Missing column '{column}' for {operation}")]
pub struct MissingColumnWarning {
    /// Column that was required
    pub column: String,
    /// Operation that needed it
    pub operation: String,
}

impl MissingColumnWarning {
    /// Create a new warning
    pub fn new(column: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            operation: operation.into(),
        }
    }
}

/// Why a table was left out of a run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A required column is absent
    #[error(transparent)]
    MissingColumn(#[from] MissingColumnWarning),

    /// The time span would expand into more windows than allowed
    #[error("{operation} spans {windows} windows, limit is {limit}")]
    TooManyWindows {
        operation: String,
        windows: u64,
        limit: u64,
    },
}

impl SkipReason {
    /// Column the skip is attributed to.
    pub fn column(&self) -> &str {
        match self {
            SkipReason::MissingColumn(warning) => &warning.column,
            SkipReason::TooManyWindows { .. } => crate::record::columns::TIME,
        }
    }
}

/// Errors while writing output tables
#[derive(Error, Debug)]
pub enum ExportError {
    /// Underlying I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
