// LoRaMetrics Testdata - Synthetic simulator logs
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # LoRaMetrics Testdata
//!
//! Synthetic LoRaWAN simulator logs for exercising LoRaMetrics.
//!
//! Logs follow the column layout of the network simulator, so they load
//! through the same path as real runs. The crate provides:
//!
//! - **Radio model**: rural path loss, per-SF sensitivity, LoRa time on air
//! - **Motion**: fixed placement or random waypoint inside a disc
//! - **Interference**: additive environmental losses per frame
//! - **Contention**: optional pure-ALOHA collisions that grow with population
//! - **Scenario presets**: static, mobile, mixed, mixed with interference
//!
//! ## Quick Start
//!
//! ```rust
//! use lorametrics_testdata::{generate_log, GeneratorConfig, Scenario};
//!
//! let config = Scenario::Mixed
//!     .config()
//!     .with_devices(36)
//!     .with_messages(4)
//!     .with_seed(42);
//!
//! let log = generate_log(&config);
//! assert_eq!(log.len(), 36 * 4);
//!
//! let csv = log.to_csv_string();
//! assert!(csv.starts_with("deviceId,messageId,time,"));
//! ```
//!
//! ## Population Sweeps
//!
//! [`generate_sweep`] runs the same configuration at several population
//! sizes and concatenates the runs, which gives the `nDevices` column
//! enough spread for per-bucket tables.

pub mod generator;
pub mod log;
pub mod motion;
pub mod radio;
pub mod scenario;

// Re-exports for convenience
pub use generator::{generate_log, generate_sweep, GeneratorConfig, ParamCombo};
pub use log::{LogError, LogMetadata, LogRow, SimulatorLog};
pub use motion::Motion;
pub use radio::{Channel, InterferenceModel};
pub use scenario::Scenario;
