// LoRaMetrics - Telemetry aggregation engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Analysis configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

/// Master configuration for an analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Width of a device-count bucket (`nDevicesBinned`).
    pub device_bucket_width: u32,

    /// Prepend a missing row at bucket 0 when no record falls there.
    pub anchor_device_buckets: bool,

    /// Resampling window width in seconds.
    pub resample_window_secs: u64,

    /// Separator between the two parts of a composite key.
    pub composite_separator: String,

    /// Bin count for distance histograms.
    pub distance_bins: usize,

    /// Bin count for interference loss histograms.
    pub interference_bins: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            device_bucket_width: 50,
            anchor_device_buckets: true,
            resample_window_secs: 10,
            composite_separator: "-".to_string(),
            distance_bins: 30,
            interference_bins: 50,
        }
    }
}

impl AnalysisConfig {
    /// Load a configuration from a JSON file. Missing fields keep defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let invalid = |e: &dyn std::fmt::Display| {
            Error::InvalidConfig(format!("{}: {}", path.display(), e))
        };
        let file = File::open(path).map_err(|e| invalid(&e))?;
        let config: Self =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| invalid(&e))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every width and bin count is usable.
    pub fn validate(&self) -> Result<()> {
        if self.device_bucket_width == 0 {
            return Err(Error::InvalidConfig(
                "device_bucket_width must be positive".to_string(),
            ));
        }
        if self.resample_window_secs == 0 {
            return Err(Error::InvalidConfig(
                "resample_window_secs must be positive".to_string(),
            ));
        }
        if self.distance_bins == 0 || self.interference_bins == 0 {
            return Err(Error::InvalidConfig(
                "histogram bin counts must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Resampling window as a duration.
    pub fn resample_window(&self) -> Duration {
        Duration::from_secs(self.resample_window_secs)
    }
}
