// LoRaMetrics Testdata - Deployment scenarios
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Preset deployments.
//!
//! Each preset fixes the parameter grid, population, area, and mobility
//! share of one logistics deployment. Callers usually shrink the
//! population before generating.

use crate::generator::GeneratorConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deployment preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// Fixed sensors over a 5 km disc.
    Static,
    /// Tracked assets, all moving, 3 km disc.
    Mobile,
    /// Half fixed, half moving, three SFs.
    Mixed,
    /// Mixed fleet under rain, wind, buildings and neighboring networks.
    MixedInterference,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::Static,
        Scenario::Mobile,
        Scenario::Mixed,
        Scenario::MixedInterference,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Static => "static",
            Scenario::Mobile => "mobile",
            Scenario::Mixed => "mixed",
            Scenario::MixedInterference => "mixed_interference",
        }
    }

    /// Generator configuration of the preset.
    pub fn config(&self) -> GeneratorConfig {
        let wide = GeneratorConfig::new()
            .with_spreading_factors(&[7, 8, 9, 10, 11])
            .with_tx_powers(&[2.0, 8.0])
            .with_payloads(&[50, 100, 150, 200, 250])
            .with_bandwidths(&[125_000, 250_000]);

        match self {
            Scenario::Static => wide
                .with_devices(1000)
                .with_mobile_ratio(0.0)
                .with_area_radius(5000.0),
            Scenario::Mobile => wide
                .with_spreading_factors(&[7, 8, 9, 10, 12])
                .with_devices(50)
                .with_mobile_ratio(1.0)
                .with_area_radius(3000.0),
            Scenario::Mixed => GeneratorConfig::new()
                .with_devices(1000)
                .with_mobile_ratio(0.5)
                .with_area_radius(5000.0),
            Scenario::MixedInterference => wide
                .with_devices(1000)
                .with_mobile_ratio(0.5)
                .with_area_radius(1000.0)
                .with_interference(),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
