// LoRaMetrics Testdata - Radio link model
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Link budget of a single uplink.
//!
//! Rural log-distance path loss, per-SF receiver sensitivity at 125 kHz,
//! LoRa time on air, and an additive environmental interference term.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Gateway antenna height in meters.
pub const GATEWAY_HEIGHT_M: f64 = 20.0;

/// Lowest SNR at which a frame can still be demodulated.
pub const SNR_FLOOR_DB: f64 = -20.0;

/// Path loss in dB at `distance_m` from the gateway.
pub fn path_loss_db(distance_m: f64) -> f64 {
    120.0 + 30.0 * (distance_m.max(1.0) / 1000.0).log10()
}

/// Receiver sensitivity in dBm.
pub fn sensitivity_dbm(sf: u8) -> f64 {
    match sf {
        7 => -123.0,
        8 => -126.0,
        9 => -129.0,
        10 => -132.0,
        11 => -133.0,
        12 => -136.0,
        _ => -130.0,
    }
}

/// Time on air in milliseconds, explicit header, CRC on, no low data rate
/// optimization. `cr` is the coding-rate index (1 for 4/5).
pub fn time_on_air_ms(sf: u8, bw_hz: u32, payload: u32, cr: u8) -> f64 {
    let sf = f64::from(sf);
    let t_sym = 2f64.powf(sf) / f64::from(bw_hz) * 1000.0;
    let payload_bits = 8.0 * f64::from(payload) - 4.0 * sf + 28.0 + 16.0;
    let extra = (payload_bits / (4.0 * sf) * (f64::from(cr) + 4.0)).ceil().max(0.0);
    let preamble = (8.0 + 4.25) * t_sym;
    preamble + (8.0 + extra) * t_sym
}

/// Energy of one transmission in mWh.
pub fn tx_energy_mwh(tx_power_dbm: f64, time_on_air_ms: f64) -> f64 {
    let power_w = 10f64.powf(tx_power_dbm / 10.0) / 1000.0;
    let joules = power_w * time_on_air_ms / 1000.0;
    joules / 3.6
}

/// Environmental losses, each drawn uniformly per frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterferenceModel {
    pub rain_db: (f64, f64),
    pub wind_db: (f64, f64),
    pub buildings_db: (f64, f64),
    pub vegetation_db: (f64, f64),
    pub neighbor_networks_db: (f64, f64),
}

impl Default for InterferenceModel {
    fn default() -> Self {
        Self {
            rain_db: (1.0, 3.0),
            wind_db: (0.5, 2.0),
            buildings_db: (5.0, 15.0),
            vegetation_db: (2.0, 8.0),
            neighbor_networks_db: (1.0, 5.0),
        }
    }
}

impl InterferenceModel {
    /// Draw the total loss of one frame.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        [
            self.rain_db,
            self.wind_db,
            self.buildings_db,
            self.vegetation_db,
            self.neighbor_networks_db,
        ]
        .iter()
        .map(|(lo, hi)| rng.gen_range(*lo..*hi))
        .sum()
    }

    pub fn max_db(&self) -> f64 {
        self.rain_db.1
            + self.wind_db.1
            + self.buildings_db.1
            + self.vegetation_db.1
            + self.neighbor_networks_db.1
    }
}

/// Outcome of one uplink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkOutcome {
    pub rssi: f64,
    pub snr: f64,
    pub interference_loss: f64,
    pub success: bool,
}

/// Radio channel between one device and the gateway.
#[derive(Debug, Clone)]
pub struct Channel {
    shadowing: Option<Normal<f64>>,
    interference: Option<InterferenceModel>,
    /// Frames on air per second from the rest of the population, per channel.
    offered_load: f64,
}

impl Channel {
    pub fn new(shadowing_std_db: f64, interference: Option<InterferenceModel>) -> Self {
        Self {
            shadowing: Normal::new(0.0, shadowing_std_db)
                .ok()
                .filter(|_| shadowing_std_db > 0.0),
            interference,
            offered_load: 0.0,
        }
    }

    /// Pure-ALOHA contention from `others` devices sending every
    /// `interval_secs` across `channels` channels.
    pub fn with_contention(mut self, others: u32, interval_secs: f64, channels: u32) -> Self {
        if interval_secs > 0.0 && channels > 0 {
            self.offered_load = f64::from(others) / interval_secs / f64::from(channels);
        }
        self
    }

    /// Transmit one frame.
    pub fn transmit<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        distance_m: f64,
        tx_power_dbm: f64,
        sf: u8,
        time_on_air_ms: f64,
    ) -> LinkOutcome {
        let interference_loss = self
            .interference
            .as_ref()
            .map_or(0.0, |model| model.sample(rng));
        let shadowing = self.shadowing.map_or(0.0, |n| n.sample(rng));

        let slant = (distance_m * distance_m + GATEWAY_HEIGHT_M * GATEWAY_HEIGHT_M).sqrt();
        let rssi = tx_power_dbm - path_loss_db(slant) - interference_loss + shadowing;
        let snr = rng.gen_range(-20.0..10.0) - interference_loss / 10.0;

        // Vulnerable period of pure ALOHA is twice the frame duration
        let load = self.offered_load * time_on_air_ms / 1000.0;
        let collided = load > 0.0 && rng.gen::<f64>() > (-2.0 * load).exp();

        LinkOutcome {
            rssi,
            snr,
            interference_loss,
            success: rssi > sensitivity_dbm(sf) && snr > SNR_FLOOR_DB && !collided,
        }
    }
}
