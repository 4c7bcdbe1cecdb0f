// LoRaMetrics Testdata - Core generator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Core log generation logic.
//!
//! A run places `n_devices` devices in a disc around a single gateway,
//! splits them into contiguous blocks (one per parameter combination), and
//! lets each device send `messages_per_device` uplinks at a fixed interval
//! after a random start offset.

use crate::log::{LogRow, SimulatorLog};
use crate::motion::Motion;
use crate::radio::{time_on_air_ms, tx_energy_mwh, Channel, InterferenceModel};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// One radio parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamCombo {
    pub sf: u8,
    pub tx_power: f64,
    pub payload: u32,
    pub bw: u32,
}

/// Generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Wall-clock time of simulation second zero.
    pub start_time: NaiveDateTime,
    pub n_devices: u32,
    /// Share of each block that moves.
    pub mobile_ratio: f64,
    pub messages_per_device: u32,
    pub interval_secs: f64,
    pub area_radius_m: f64,
    /// Speed range of mobile devices in m/s.
    pub speed_range: (f64, f64),
    pub spreading_factors: Vec<u8>,
    pub tx_powers: Vec<f64>,
    pub payloads: Vec<u32>,
    pub bandwidths: Vec<u32>,
    pub coding_rate: u8,
    /// Environmental losses; `None` omits the `interferenceLoss` column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interference: Option<InterferenceModel>,
    /// Log-normal shadowing deviation in dB. Zero disables it.
    pub shadowing_std_db: f64,
    /// Uplink channels shared by the population; `None` disables collisions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contention_channels: Option<u32>,
    /// Random seed for reproducibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 7, 10)
        .and_then(|d| d.and_hms_opt(18, 18, 34))
        .unwrap_or_default()
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            start_time: default_start(),
            n_devices: 100,
            mobile_ratio: 0.5,
            messages_per_device: 20,
            interval_secs: 15.0,
            area_radius_m: 1000.0,
            speed_range: (0.3, 0.7),
            spreading_factors: vec![7, 9, 12],
            tx_powers: vec![2.0, 8.0],
            payloads: vec![80, 160, 240],
            bandwidths: vec![125_000],
            coding_rate: 1,
            interference: None,
            shadowing_std_db: 0.0,
            contention_channels: None,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    /// Create a new generator config.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start_time(mut self, start: NaiveDateTime) -> Self {
        self.start_time = start;
        self
    }

    pub fn with_devices(mut self, n: u32) -> Self {
        self.n_devices = n;
        self
    }

    /// Share of mobile devices, clamped to [0, 1].
    pub fn with_mobile_ratio(mut self, ratio: f64) -> Self {
        self.mobile_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn with_messages(mut self, n: u32) -> Self {
        self.messages_per_device = n;
        self
    }

    pub fn with_interval_secs(mut self, secs: f64) -> Self {
        self.interval_secs = secs;
        self
    }

    pub fn with_area_radius(mut self, meters: f64) -> Self {
        self.area_radius_m = meters;
        self
    }

    pub fn with_speed_range(mut self, min: f64, max: f64) -> Self {
        self.speed_range = (min, max);
        self
    }

    pub fn with_spreading_factors(mut self, sfs: &[u8]) -> Self {
        self.spreading_factors = sfs.to_vec();
        self
    }

    pub fn with_tx_powers(mut self, powers: &[f64]) -> Self {
        self.tx_powers = powers.to_vec();
        self
    }

    pub fn with_payloads(mut self, payloads: &[u32]) -> Self {
        self.payloads = payloads.to_vec();
        self
    }

    pub fn with_bandwidths(mut self, bandwidths: &[u32]) -> Self {
        self.bandwidths = bandwidths.to_vec();
        self
    }

    /// Enable the default interference model.
    pub fn with_interference(mut self) -> Self {
        self.interference = Some(InterferenceModel::default());
        self
    }

    pub fn with_interference_model(mut self, model: InterferenceModel) -> Self {
        self.interference = Some(model);
        self
    }

    pub fn with_shadowing(mut self, std_db: f64) -> Self {
        self.shadowing_std_db = std_db;
        self
    }

    pub fn with_contention(mut self, channels: u32) -> Self {
        self.contention_channels = Some(channels);
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Cartesian product of the parameter lists, SF outermost.
    pub fn combinations(&self) -> Vec<ParamCombo> {
        let mut combos = Vec::new();
        for &sf in &self.spreading_factors {
            for &tx_power in &self.tx_powers {
                for &payload in &self.payloads {
                    for &bw in &self.bandwidths {
                        combos.push(ParamCombo {
                            sf,
                            tx_power,
                            payload,
                            bw,
                        });
                    }
                }
            }
        }
        combos
    }

    /// Simulated span of one run in seconds.
    pub fn duration_secs(&self) -> f64 {
        f64::from(self.messages_per_device) * self.interval_secs
    }
}

/// Generate one run.
pub fn generate_log(config: &GeneratorConfig) -> SimulatorLog {
    let mut rng: Box<dyn RngCore> = match config.seed {
        Some(s) => Box::new(StdRng::seed_from_u64(s)),
        None => Box::new(StdRng::from_entropy()),
    };
    let mut log = simulate(config, config.n_devices, 0, &mut *rng);
    log.metadata.seed = config.seed;
    log
}

/// Generate one run per population size and concatenate them.
///
/// Device ids keep increasing across runs so every run's devices stay
/// distinct; all runs share the same start time.
pub fn generate_sweep(config: &GeneratorConfig, populations: &[u32]) -> SimulatorLog {
    let mut rng: Box<dyn RngCore> = match config.seed {
        Some(s) => Box::new(StdRng::seed_from_u64(s)),
        None => Box::new(StdRng::from_entropy()),
    };

    let mut log = SimulatorLog::new(config.interference.is_some());
    let mut first_id = 0u32;
    for &n in populations {
        log.append(simulate(config, n, first_id, &mut *rng));
        first_id = first_id.saturating_add(n);
    }
    log.metadata.seed = config.seed;
    log
}

fn simulate(config: &GeneratorConfig, n_devices: u32, first_id: u32, rng: &mut dyn RngCore) -> SimulatorLog {
    let mut log = SimulatorLog::new(config.interference.is_some());
    log.metadata.populations.push(n_devices);

    let combos = config.combinations();
    if combos.is_empty() || n_devices == 0 {
        return log;
    }

    let mut channel = Channel::new(config.shadowing_std_db, config.interference);
    if let Some(channels) = config.contention_channels {
        channel = channel.with_contention(n_devices - 1, config.interval_secs, channels);
    }

    let blocks = combos.len().min(n_devices as usize);
    let per_block = n_devices as usize / blocks;

    for (block, combo) in combos.iter().take(blocks).enumerate() {
        let start = block * per_block;
        // Last block takes the remainder
        let end = if block + 1 == blocks {
            n_devices as usize
        } else {
            start + per_block
        };
        let mobile_count = ((end - start) as f64 * config.mobile_ratio).ceil() as usize;

        for i in 0..end - start {
            let motion = if i < mobile_count {
                Motion::waypoint(rng, config.area_radius_m, config.speed_range)
            } else {
                Motion::fixed(rng, config.area_radius_m)
            };
            let device_id = first_id + (start + i) as u32 + 1;
            let rows = simulate_device(config, &channel, combo, device_id, n_devices, motion, rng);
            for row in rows {
                log.push(row);
            }
        }
    }

    log
}

fn simulate_device(
    config: &GeneratorConfig,
    channel: &Channel,
    combo: &ParamCombo,
    device_id: u32,
    n_devices: u32,
    mut motion: Motion,
    rng: &mut dyn RngCore,
) -> Vec<LogRow> {
    let toa = time_on_air_ms(combo.sf, combo.bw, combo.payload, config.coding_rate);
    let frame_energy = tx_energy_mwh(combo.tx_power, toa);
    let offset = if config.interval_secs > 0.0 {
        rng.gen_range(0.0..config.interval_secs)
    } else {
        0.0
    };

    let mut rows = Vec::with_capacity(config.messages_per_device as usize);
    let mut energy = 0.0;
    let mut elapsed = 0.0;

    for k in 0..config.messages_per_device {
        let send_at = offset + f64::from(k) * config.interval_secs;
        motion.advance(rng, send_at - elapsed);
        elapsed = send_at;

        let (x, y) = motion.position();
        let distance = (x * x + y * y).sqrt();
        let outcome = channel.transmit(rng, distance, combo.tx_power, combo.sf, toa);
        energy += frame_energy;

        rows.push(LogRow {
            device_id,
            message_id: k + 1,
            time: config.start_time + Duration::seconds(send_at as i64),
            x,
            y,
            z: 0.0,
            distance,
            tx_power: combo.tx_power,
            sf: combo.sf,
            bw: combo.bw,
            cr: config.coding_rate,
            payload: combo.payload,
            n_devices,
            rssi: outcome.rssi,
            snr: outcome.snr,
            success: outcome.success,
            energy_consumed: energy,
            time_on_air: toa,
            total_tx: 0,
            total_rx: 0,
            interference_loss: config.interference.map(|_| outcome.interference_loss),
        });
    }

    // Device totals are logged on every row
    let total_tx = rows.len() as u32;
    let total_rx = rows.iter().filter(|r| r.success).count() as u32;
    for row in &mut rows {
        row.total_tx = total_tx;
        row.total_rx = total_rx;
    }
    rows
}
