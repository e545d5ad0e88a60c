//! Synthetic automotive telemetry
//!
//! Drive profile: idle, first acceleration, hold, second acceleration, hold
//! at high speed, deceleration, idle. Every channel derives from engine RPM
//! plus seeded gaussian noise, so the same seed always yields the same data.

use crate::data::dataset::Dataset;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::PI;

const IDLE_RPM: f64 = 800.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockConfig {
    #[serde(default = "default_duration")]
    pub duration: f64,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_duration() -> f64 {
    60.0
}

fn default_sample_rate() -> f64 {
    100.0
}

fn default_seed() -> u64 {
    42
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            duration: default_duration(),
            sample_rate: default_sample_rate(),
            seed: default_seed(),
        }
    }
}

/// Gaussian sampler using the Box-Muller transform
struct Noise {
    rng: StdRng,
}

impl Noise {
    fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn normal(&mut self, mean: f64, std: f64) -> f64 {
        let u1: f64 = self.rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = self.rng.gen();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
        mean + std * z
    }
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Generate the mock drive.
pub fn generate(config: &MockConfig) -> Dataset {
    let n = (config.duration * config.sample_rate).max(0.0) as usize;
    let time = linspace(0.0, config.duration, n);
    let mut noise = Noise::new(config.seed);

    let rpm: Vec<f64> = time
        .iter()
        .map(|&t| {
            if t < 5.0 {
                IDLE_RPM + noise.normal(0.0, 20.0)
            } else if t < 15.0 {
                let p = (t - 5.0) / 10.0;
                IDLE_RPM + (3000.0 - IDLE_RPM) * p + noise.normal(0.0, 30.0)
            } else if t < 20.0 {
                3000.0 + noise.normal(0.0, 50.0)
            } else if t < 30.0 {
                let p = (t - 20.0) / 10.0;
                3000.0 + 2000.0 * p + noise.normal(0.0, 70.0)
            } else if t < 40.0 {
                5000.0 + noise.normal(0.0, 100.0)
            } else if t < 50.0 {
                let p = (t - 40.0) / 10.0;
                5000.0 - (5000.0 - IDLE_RPM) * p + noise.normal(0.0, 50.0)
            } else {
                IDLE_RPM + noise.normal(0.0, 20.0)
            }
        })
        .collect();

    let load = |r: f64| (r - IDLE_RPM) / 5000.0;

    let speed: Vec<f64> = rpm
        .iter()
        .map(|&r| {
            let base = if r <= IDLE_RPM + 100.0 {
                0.0
            } else {
                (r - IDLE_RPM) / 100.0 * 1.5
            };
            (base + noise.normal(0.0, 0.5)).max(0.0)
        })
        .collect();

    let engine_temp: Vec<f64> = time
        .iter()
        .zip(&rpm)
        .map(|(&t, &r)| {
            20.0 + 70.0 * (1.0 - (-t / 15.0).exp()) + noise.normal(0.0, 0.3) + load(r) * 5.0
        })
        .collect();

    let throttle: Vec<f64> = time
        .iter()
        .map(|&t| {
            let v = if t < 5.0 {
                noise.normal(5.0, 1.0)
            } else if t < 15.0 {
                5.0 + (t - 5.0) / 10.0 * 40.0 + noise.normal(0.0, 2.0)
            } else if t < 20.0 {
                noise.normal(30.0, 3.0)
            } else if t < 30.0 {
                30.0 + (t - 20.0) / 10.0 * 50.0 + noise.normal(0.0, 3.0)
            } else if t < 40.0 {
                noise.normal(70.0, 5.0)
            } else if t < 50.0 {
                70.0 - (t - 40.0) / 10.0 * 65.0 + noise.normal(0.0, 2.0)
            } else {
                noise.normal(5.0, 1.0)
            };
            v.clamp(0.0, 100.0)
        })
        .collect();

    let fuel: Vec<f64> = rpm
        .iter()
        .zip(&throttle)
        .map(|(&r, &th)| {
            let rpm_factor = r / 6000.0;
            let efficiency = 1.0 - 0.5 * (1.0 - (1.0 - 2.0 * (rpm_factor - 0.5).abs()).powi(2));
            let v = 5.0 + 15.0 * (th / 100.0) * efficiency + noise.normal(0.0, 0.3);
            v.max(0.0)
        })
        .collect();

    let battery: Vec<f64> = rpm
        .iter()
        .map(|&r| 12.6 - load(r) * 0.4 + load(r) * 0.8 + noise.normal(0.0, 0.05))
        .collect();

    let ambient: Vec<f64> = (0..n).map(|_| 20.0 + noise.normal(0.0, 0.2)).collect();

    let oil: Vec<f64> = rpm
        .iter()
        .map(|&r| (1.0 + load(r) * 4.0 + noise.normal(0.0, 0.1)).max(0.0))
        .collect();

    let signals = vec![
        ("engineRPM".to_string(), rpm),
        ("vehicleSpeed".to_string(), speed),
        ("engineTemp".to_string(), engine_temp),
        ("throttlePosition".to_string(), throttle),
        ("fuelConsumption".to_string(), fuel),
        ("batteryVoltage".to_string(), battery),
        ("ambientTemp".to_string(), ambient),
        ("oilPressure".to_string(), oil),
    ];

    Dataset::new(time, signals, &HashMap::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> MockConfig {
        MockConfig {
            duration: 60.0,
            sample_rate: 10.0,
            seed: 7,
        }
    }

    #[test]
    fn test_shape_and_units() {
        let ds = generate(&small());
        assert_eq!(ds.len(), 600);
        assert_eq!(ds.signals().len(), 8);
        assert_eq!(ds.unit("engineRPM"), "rpm");
        assert_eq!(ds.unit("fuelConsumption"), "L/100km");
        assert!((ds.metadata().duration - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_seed_is_deterministic() {
        assert_eq!(generate(&small()), generate(&small()));
        let other = generate(&MockConfig { seed: 8, ..small() });
        assert_ne!(generate(&small()), other);
    }

    #[test]
    fn test_profile_bounds() {
        let ds = generate(&small());
        let throttle = &ds.signal("throttlePosition").unwrap().samples;
        assert!(throttle.iter().all(|v| (0.0..=100.0).contains(v)));
        let speed = &ds.signal("vehicleSpeed").unwrap().samples;
        assert!(speed.iter().all(|v| *v >= 0.0));
        let rpm = &ds.signal("engineRPM").unwrap().samples;
        let peak = rpm.iter().cloned().fold(f64::MIN, f64::max);
        assert!(peak > 4500.0);
    }
}
