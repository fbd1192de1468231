use breathcore::acquisition::{AccelScale, STANDARD_GRAVITY};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Shape of the synthetic chest-worn accelerometer signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub breaths_per_minute: f64,
    /// Peak breathing excursion along the sensor z axis, m/s².
    pub breath_amplitude: f64,
    /// Uniform per-axis noise bound, m/s².
    pub noise: f64,
    /// Angle between gravity and the sensor z axis, degrees.
    pub tilt_deg: f64,
    /// Breathing stops after this many seconds.
    pub apnea_after_s: Option<f64>,
    pub seed: u64,
    /// Front end the raw counts are emitted for.
    pub scale: AccelScale,
    pub description: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            breaths_per_minute: 18.0,
            breath_amplitude: 0.15,
            noise: 0.01,
            tilt_deg: 20.0,
            apnea_after_s: None,
            seed: 0,
            scale: AccelScale::default(),
            description: None,
        }
    }
}

/// Endless stream of raw `(x, y, z)` readings at a fixed sample rate.
pub struct AccelGenerator {
    config: GeneratorConfig,
    sample_rate_hz: f64,
    rng: StdRng,
    index: u64,
}

impl AccelGenerator {
    pub fn new(config: &GeneratorConfig, sample_rate_hz: f64) -> Self {
        Self {
            config: config.clone(),
            sample_rate_hz,
            rng: StdRng::seed_from_u64(config.seed),
            index: 0,
        }
    }

    fn jitter(&mut self) -> f64 {
        if self.config.noise > 0.0 {
            self.rng.gen_range(-self.config.noise..self.config.noise)
        } else {
            0.0
        }
    }

    fn breathing(&self, t: f64) -> f64 {
        let apnea = self
            .config
            .apnea_after_s
            .map_or(false, |onset| t >= onset);
        if apnea {
            return 0.0;
        }
        let hz = self.config.breaths_per_minute / 60.0;
        self.config.breath_amplitude * (2.0 * PI * hz * t).sin()
    }
}

impl Iterator for AccelGenerator {
    type Item = [f64; 3];

    fn next(&mut self) -> Option<Self::Item> {
        let t = self.index as f64 / self.sample_rate_hz;
        self.index += 1;

        let tilt = self.config.tilt_deg.to_radians();
        let x = self.jitter();
        let y = STANDARD_GRAVITY * tilt.sin() + self.jitter();
        let z = STANDARD_GRAVITY * tilt.cos() + self.breathing(t) + self.jitter();

        let scale = self.config.scale;
        let raw = |physical: f64| match scale {
            AccelScale::Physical => physical,
            _ => scale.to_raw(physical).round(),
        };
        Some([raw(x), raw(y), raw(z)])
    }
}

/// A finite recording of `seconds` worth of raw readings.
pub fn recording(config: &GeneratorConfig, sample_rate_hz: f64, seconds: f64) -> Vec<[f64; 3]> {
    let count = (seconds * sample_rate_hz).round() as usize;
    AccelGenerator::new(config, sample_rate_hz).take(count).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_has_requested_length() {
        let samples = recording(&GeneratorConfig::default(), 48.72, 10.0);
        assert_eq!(samples.len(), 487);
    }

    #[test]
    fn same_seed_same_stream() {
        let config = GeneratorConfig {
            seed: 13,
            ..Default::default()
        };
        assert_eq!(recording(&config, 20.0, 5.0), recording(&config, 20.0, 5.0));

        let other = GeneratorConfig {
            seed: 14,
            ..config.clone()
        };
        assert_ne!(recording(&other, 20.0, 5.0), recording(&config, 20.0, 5.0));
    }

    #[test]
    fn wide_range_counts_sit_near_one_g() {
        let config = GeneratorConfig {
            breath_amplitude: 0.0,
            noise: 0.0,
            tilt_deg: 0.0,
            ..Default::default()
        };
        let first = AccelGenerator::new(&config, 20.0).next().unwrap();
        assert_eq!(first, [0.0, 0.0, 16000.0]);
    }

    #[test]
    fn apnea_flattens_the_breathing_axis() {
        let config = GeneratorConfig {
            noise: 0.0,
            apnea_after_s: Some(5.0),
            scale: AccelScale::Physical,
            ..Default::default()
        };
        let samples = recording(&config, 20.0, 10.0);
        let resting = samples[100][2];
        assert!(samples[100..].iter().all(|s| (s[2] - resting).abs() < 1e-12));
        assert!(samples[..100].iter().any(|s| (s[2] - resting).abs() > 0.1));
    }
}
