use crate::config::{CountingPolicy, PipelineConfig};
use crate::math::{PeakFinder, StatsHelper};
use crate::prelude::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

/// Below this many samples per second of window the detector refuses to run.
pub const MIN_SAMPLES_PER_SECOND: f64 = 2.0;

/// One valley-then-peak cycle of the filtered signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreathEvent {
    pub valley_index: usize,
    pub peak_index: usize,
    pub valley_value: f64,
    pub peak_value: f64,
    pub amplitude: f64,
}

/// Everything one detection run found in a filtered window.
#[derive(Debug, Clone, Default)]
pub struct BreathDetection {
    pub peaks: Vec<usize>,
    pub valleys: Vec<usize>,
    pub events: Vec<BreathEvent>,
    pub breath_count: usize,
}

impl BreathDetection {
    /// Mean peak-to-peak spacing of the counted cycles, in seconds.
    pub fn mean_interval_s(&self, sample_rate_hz: f64) -> Option<f64> {
        let peaks: Vec<usize> = self.events.iter().map(|event| event.peak_index).collect();
        StatsHelper::mean_spacing(&peaks).map(|samples| samples / sample_rate_hz)
    }

    /// Breathing rate implied by the mean cycle spacing.
    pub fn interval_rate_bpm(&self, sample_rate_hz: f64) -> Option<f64> {
        self.mean_interval_s(sample_rate_hz)
            .filter(|interval| *interval > 0.0)
            .map(|interval| 60.0 / interval)
    }
}

/// Peak/valley extraction and breath counting over a filtered window.
#[derive(Debug, Clone, Copy)]
pub struct BreathDetector {
    policy: CountingPolicy,
    height_gated: bool,
}

impl BreathDetector {
    pub fn new(policy: CountingPolicy, height_gated: bool) -> Self {
        Self {
            policy,
            height_gated,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.counting_policy, config.height_gated)
    }

    pub fn policy(&self) -> CountingPolicy {
        self.policy
    }

    pub fn detect(
        &self,
        filtered: &[f64],
        min_peak_distance_samples: usize,
        min_amplitude_change: f64,
    ) -> BreathDetection {
        let (peak_height, valley_depth) = if self.height_gated {
            (Some(min_amplitude_change), Some(-min_amplitude_change))
        } else {
            (None, None)
        };
        let peaks = PeakFinder::find(filtered, min_peak_distance_samples, peak_height);
        let valleys = PeakFinder::find_valleys(filtered, min_peak_distance_samples, valley_depth);
        let events = pair_cycles(filtered, &peaks, &valleys, min_amplitude_change);

        let breath_count = match self.policy {
            CountingPolicy::MinCount => peaks.len().min(valleys.len()),
            CountingPolicy::PairedAmplitude => events.len(),
        };

        BreathDetection {
            peaks,
            valleys,
            events,
            breath_count,
        }
    }

    /// Fails when the window holds fewer than two samples per second.
    pub fn ensure_density(available: usize, window_seconds: f64) -> PipelineResult<()> {
        let required = (MIN_SAMPLES_PER_SECOND * window_seconds).ceil() as usize;
        if (available as f64) < MIN_SAMPLES_PER_SECOND * window_seconds {
            return Err(PipelineError::InsufficientSamples {
                available,
                required,
            });
        }
        Ok(())
    }

    /// Breaths per minute.
    pub fn rate(breath_count: usize, window_seconds: f64) -> PipelineResult<f64> {
        if !(window_seconds.is_finite() && window_seconds > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "window_seconds must be positive, got {}",
                window_seconds
            )));
        }
        Ok(breath_count as f64 / window_seconds * 60.0)
    }
}

/// Pairs every valley with the first peak after it (and before the next
/// valley); keeps the pairs whose swing reaches `min_amplitude_change`.
fn pair_cycles(
    filtered: &[f64],
    peaks: &[usize],
    valleys: &[usize],
    min_amplitude_change: f64,
) -> Vec<BreathEvent> {
    let mut events = Vec::new();
    let mut next_peak = 0;
    for (i, &valley) in valleys.iter().enumerate() {
        while next_peak < peaks.len() && peaks[next_peak] <= valley {
            next_peak += 1;
        }
        let Some(&peak) = peaks.get(next_peak) else {
            break;
        };
        if let Some(&following_valley) = valleys.get(i + 1) {
            if following_valley < peak {
                continue;
            }
        }

        let amplitude = filtered[peak] - filtered[valley];
        if amplitude >= min_amplitude_change {
            events.push(BreathEvent {
                valley_index: valley,
                peak_index: peak,
                valley_value: filtered[valley],
                peak_value: filtered[peak],
                amplitude,
            });
        }
        next_peak += 1;
    }
    events
}
