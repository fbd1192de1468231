use crate::prelude::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

/// How detected extrema are turned into a breath count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CountingPolicy {
    /// `min(#peaks, #valleys)`, ignoring temporal pairing.
    #[default]
    MinCount,
    /// Valley-then-peak pairs whose swing reaches `min_amplitude_change`.
    PairedAmplitude,
}

/// What starts a compute pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TriggerMode {
    /// Wake once `trigger_min_samples` new samples have been pushed.
    #[default]
    Threshold,
    /// Fire every `interval_ms`, skipping ticks with less than a second of data.
    Periodic { interval_ms: u64 },
}

/// Tunables for one pipeline instance. Replaced whole, never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sample_rate_hz: f64,
    pub window_seconds: f64,
    pub buffer_seconds: f64,
    pub lowcut_hz: f64,
    pub highcut_hz: f64,
    pub filter_order: usize,
    pub min_peak_distance_s: f64,
    pub min_amplitude_change: f64,
    pub watchdog_interval_s: f64,
    pub trigger_min_samples: usize,
    pub counting_policy: CountingPolicy,
    /// Require peaks above `+min_amplitude_change` and valleys below its negation.
    pub height_gated: bool,
    pub trigger: TriggerMode,
    /// Emit a watchdog alert only on the rising edge of the no-breath condition.
    pub debounce_alerts: bool,
    /// Publish band-passed per-axis series alongside the magnitude.
    pub debug_axes: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let sample_rate_hz = 48.72;
        Self {
            sample_rate_hz,
            window_seconds: 60.0,
            buffer_seconds: 60.0,
            lowcut_hz: 0.1,
            highcut_hz: 0.5,
            filter_order: 4,
            min_peak_distance_s: 1.5,
            min_amplitude_change: 0.08,
            watchdog_interval_s: 10.0,
            trigger_min_samples: (sample_rate_hz * 10.0).round() as usize,
            counting_policy: CountingPolicy::MinCount,
            height_gated: false,
            trigger: TriggerMode::Threshold,
            debounce_alerts: false,
            debug_axes: false,
        }
    }
}

impl PipelineConfig {
    /// Rejects combinations that would fail at compute time.
    pub fn validate(&self) -> PipelineResult<()> {
        if !(self.sample_rate_hz.is_finite() && self.sample_rate_hz > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "sample_rate_hz must be positive, got {}",
                self.sample_rate_hz
            )));
        }
        if !(self.window_seconds.is_finite() && self.window_seconds > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "window_seconds must be positive, got {}",
                self.window_seconds
            )));
        }
        if !(self.buffer_seconds.is_finite() && self.buffer_seconds >= self.window_seconds) {
            return Err(PipelineError::InvalidConfig(format!(
                "buffer_seconds ({}) must cover window_seconds ({})",
                self.buffer_seconds, self.window_seconds
            )));
        }
        let nyquist = self.sample_rate_hz / 2.0;
        if self.filter_order == 0 {
            return Err(PipelineError::InvalidFilterSpec(
                "filter_order must be at least 1".into(),
            ));
        }
        if !(self.lowcut_hz > 0.0 && self.lowcut_hz < self.highcut_hz && self.highcut_hz < nyquist)
        {
            return Err(PipelineError::InvalidFilterSpec(format!(
                "expected 0 < lowcut ({}) < highcut ({}) < nyquist ({})",
                self.lowcut_hz, self.highcut_hz, nyquist
            )));
        }
        if !(self.min_peak_distance_s.is_finite() && self.min_peak_distance_s >= 0.0) {
            return Err(PipelineError::InvalidConfig(
                "min_peak_distance_s must be non-negative".into(),
            ));
        }
        if !(self.min_amplitude_change.is_finite() && self.min_amplitude_change >= 0.0) {
            return Err(PipelineError::InvalidConfig(
                "min_amplitude_change must be non-negative".into(),
            ));
        }
        if !(self.watchdog_interval_s.is_finite() && self.watchdog_interval_s > 0.0) {
            return Err(PipelineError::InvalidConfig(
                "watchdog_interval_s must be positive".into(),
            ));
        }
        if self.trigger_min_samples == 0 {
            return Err(PipelineError::InvalidConfig(
                "trigger_min_samples must be at least 1".into(),
            ));
        }
        if let TriggerMode::Periodic { interval_ms: 0 } = self.trigger {
            return Err(PipelineError::InvalidConfig(
                "periodic trigger interval must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn buffer_capacity(&self) -> usize {
        ((self.buffer_seconds * self.sample_rate_hz).round() as usize).max(1)
    }

    /// Number of samples a compute pass asks the buffer for.
    pub fn window_len(&self) -> usize {
        ((self.window_seconds * self.sample_rate_hz).round() as usize)
            .clamp(1, self.buffer_capacity())
    }

    pub fn min_peak_distance_samples(&self) -> usize {
        ((self.min_peak_distance_s * self.sample_rate_hz) as usize).max(1)
    }

    /// One second of data, the floor below which no pass is attempted.
    pub fn min_pass_samples(&self) -> usize {
        self.sample_rate_hz.ceil() as usize
    }
}
