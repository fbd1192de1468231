use crate::acquisition::Sample;
use crate::config::{CountingPolicy, PipelineConfig};
use crate::math::{FftHelper, StatsHelper};
use crate::prelude::{PipelineError, PipelineResult};
use crate::processing::{Alert, BandpassFilter, BreathDetection, BreathDetector, Watchdog};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Breath statistics of a pass that had enough data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub breath_count: usize,
    /// Breaths per minute over the covered span.
    pub breath_rate: f64,
    pub covered_seconds: f64,
    pub interval_rate_bpm: Option<f64>,
    pub spectral_rate_bpm: Option<f64>,
    pub policy: CountingPolicy,
    pub peaks: usize,
    pub valleys: usize,
    pub signal_rms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PassOutcome {
    Measured(Measurement),
    InsufficientData { available: usize, required: usize },
}

/// Band-passed per-axis channels, published when `debug_axes` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisSeries {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

/// Everything one compute pass hands to the publication sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreathReport {
    pub pass: u64,
    pub generated_at: DateTime<Utc>,
    pub window_samples: usize,
    pub outcome: PassOutcome,
    pub filtered_series: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis_series: Option<AxisSeries>,
    pub alerts: Vec<Alert>,
}

impl BreathReport {
    pub fn measurement(&self) -> Option<&Measurement> {
        match &self.outcome {
            PassOutcome::Measured(measurement) => Some(measurement),
            PassOutcome::InsufficientData { .. } => None,
        }
    }

    /// `None` for passes without enough data, never a placeholder zero.
    pub fn breath_count(&self) -> Option<usize> {
        self.measurement().map(|m| m.breath_count)
    }

    pub fn breath_rate(&self) -> Option<f64> {
        self.measurement().map(|m| m.breath_rate)
    }
}

struct Analysis {
    filtered: Vec<f64>,
    detection: BreathDetection,
    axis_series: Option<AxisSeries>,
}

fn analyze(
    config: &PipelineConfig,
    filter: &BandpassFilter,
    detector: &BreathDetector,
    samples: &[Sample],
) -> PipelineResult<Analysis> {
    let floor = config.min_pass_samples();
    if samples.len() < floor {
        return Err(PipelineError::InsufficientSamples {
            available: samples.len(),
            required: floor,
        });
    }
    BreathDetector::ensure_density(samples.len(), config.window_seconds)?;

    let magnitudes: Vec<f64> = samples.iter().map(|s| s.magnitude).collect();
    let filtered = filter.apply(&magnitudes)?;
    let detection = detector.detect(
        &filtered,
        config.min_peak_distance_samples(),
        config.min_amplitude_change,
    );

    let axis_series = if config.debug_axes {
        let channel = |pick: fn(&Sample) -> f64| -> PipelineResult<Vec<f64>> {
            let values: Vec<f64> = samples.iter().map(pick).collect();
            filter.apply(&values)
        };
        Some(AxisSeries {
            x: channel(|s| s.x)?,
            y: channel(|s| s.y)?,
            z: channel(|s| s.z)?,
        })
    } else {
        None
    };

    Ok(Analysis {
        filtered,
        detection,
        axis_series,
    })
}

/// Runs Filter -> Detect -> Watchdog over one window snapshot.
///
/// Too little data is not an error here: it yields a report whose outcome is
/// [`PassOutcome::InsufficientData`]. Only configuration problems fail.
pub fn compute_pass(
    config: &PipelineConfig,
    samples: &[Sample],
    watchdog: &mut Watchdog,
    pass: u64,
    now: DateTime<Utc>,
) -> PipelineResult<BreathReport> {
    let filter = BandpassFilter::from_config(config)?;
    let detector = BreathDetector::from_config(config);

    let analysis = match analyze(config, &filter, &detector, samples) {
        Ok(analysis) => analysis,
        Err(PipelineError::InsufficientSamples {
            available,
            required,
        }) => {
            return Ok(BreathReport {
                pass,
                generated_at: now,
                window_samples: samples.len(),
                outcome: PassOutcome::InsufficientData {
                    available,
                    required,
                },
                filtered_series: Vec::new(),
                axis_series: None,
                alerts: Vec::new(),
            });
        }
        Err(err) => return Err(err),
    };

    let fs = filter.sample_rate_hz();
    let covered_seconds = samples.len() as f64 / fs;
    let breath_count = analysis.detection.breath_count;
    let breath_rate = BreathDetector::rate(breath_count, covered_seconds)?;
    let (low_hz, high_hz) = filter.band();
    let spectral_rate_bpm = FftHelper::new(analysis.filtered.len())
        .dominant_frequency(&analysis.filtered, fs, low_hz, high_hz)
        .map(|hz| hz * 60.0);

    let alerts: Vec<Alert> = watchdog
        .check(
            &analysis.filtered,
            fs,
            config.watchdog_interval_s,
            config.min_peak_distance_samples(),
            config.min_amplitude_change,
            now,
        )
        .into_iter()
        .collect();

    let measurement = Measurement {
        breath_count,
        breath_rate,
        covered_seconds,
        interval_rate_bpm: analysis.detection.interval_rate_bpm(fs),
        spectral_rate_bpm,
        policy: detector.policy(),
        peaks: analysis.detection.peaks.len(),
        valleys: analysis.detection.valleys.len(),
        signal_rms: StatsHelper::rms(&analysis.filtered),
    };

    Ok(BreathReport {
        pass,
        generated_at: now,
        window_samples: samples.len(),
        outcome: PassOutcome::Measured(measurement),
        filtered_series: analysis.filtered,
        axis_series: analysis.axis_series,
        alerts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn breathing_samples(
        config: &PipelineConfig,
        seconds: f64,
        freq: f64,
        amp: f64,
    ) -> Vec<Sample> {
        let len = (seconds * config.sample_rate_hz).round() as usize;
        (0..len)
            .map(|i| {
                let t = i as f64 / config.sample_rate_hz;
                let magnitude = 1.0 + amp * (2.0 * PI * freq * t).sin();
                Sample::from_axes(i as u64, 0.0, 0.0, magnitude)
            })
            .collect()
    }

    fn reference_config(policy: CountingPolicy) -> PipelineConfig {
        PipelineConfig {
            sample_rate_hz: 48.72,
            window_seconds: 60.0,
            lowcut_hz: 0.1,
            highcut_hz: 0.5,
            min_peak_distance_s: 1.5,
            min_amplitude_change: 0.08,
            counting_policy: policy,
            ..Default::default()
        }
    }

    #[test]
    fn reference_recording_yields_eighteen_breaths_per_minute() {
        let config = reference_config(CountingPolicy::MinCount);
        let samples = breathing_samples(&config, 60.0, 0.3, 0.1);
        let mut watchdog = Watchdog::default();
        let report = compute_pass(&config, &samples, &mut watchdog, 1, Utc::now()).unwrap();

        let measurement = report.measurement().unwrap();
        assert!((17..=19).contains(&measurement.breath_count));
        assert!((16.5..=19.5).contains(&measurement.breath_rate));
        assert_eq!(report.filtered_series.len(), samples.len());
        assert!(report.alerts.is_empty());

        let spectral = measurement.spectral_rate_bpm.unwrap();
        assert!((spectral - 18.0).abs() < 1.5, "spectral {spectral}");
    }

    #[test]
    fn paired_policy_matches_cycle_count_within_one() {
        let config = reference_config(CountingPolicy::PairedAmplitude);
        let samples = breathing_samples(&config, 60.0, 0.3, 0.1);
        let report = compute_pass(&config, &samples, &mut Watchdog::default(), 1, Utc::now())
            .unwrap();
        let count = report.breath_count().unwrap();
        assert!((16..=19).contains(&count), "count {count}");
        let interval_rate = report.measurement().unwrap().interval_rate_bpm.unwrap();
        assert!((interval_rate - 18.0).abs() < 1.0);
    }

    #[test]
    fn paired_count_never_exceeds_min_count() {
        let samples = breathing_samples(
            &reference_config(CountingPolicy::MinCount),
            60.0,
            0.25,
            0.06,
        );
        let min_count = compute_pass(
            &reference_config(CountingPolicy::MinCount),
            &samples,
            &mut Watchdog::default(),
            1,
            Utc::now(),
        )
        .unwrap()
        .breath_count()
        .unwrap();
        let paired = compute_pass(
            &reference_config(CountingPolicy::PairedAmplitude),
            &samples,
            &mut Watchdog::default(),
            1,
            Utc::now(),
        )
        .unwrap()
        .breath_count()
        .unwrap();
        assert!(paired <= min_count);
    }

    #[test]
    fn under_one_second_reports_insufficient_data() {
        let config = reference_config(CountingPolicy::MinCount);
        let samples = breathing_samples(&config, 0.8, 0.3, 0.1);
        let report = compute_pass(&config, &samples, &mut Watchdog::default(), 1, Utc::now())
            .unwrap();
        assert_eq!(
            report.outcome,
            PassOutcome::InsufficientData {
                available: 39,
                required: 49
            }
        );
        assert_eq!(report.breath_count(), None);
        assert!(report.filtered_series.is_empty());
    }

    #[test]
    fn sparse_window_reports_insufficient_data() {
        let config = reference_config(CountingPolicy::MinCount);
        let samples = breathing_samples(&config, 2.0, 0.3, 0.1);
        let report = compute_pass(&config, &samples, &mut Watchdog::default(), 1, Utc::now())
            .unwrap();
        assert!(matches!(
            report.outcome,
            PassOutcome::InsufficientData { required: 120, .. }
        ));
    }

    #[test]
    fn stopped_breathing_raises_watchdog_alert() {
        let config = reference_config(CountingPolicy::PairedAmplitude);
        let mut samples = breathing_samples(&config, 30.0, 0.3, 0.1);
        let start = samples.len();
        samples.extend(
            (start..start + (30.0 * config.sample_rate_hz) as usize)
                .map(|i| Sample::from_axes(i as u64, 0.0, 0.0, 1.0)),
        );
        let report = compute_pass(&config, &samples, &mut Watchdog::default(), 3, Utc::now())
            .unwrap();
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(
            report.alerts[0].message,
            "No breath detected in the last 10 seconds"
        );
        assert!(report.breath_count().unwrap() > 0);
    }

    #[test]
    fn debug_axes_publishes_filtered_channels() {
        let config = PipelineConfig {
            debug_axes: true,
            ..reference_config(CountingPolicy::MinCount)
        };
        let samples = breathing_samples(&config, 20.0, 0.3, 0.1);
        let report = compute_pass(&config, &samples, &mut Watchdog::default(), 1, Utc::now())
            .unwrap();
        let axes = report.axis_series.unwrap();
        assert_eq!(axes.z.len(), samples.len());
        assert!(axes.x.iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn invalid_filter_spec_fails_the_pass() {
        let config = PipelineConfig {
            highcut_hz: 40.0,
            ..reference_config(CountingPolicy::MinCount)
        };
        let samples = breathing_samples(&config, 20.0, 0.3, 0.1);
        assert!(matches!(
            compute_pass(&config, &samples, &mut Watchdog::default(), 1, Utc::now()),
            Err(PipelineError::InvalidFilterSpec(_))
        ));
    }

    #[test]
    fn report_serializes_with_status_tag() {
        let config = reference_config(CountingPolicy::MinCount);
        let samples = breathing_samples(&config, 0.5, 0.3, 0.1);
        let report = compute_pass(&config, &samples, &mut Watchdog::default(), 9, Utc::now())
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"]["status"], "insufficient_data");
        assert_eq!(json["pass"], 9);
        assert!(json.get("axis_series").is_none());
    }
}
