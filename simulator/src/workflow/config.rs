use crate::generator::profile::GeneratorConfig;
use anyhow::Context;
use breathcore::{CountingPolicy, PipelineConfig, TriggerMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub pipeline: PipelineConfig,
    pub generator: GeneratorConfig,
    /// JSON-lines file the watchdog alerts are appended to.
    pub alert_log: PathBuf,
    /// JSON-lines file offline reports are appended to.
    pub report_log: PathBuf,
    /// Seconds of synthetic data to produce.
    pub duration_s: f64,
    /// Replay speed of the live sensor relative to real time.
    pub speed: f64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            generator: GeneratorConfig::default(),
            alert_log: PathBuf::from("tools/data/alerts.jsonl"),
            report_log: PathBuf::from("tools/data/offline_reports.jsonl"),
            duration_s: 120.0,
            speed: 1.0,
        }
    }
}

/// Command-line overrides applied on top of the defaults.
#[derive(Clone, Debug, Default)]
pub struct WorkflowOverrides {
    pub sample_rate_hz: Option<f64>,
    pub window_seconds: Option<f64>,
    pub policy: Option<CountingPolicy>,
    pub periodic_ms: Option<u64>,
    pub duration_s: Option<f64>,
    pub breaths_per_minute: Option<f64>,
    pub apnea_after_s: Option<f64>,
    pub seed: Option<u64>,
    pub alert_log: Option<PathBuf>,
    pub speed: Option<f64>,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        config
            .validate()
            .with_context(|| format!("validating workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(overrides: &WorkflowOverrides) -> anyhow::Result<Self> {
        let mut config = Self::default();
        config.apply(overrides);
        config.validate().context("validating command-line workflow")?;
        Ok(config)
    }

    /// Layers explicitly given options over whatever was loaded.
    pub fn apply(&mut self, overrides: &WorkflowOverrides) {
        if let Some(fs) = overrides.sample_rate_hz {
            self.pipeline.sample_rate_hz = fs;
            self.pipeline.trigger_min_samples = (fs * 10.0).round().max(1.0) as usize;
        }
        if let Some(window) = overrides.window_seconds {
            self.pipeline.window_seconds = window;
            self.pipeline.buffer_seconds = self.pipeline.buffer_seconds.max(window);
        }
        if let Some(policy) = overrides.policy {
            self.pipeline.counting_policy = policy;
        }
        if let Some(interval_ms) = overrides.periodic_ms {
            self.pipeline.trigger = TriggerMode::Periodic { interval_ms };
        }
        if let Some(duration) = overrides.duration_s {
            self.duration_s = duration;
        }
        if let Some(bpm) = overrides.breaths_per_minute {
            self.generator.breaths_per_minute = bpm;
        }
        if overrides.apnea_after_s.is_some() {
            self.generator.apnea_after_s = overrides.apnea_after_s;
        }
        if let Some(seed) = overrides.seed {
            self.generator.seed = seed;
        }
        if let Some(path) = &overrides.alert_log {
            self.alert_log = path.clone();
        }
        if let Some(speed) = overrides.speed {
            self.speed = speed;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.pipeline.validate()?;
        anyhow::ensure!(
            self.duration_s.is_finite() && self.duration_s > 0.0,
            "duration_s must be positive, got {}",
            self.duration_s
        );
        anyhow::ensure!(
            self.speed.is_finite() && self.speed >= 0.0,
            "speed must be non-negative, got {}",
            self.speed
        );
        Ok(())
    }

    pub fn total_samples(&self) -> u64 {
        (self.duration_s * self.pipeline.sample_rate_hz).round() as u64
    }
}
