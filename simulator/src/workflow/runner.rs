use crate::generator::profile::{recording, AccelGenerator};
use crate::generator::sensor::SyntheticSensor;
use crate::workflow::alert_log::FileAlertLog;
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use breathcore::acquisition::Ingestor;
use breathcore::pipeline::{
    compute_pass, AlertSink, BreathReport, LatestReport, PipelineController, ReportSink, SinkSet,
};
use breathcore::processing::{SampleBuffer, Watchdog};
use breathcore::telemetry::Metrics;
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

/// A running pipeline fed by the synthetic sensor.
pub struct LiveSession {
    pub controller: Arc<PipelineController>,
    pub latest: Arc<LatestReport>,
    sensor: JoinHandle<u64>,
}

#[derive(Debug, Clone)]
pub struct LiveSummary {
    pub samples: u64,
    pub metrics: Metrics,
    pub last_report: Option<BreathReport>,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Generates the whole recording up front and runs one pass over its
    /// newest window.
    pub fn execute(&self, alert_sink: &dyn AlertSink) -> anyhow::Result<BreathReport> {
        let pipeline = &self.config.pipeline;
        let buffer = Arc::new(SampleBuffer::with_capacity(pipeline.buffer_capacity()));
        let mut ingestor = Ingestor::new(buffer.clone(), self.config.generator.scale);
        for [x, y, z] in recording(
            &self.config.generator,
            pipeline.sample_rate_hz,
            self.config.duration_s,
        ) {
            ingestor.ingest_raw(x, y, z);
        }

        let samples = buffer.snapshot(pipeline.window_len());
        let mut watchdog = Watchdog::new(pipeline.debounce_alerts);
        let report = compute_pass(pipeline, &samples, &mut watchdog, 1, Utc::now())
            .context("running offline pass")?;
        for alert in &report.alerts {
            alert_sink.append(alert);
        }
        Ok(report)
    }

    /// Appends `report` as one JSON line to the configured report log.
    pub fn archive(&self, report: &BreathReport) -> anyhow::Result<()> {
        let path = &self.config.report_log;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(report).context("encoding report")?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening report log {}", path.display()))?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Starts the controller and the sensor thread. Must run inside a tokio
    /// runtime.
    pub fn start_live(
        &self,
        extra_sink: Option<Arc<dyn ReportSink>>,
    ) -> anyhow::Result<LiveSession> {
        let pipeline = self.config.pipeline.clone();
        let buffer = Arc::new(SampleBuffer::with_capacity(pipeline.buffer_capacity()));
        let latest = Arc::new(LatestReport::new());
        let alert_log = Arc::new(FileAlertLog::open(&self.config.alert_log)?);

        let mut sinks: Vec<Arc<dyn ReportSink>> = vec![latest.clone()];
        sinks.extend(extra_sink);
        let controller = PipelineController::start(
            pipeline.clone(),
            buffer.clone(),
            Arc::new(SinkSet::new(sinks)),
            alert_log,
        )
        .context("starting pipeline")?;

        let sensor = SyntheticSensor::new(
            AccelGenerator::new(&self.config.generator, pipeline.sample_rate_hz),
            Ingestor::new(buffer, self.config.generator.scale),
            pipeline.sample_rate_hz,
            self.config.speed,
            Some(self.config.total_samples()),
        );
        let sensor = tokio::task::spawn_blocking(move || sensor.run());

        Ok(LiveSession {
            controller: Arc::new(controller),
            latest,
            sensor,
        })
    }
}

impl LiveSession {
    /// Runs until the sensor has produced its recording or `stop` resolves,
    /// then shuts the pipeline down.
    pub async fn finish<F>(mut self, stop: F) -> anyhow::Result<LiveSummary>
    where
        F: Future<Output = ()>,
    {
        let completed = tokio::select! {
            produced = &mut self.sensor => Some(produced.context("sensor thread panicked")?),
            _ = stop => None,
        };
        if completed.is_some() {
            self.controller.drained().await;
        }

        self.controller.shutdown().await;
        let samples = match completed {
            Some(samples) => samples,
            None => self.sensor.await.context("sensor thread panicked")?,
        };

        Ok(LiveSummary {
            samples,
            metrics: self.controller.metrics(),
            last_report: self.latest.get(),
        })
    }
}
