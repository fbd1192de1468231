use crate::config::{PipelineConfig, TriggerMode};
use crate::pipeline::report::compute_pass;
use crate::pipeline::sink::{AlertSink, ReportSink};
use crate::pipeline::state::PipelineState;
use crate::prelude::{PipelineError, PipelineResult};
use crate::processing::{Alert, SampleBuffer, Watchdog};
use crate::telemetry::{LogManager, Metrics, MetricsRecorder};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

/// Owns the compute task of one pipeline.
///
/// The producer keeps pushing into the shared [`SampleBuffer`]; the task
/// wakes on the configured trigger, snapshots the newest window and hands
/// the resulting report to the sinks. Config swaps take effect at the next
/// pass boundary.
pub struct PipelineController {
    buffer: Arc<SampleBuffer>,
    config_tx: watch::Sender<PipelineConfig>,
    state_rx: watch::Receiver<PipelineState>,
    consumed_rx: watch::Receiver<u64>,
    shutdown_tx: watch::Sender<bool>,
    alerts: Arc<Mutex<Vec<Alert>>>,
    metrics: Arc<MetricsRecorder>,
    worker: Mutex<Option<JoinHandle<()>>>,
    logger: LogManager,
}

impl PipelineController {
    /// Validates `config` and spawns the compute task on the current tokio
    /// runtime.
    pub fn start(
        config: PipelineConfig,
        buffer: Arc<SampleBuffer>,
        reports: Arc<dyn ReportSink>,
        alert_log: Arc<dyn AlertSink>,
    ) -> PipelineResult<Self> {
        config.validate()?;
        buffer.set_capacity(config.buffer_capacity());

        let (config_tx, config_rx) = watch::channel(config.clone());
        let (state_tx, state_rx) = watch::channel(PipelineState::Idle);
        let (consumed_tx, consumed_rx) = watch::channel(0u64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let alerts = Arc::new(Mutex::new(Vec::new()));
        let metrics = Arc::new(MetricsRecorder::new());

        let worker = Worker {
            buffer: buffer.clone(),
            config_rx,
            state_tx,
            consumed_tx,
            shutdown_rx,
            reports,
            alert_log,
            alerts: alerts.clone(),
            metrics: metrics.clone(),
            watchdog: Watchdog::new(config.debounce_alerts),
            logger: LogManager::new("pipeline"),
            state: PipelineState::Idle,
            ticker: None,
            pass: 0,
            last_total: 0,
        };
        let handle = tokio::spawn(worker.run());

        let logger = LogManager::new("controller");
        logger.record(&format!(
            "started: {:.2} Hz, {} s window, {:?} trigger, {:?} counting",
            config.sample_rate_hz, config.window_seconds, config.trigger, config.counting_policy
        ));

        Ok(Self {
            buffer,
            config_tx,
            state_rx,
            consumed_rx,
            shutdown_tx,
            alerts,
            metrics,
            worker: Mutex::new(Some(handle)),
            logger,
        })
    }

    pub fn buffer(&self) -> Arc<SampleBuffer> {
        self.buffer.clone()
    }

    pub fn config(&self) -> PipelineConfig {
        self.config_tx.borrow().clone()
    }

    /// Swaps the whole configuration. A pass already running finishes with
    /// the old one.
    pub fn update_config(&self, config: PipelineConfig) -> PipelineResult<()> {
        if *self.shutdown_tx.borrow() {
            return Err(PipelineError::Shutdown);
        }
        config.validate()?;
        self.logger.record(&format!(
            "config updated: {:?} trigger, {:?} counting, min amplitude {}",
            config.trigger, config.counting_policy, config.min_amplitude_change
        ));
        self.config_tx.send_replace(config);
        Ok(())
    }

    pub fn state(&self) -> PipelineState {
        *self.state_rx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.state_rx.clone()
    }

    /// Every alert raised so far, oldest first.
    pub fn alert_history(&self) -> Vec<Alert> {
        self.alerts
            .lock()
            .map(|history| history.clone())
            .unwrap_or_default()
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics.snapshot()
    }

    /// Push count the newest finished pass snapshotted at.
    pub fn last_pass_total(&self) -> u64 {
        *self.consumed_rx.borrow()
    }

    /// Resolves once no further pass can fire on the samples pushed so far
    /// and every pass already due has finished. Only meaningful after the
    /// producer has stopped.
    pub async fn drained(&self) {
        let mut consumed = self.consumed_rx.clone();
        loop {
            let config = self.config();
            let last = *consumed.borrow_and_update();
            let total = self.buffer.total_pushed();
            let settled = match config.trigger {
                TriggerMode::Threshold => total < last + config.trigger_min_samples as u64,
                TriggerMode::Periodic { .. } => {
                    last >= total || self.buffer.len() < config.min_pass_samples()
                }
            };
            if settled || self.state().is_terminal() {
                return;
            }
            // Errs once the compute task has exited.
            if consumed.changed().await.is_err() {
                return;
            }
        }
    }

    /// Closes the buffer, stops the compute task and waits for it. Calling
    /// it again is a no-op.
    pub async fn shutdown(&self) {
        self.buffer.close();
        self.shutdown_tx.send_replace(true);

        let handle = self.worker.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                self.logger.warn(&format!("compute task ended abnormally: {}", err));
            }
            self.logger.record("shut down");
        }
    }
}

enum Wake {
    Fire,
    Skip,
    Reconfigure,
    Shutdown,
}

struct Worker {
    buffer: Arc<SampleBuffer>,
    config_rx: watch::Receiver<PipelineConfig>,
    state_tx: watch::Sender<PipelineState>,
    consumed_tx: watch::Sender<u64>,
    shutdown_rx: watch::Receiver<bool>,
    reports: Arc<dyn ReportSink>,
    alert_log: Arc<dyn AlertSink>,
    alerts: Arc<Mutex<Vec<Alert>>>,
    metrics: Arc<MetricsRecorder>,
    watchdog: Watchdog,
    logger: LogManager,
    state: PipelineState,
    ticker: Option<(u64, Interval)>,
    pass: u64,
    last_total: u64,
}

impl Worker {
    async fn run(mut self) {
        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }
            let config = self.config_rx.borrow_and_update().clone();
            self.apply(&config);
            if self.buffer.total_pushed() > 0 {
                self.transition(PipelineState::Accumulating);
            }

            let wake = match config.trigger {
                TriggerMode::Threshold => {
                    self.ticker = None;
                    self.wait_threshold(&config).await
                }
                TriggerMode::Periodic { interval_ms } => {
                    self.wait_tick(interval_ms, &config).await
                }
            };

            match wake {
                Wake::Fire => self.run_pass(),
                Wake::Skip | Wake::Reconfigure => {}
                Wake::Shutdown => break,
            }
        }
        self.transition(PipelineState::Shutdown);
        self.logger.trace(&format!("compute task exiting after {} passes", self.pass));
    }

    fn apply(&mut self, config: &PipelineConfig) {
        self.buffer.set_capacity(config.buffer_capacity());
        self.watchdog.set_debounce(config.debounce_alerts);
    }

    async fn wait_threshold(&mut self, config: &PipelineConfig) -> Wake {
        let mark = self.last_total + config.trigger_min_samples as u64;
        self.buffer.arm_watermark(mark);

        tokio::select! {
            _ = self.buffer.ready().notified() => {
                // Permits can outlive the mark they were issued for.
                if self.buffer.total_pushed() >= mark {
                    Wake::Fire
                } else {
                    Wake::Skip
                }
            }
            changed = self.config_rx.changed() => {
                if changed.is_ok() { Wake::Reconfigure } else { Wake::Shutdown }
            }
            _ = self.shutdown_rx.changed() => Wake::Shutdown,
        }
    }

    async fn wait_tick(&mut self, interval_ms: u64, config: &PipelineConfig) -> Wake {
        if !matches!(self.ticker, Some((current, _)) if current == interval_ms) {
            let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            interval.tick().await;
            self.ticker = Some((interval_ms, interval));
        }
        let Some((_, interval)) = self.ticker.as_mut() else {
            return Wake::Skip;
        };

        tokio::select! {
            _ = interval.tick() => {
                let held = self.buffer.len();
                if held < config.min_pass_samples() {
                    self.metrics.record_skipped();
                    self.logger.trace(&format!(
                        "tick skipped: {} samples held, {} needed",
                        held,
                        config.min_pass_samples()
                    ));
                    Wake::Skip
                } else {
                    Wake::Fire
                }
            }
            changed = self.config_rx.changed() => {
                if changed.is_ok() { Wake::Reconfigure } else { Wake::Shutdown }
            }
            _ = self.shutdown_rx.changed() => Wake::Shutdown,
        }
    }

    fn run_pass(&mut self) {
        // One config snapshot per pass, taken at its start.
        let config = self.config_rx.borrow_and_update().clone();
        self.apply(&config);
        self.transition(PipelineState::Ready);
        self.transition(PipelineState::Computing);

        let (samples, total) = self.buffer.snapshot_with_total(config.window_len());
        self.last_total = total;
        self.pass += 1;

        match compute_pass(&config, &samples, &mut self.watchdog, self.pass, Utc::now()) {
            Ok(report) => {
                match report.measurement() {
                    Some(measurement) => {
                        self.metrics.record_published();
                        self.logger.record(&format!(
                            "pass {}: {} breaths over {:.1} s, {:.1} breaths/min",
                            report.pass,
                            measurement.breath_count,
                            measurement.covered_seconds,
                            measurement.breath_rate
                        ));
                    }
                    None => {
                        self.metrics.record_insufficient();
                        self.logger.warn(&format!(
                            "pass {}: insufficient data ({:?})",
                            report.pass, report.outcome
                        ));
                    }
                }

                if !report.alerts.is_empty() {
                    if let Ok(mut history) = self.alerts.lock() {
                        history.extend(report.alerts.iter().cloned());
                    }
                    for alert in &report.alerts {
                        self.alert_log.append(alert);
                    }
                    self.metrics.record_alerts(report.alerts.len());
                }

                self.reports.publish(&report);
                self.transition(PipelineState::Published);
            }
            Err(err) => {
                self.metrics.record_error();
                self.logger.warn(&format!("pass {} failed: {}", self.pass, err));
                self.transition(PipelineState::Accumulating);
            }
        }
        self.consumed_tx.send_replace(total);
    }

    fn transition(&mut self, next: PipelineState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition(next) {
            self.logger
                .trace(&format!("ignoring transition {:?} -> {:?}", self.state, next));
            return;
        }
        self.state = next;
        self.state_tx.send_replace(next);
    }
}
