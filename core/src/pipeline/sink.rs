use crate::pipeline::report::BreathReport;
use crate::processing::Alert;
use crate::telemetry::LogManager;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

/// Receives one report per compute pass.
pub trait ReportSink: Send + Sync {
    fn publish(&self, report: &BreathReport);
}

/// Append-only destination for watchdog alerts, fed in detection order.
pub trait AlertSink: Send + Sync {
    fn append(&self, alert: &Alert);
}

/// Forwards reports over an unbounded channel; a dropped receiver is ignored.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<BreathReport>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BreathReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ReportSink for ChannelSink {
    fn publish(&self, report: &BreathReport) {
        let _ = self.tx.send(report.clone());
    }
}

/// Keeps only the most recent report, for request/response readers.
#[derive(Default)]
pub struct LatestReport {
    slot: RwLock<Option<BreathReport>>,
}

impl LatestReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<BreathReport> {
        self.slot
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl ReportSink for LatestReport {
    fn publish(&self, report: &BreathReport) {
        if let Ok(mut guard) = self.slot.write() {
            *guard = Some(report.clone());
        }
    }
}

/// Fans one report out to several sinks in order.
pub struct SinkSet {
    sinks: Vec<Arc<dyn ReportSink>>,
}

impl SinkSet {
    pub fn new(sinks: Vec<Arc<dyn ReportSink>>) -> Self {
        Self { sinks }
    }
}

impl ReportSink for SinkSet {
    fn publish(&self, report: &BreathReport) {
        for sink in &self.sinks {
            sink.publish(report);
        }
    }
}

/// Writes alerts to the `log` facade at warn level.
pub struct LogAlertSink {
    logger: LogManager,
}

impl LogAlertSink {
    pub fn new() -> Self {
        Self {
            logger: LogManager::new("watchdog"),
        }
    }
}

impl Default for LogAlertSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertSink for LogAlertSink {
    fn append(&self, alert: &Alert) {
        self.logger.warn(&format!("{} {}", alert.timestamp, alert.message));
    }
}
