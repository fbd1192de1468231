use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Pass-level counters shared between the compute task and observers.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub published: usize,
    pub insufficient: usize,
    pub skipped: usize,
    pub errors: usize,
    pub alerts: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    pub fn record_published(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.published += 1;
        }
    }

    pub fn record_insufficient(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.insufficient += 1;
        }
    }

    pub fn record_skipped(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.skipped += 1;
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.errors += 1;
        }
    }

    pub fn record_alerts(&self, count: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.alerts += count;
        }
    }

    pub fn snapshot(&self) -> Metrics {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            Metrics::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
