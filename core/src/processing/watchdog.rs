use crate::math::PeakFinder;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A no-breath notification destined for the operator and the alert log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub timestamp: String,
    pub message: String,
}

impl Alert {
    pub fn new(at: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            message: message.into(),
        }
    }

    /// One JSON object per line, the alert log record format.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

pub fn no_breath_message(trailing_seconds: f64) -> String {
    format!("No breath detected in the last {} seconds", trailing_seconds)
}

/// Trailing-interval check for the absence of breathing.
///
/// Without debouncing every failing check yields an alert. With debouncing
/// only the transition into the no-breath condition does; a passing check
/// re-arms it.
#[derive(Debug, Clone, Default)]
pub struct Watchdog {
    debounce: bool,
    alerting: bool,
}

impl Watchdog {
    pub fn new(debounce: bool) -> Self {
        Self {
            debounce,
            alerting: false,
        }
    }

    pub fn set_debounce(&mut self, debounce: bool) {
        self.debounce = debounce;
    }

    pub fn is_alerting(&self) -> bool {
        self.alerting
    }

    /// Runs height-gated peak detection over the last `trailing_seconds` of
    /// an already-filtered series.
    pub fn check(
        &mut self,
        filtered: &[f64],
        sample_rate_hz: f64,
        trailing_seconds: f64,
        min_peak_distance_samples: usize,
        min_amplitude_change: f64,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        let trailing = ((trailing_seconds * sample_rate_hz).round() as usize).min(filtered.len());
        let recent = &filtered[filtered.len() - trailing..];
        let peaks = PeakFinder::find(recent, min_peak_distance_samples, Some(min_amplitude_change));

        if !peaks.is_empty() {
            self.alerting = false;
            return None;
        }

        let rising_edge = !self.alerting;
        self.alerting = true;
        if self.debounce && !rising_edge {
            return None;
        }
        Some(Alert::new(now, no_breath_message(trailing_seconds)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::f64::consts::PI;

    const FS: f64 = 48.72;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn breathing(seconds: f64) -> Vec<f64> {
        let len = (seconds * FS).round() as usize;
        (0..len)
            .map(|i| 0.1 * (2.0 * PI * 0.3 * i as f64 / FS).sin())
            .collect()
    }

    #[test]
    fn flat_trailing_segment_raises_alert() {
        let mut series = breathing(50.0);
        series.extend(std::iter::repeat(0.0).take((10.0 * FS) as usize + 5));
        let mut watchdog = Watchdog::new(false);
        let alert = watchdog.check(&series, FS, 10.0, 73, 0.08, at(0)).unwrap();
        assert_eq!(alert.message, "No breath detected in the last 10 seconds");
        assert_eq!(alert.timestamp, "2023-11-14T22:13:20.000Z");
        assert!(watchdog.is_alerting());
    }

    #[test]
    fn qualifying_peak_suppresses_alert() {
        let series = breathing(60.0);
        let mut watchdog = Watchdog::new(false);
        assert!(watchdog.check(&series, FS, 10.0, 73, 0.08, at(0)).is_none());
    }

    #[test]
    fn low_peaks_do_not_count_as_breaths() {
        let series: Vec<f64> = breathing(60.0).iter().map(|v| v * 0.5).collect();
        let mut watchdog = Watchdog::new(false);
        assert!(watchdog.check(&series, FS, 10.0, 73, 0.08, at(0)).is_some());
    }

    #[test]
    fn every_failing_pass_alerts_without_debounce() {
        let flat = vec![0.0; 1000];
        let mut watchdog = Watchdog::new(false);
        assert!(watchdog.check(&flat, FS, 10.0, 73, 0.08, at(0)).is_some());
        assert!(watchdog.check(&flat, FS, 10.0, 73, 0.08, at(1)).is_some());
    }

    #[test]
    fn debounce_alerts_on_rising_edge_only() {
        let flat = vec![0.0; 1000];
        let live = breathing(20.0);
        let mut watchdog = Watchdog::new(true);
        assert!(watchdog.check(&flat, FS, 10.0, 73, 0.08, at(0)).is_some());
        assert!(watchdog.check(&flat, FS, 10.0, 73, 0.08, at(1)).is_none());
        assert!(watchdog.check(&live, FS, 10.0, 73, 0.08, at(2)).is_none());
        assert!(!watchdog.is_alerting());
        assert!(watchdog.check(&flat, FS, 10.0, 73, 0.08, at(3)).is_some());
    }

    #[test]
    fn alert_serializes_as_json_line() {
        let alert = Alert::new(at(0), "No breath detected in the last 10 seconds");
        let line = alert.to_json_line().unwrap();
        assert!(line.ends_with('\n'));
        let parsed: Alert = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(parsed, alert);
    }
}
