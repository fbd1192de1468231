use breathcore::pipeline::{BreathReport, PassOutcome, PipelineState};
use serde::{Deserialize, Serialize};

/// Filtered samples kept for plotting.
pub const PLOT_TAIL: usize = 600;

/// Compact view of the latest pass for dashboards.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DashboardModel {
    pub state: PipelineState,
    pub pass: Option<u64>,
    pub generated_at: Option<String>,
    pub status: String,
    pub breath_count: Option<usize>,
    pub breath_rate: Option<f64>,
    pub spectral_rate_bpm: Option<f64>,
    pub samples_needed: Option<usize>,
    pub filtered_tail: Vec<f64>,
    pub alerts: usize,
}

impl DashboardModel {
    pub fn from_report(report: Option<&BreathReport>, state: PipelineState) -> Self {
        let Some(report) = report else {
            return Self {
                state,
                status: "waiting".into(),
                ..Default::default()
            };
        };

        let (status, samples_needed) = match report.outcome {
            PassOutcome::Measured(_) => ("measured", None),
            PassOutcome::InsufficientData { required, .. } => ("insufficient_data", Some(required)),
        };
        let tail_start = report.filtered_series.len().saturating_sub(PLOT_TAIL);

        Self {
            state,
            pass: Some(report.pass),
            generated_at: Some(report.generated_at.to_rfc3339()),
            status: status.into(),
            breath_count: report.breath_count(),
            breath_rate: report.breath_rate(),
            spectral_rate_bpm: report.measurement().and_then(|m| m.spectral_rate_bpm),
            samples_needed,
            filtered_tail: report.filtered_series[tail_start..].to_vec(),
            alerts: report.alerts.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn empty_model_waits() {
        let model = DashboardModel::from_report(None, PipelineState::Accumulating);
        assert_eq!(model.status, "waiting");
        assert!(model.pass.is_none());
    }

    #[test]
    fn insufficient_report_carries_requirement() {
        let report = BreathReport {
            pass: 3,
            generated_at: Utc::now(),
            window_samples: 30,
            outcome: PassOutcome::InsufficientData {
                available: 30,
                required: 49,
            },
            filtered_series: vec![0.0; 1000],
            axis_series: None,
            alerts: Vec::new(),
        };
        let model = DashboardModel::from_report(Some(&report), PipelineState::Published);
        assert_eq!(model.status, "insufficient_data");
        assert_eq!(model.samples_needed, Some(49));
        assert_eq!(model.breath_count, None);
        assert_eq!(model.filtered_tail.len(), PLOT_TAIL);
    }
}
