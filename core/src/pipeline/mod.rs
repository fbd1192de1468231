//! Pass scheduling, report assembly and publication.

pub mod controller;
pub mod report;
pub mod sink;
pub mod state;

pub use controller::PipelineController;
pub use report::{compute_pass, AxisSeries, BreathReport, Measurement, PassOutcome};
pub use sink::{AlertSink, ChannelSink, LatestReport, LogAlertSink, ReportSink, SinkSet};
pub use state::PipelineState;
