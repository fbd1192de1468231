//! Streaming respiratory-rate estimation core.
//!
//! Accelerometer samples flow from the acquisition layer into a bounded
//! [`processing::SampleBuffer`]; the [`pipeline::PipelineController`] snapshots
//! that buffer, band-passes the magnitude channel, counts breath cycles and
//! runs the no-breath watchdog before publishing a [`pipeline::BreathReport`].

pub mod acquisition;
pub mod config;
pub mod math;
pub mod pipeline;
pub mod prelude;
pub mod processing;
pub mod telemetry;

pub use config::{CountingPolicy, PipelineConfig, TriggerMode};
pub use prelude::{PipelineError, PipelineResult};
