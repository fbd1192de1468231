pub use crate::acquisition::{AccelScale, Sample};
pub use crate::config::{CountingPolicy, PipelineConfig, TriggerMode};
pub use crate::processing::watchdog::Alert;

/// Common error type for buffer, filter and pipeline operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("invalid filter spec: {0}")]
    InvalidFilterSpec(String),
    #[error("insufficient samples: {available} available, {required} required")]
    InsufficientSamples { available: usize, required: usize },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("pipeline has been shut down")]
    Shutdown,
}

pub type PipelineResult<T> = Result<T, PipelineError>;
