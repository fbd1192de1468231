use serde::{Deserialize, Serialize};

/// Lifecycle of the compute side of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    #[default]
    Idle,
    Accumulating,
    Ready,
    Computing,
    Published,
    Shutdown,
}

impl PipelineState {
    /// Whether `self -> next` is a legal step of the cycle.
    pub fn can_transition(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, Accumulating)
                | (Idle, Ready)
                | (Accumulating, Ready)
                | (Ready, Computing)
                | (Computing, Published)
                | (Computing, Accumulating)
                | (Published, Accumulating)
                | (Published, Ready)
                | (_, Shutdown)
        ) && self != Shutdown
    }

    pub fn is_terminal(self) -> bool {
        self == PipelineState::Shutdown
    }
}
