use crate::acquisition::sample::{AccelScale, Sample};
use crate::processing::SampleBuffer;
use std::sync::Arc;

/// Producer-side adapter between a sensor callback and the shared buffer.
///
/// The transport must serialize its callbacks; the ingestor assigns the
/// monotonic sequence numbers in delivery order.
pub struct Ingestor {
    buffer: Arc<SampleBuffer>,
    scale: AccelScale,
    next_sequence: u64,
}

impl Ingestor {
    pub fn new(buffer: Arc<SampleBuffer>, scale: AccelScale) -> Self {
        Self {
            buffer,
            scale,
            next_sequence: 0,
        }
    }

    /// Converts raw counts with the configured scale and pushes the sample.
    pub fn ingest_raw(&mut self, x: f64, y: f64, z: f64) -> bool {
        let (x, y, z) = (
            self.scale.to_physical(x),
            self.scale.to_physical(y),
            self.scale.to_physical(z),
        );
        self.ingest(x, y, z)
    }

    /// Pushes a reading that is already in m/s². Returns `false` once the
    /// buffer has been closed.
    pub fn ingest(&mut self, x: f64, y: f64, z: f64) -> bool {
        let sample = Sample::from_axes(self.next_sequence, x, y, z);
        let accepted = self.buffer.push(sample);
        if accepted {
            self.next_sequence += 1;
        }
        accepted
    }

    pub fn is_closed(&self) -> bool {
        self.buffer.is_closed()
    }

    pub fn ingested(&self) -> u64 {
        self.next_sequence
    }
}
