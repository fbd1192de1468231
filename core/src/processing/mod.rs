pub mod bandpass;
pub mod breath;
pub mod sample_buffer;
pub mod watchdog;

pub use bandpass::BandpassFilter;
pub use breath::{BreathDetection, BreathDetector, BreathEvent};
pub use sample_buffer::SampleBuffer;
pub use watchdog::{Alert, Watchdog};
