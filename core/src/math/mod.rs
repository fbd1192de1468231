pub mod fft;
pub mod peaks;
pub mod stats;

pub use fft::FftHelper;
pub use peaks::PeakFinder;
pub use stats::StatsHelper;
