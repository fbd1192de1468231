use num_complex::Complex64;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

/// Helper that wraps the `rustfft` planner for reuse across passes of the
/// same window length.
pub struct FftHelper {
    fft: Arc<dyn Fft<f64>>,
    size: usize,
}

impl FftHelper {
    /// Plans a transform of at least `min_len` points, rounded up to a power
    /// of two.
    pub fn new(min_len: usize) -> Self {
        let size = min_len.max(2).next_power_of_two();
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        Self { fft, size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Hann-windowed, zero-padded forward transform of a real series.
    pub fn forward(&self, input: &[f64]) -> Vec<Complex64> {
        let used = input.len().min(self.size);
        let denom = used.saturating_sub(1).max(1) as f64;
        let mut buffer: Vec<Complex64> = input[..used]
            .iter()
            .enumerate()
            .map(|(i, &value)| {
                let window = 0.5 * (1.0 - (2.0 * PI * i as f64 / denom).cos());
                Complex64::new(value * window, 0.0)
            })
            .collect();
        buffer.resize(self.size, Complex64::zero());
        self.fft.process(&mut buffer);
        buffer
    }

    /// Frequency of the strongest bin inside `[low_hz, high_hz]`, or `None`
    /// when the band holds no bin or no energy.
    pub fn dominant_frequency(
        &self,
        input: &[f64],
        sample_rate_hz: f64,
        low_hz: f64,
        high_hz: f64,
    ) -> Option<f64> {
        let spectrum = self.forward(input);
        let resolution = sample_rate_hz / self.size as f64;
        let first = (low_hz / resolution).ceil() as usize;
        let last = ((high_hz / resolution).floor() as usize).min(self.size / 2);
        if first > last {
            return None;
        }

        let (bin, power) = (first..=last)
            .map(|bin| (bin, spectrum[bin].norm_sqr()))
            .max_by(|a, b| a.1.total_cmp(&b.1))?;
        if power <= f64::EPSILON {
            return None;
        }
        Some(bin as f64 * resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fft_helper_pads_to_power_of_two() {
        let helper = FftHelper::new(3000);
        assert_eq!(helper.size(), 4096);
        let output = helper.forward(&[1.0, 0.0, -1.0, 0.0]);
        assert_eq!(output.len(), 4096);
    }

    #[test]
    fn dominant_frequency_finds_tone_in_band() {
        let fs = 48.72;
        let signal: Vec<f64> = (0..2923)
            .map(|i| (2.0 * PI * 0.3 * i as f64 / fs).sin())
            .collect();
        let helper = FftHelper::new(signal.len());
        let freq = helper.dominant_frequency(&signal, fs, 0.1, 0.5).unwrap();
        assert!((freq - 0.3).abs() < 0.02, "got {freq}");
    }

    #[test]
    fn silent_input_has_no_dominant_frequency() {
        let helper = FftHelper::new(256);
        assert_eq!(helper.dominant_frequency(&[0.0; 256], 50.0, 0.1, 0.5), None);
    }
}
