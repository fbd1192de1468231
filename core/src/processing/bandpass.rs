use crate::config::PipelineConfig;
use crate::prelude::{PipelineError, PipelineResult};
use ndarray::{Array2, ArrayView2};
use num_complex::Complex64;
use std::f64::consts::PI;

/// Bilinear-transform constant for a sampling rate normalised to 2.
const FS2: f64 = 4.0;

/// Butterworth band-pass stored as cascaded second-order sections.
///
/// Each row of the section matrix is `[b0, b1, b2, 1, a1, a2]`. Designing and
/// applying the filter are pure: identical inputs give bit-identical outputs.
#[derive(Debug, Clone)]
pub struct BandpassFilter {
    sos: Array2<f64>,
    lowcut_hz: f64,
    highcut_hz: f64,
    sample_rate_hz: f64,
}

impl BandpassFilter {
    /// Designs an `order`-th order Butterworth band-pass (`2 × order` poles).
    pub fn design(
        lowcut_hz: f64,
        highcut_hz: f64,
        sample_rate_hz: f64,
        order: usize,
    ) -> PipelineResult<Self> {
        if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) {
            return Err(PipelineError::InvalidFilterSpec(format!(
                "sample rate must be positive, got {}",
                sample_rate_hz
            )));
        }
        if order == 0 {
            return Err(PipelineError::InvalidFilterSpec(
                "order must be at least 1".into(),
            ));
        }
        let nyquist = sample_rate_hz / 2.0;
        if !(lowcut_hz > 0.0 && lowcut_hz < highcut_hz && highcut_hz < nyquist) {
            return Err(PipelineError::InvalidFilterSpec(format!(
                "expected 0 < lowcut ({}) < highcut ({}) < nyquist ({})",
                lowcut_hz, highcut_hz, nyquist
            )));
        }

        let low = FS2 * (PI * (lowcut_hz / nyquist) / 2.0).tan();
        let high = FS2 * (PI * (highcut_hz / nyquist) / 2.0).tan();
        let bandwidth = high - low;
        let centre_sq = low * high;

        // Analog prototype poles, shifted to the band and mapped to z.
        let half_bw = bandwidth / 2.0;
        let mut analog = Vec::with_capacity(2 * order);
        for k in 0..order {
            let m = 2.0 * k as f64 + 1.0 - order as f64;
            let proto = -Complex64::from_polar(1.0, PI * m / (2.0 * order as f64));
            let shifted = proto * half_bw;
            let spread = (shifted * shifted - centre_sq).sqrt();
            analog.push(shifted + spread);
            analog.push(shifted - spread);
        }

        let denominator: Complex64 = analog.iter().map(|&p| FS2 - p).product();
        let gain = (bandwidth.powi(order as i32) * FS2.powi(order as i32) / denominator).re;
        let digital: Vec<Complex64> = analog.iter().map(|&p| (FS2 + p) / (FS2 - p)).collect();

        let sections = pair_poles(&digital);
        let mut sos = Array2::<f64>::zeros((sections.len(), 6));
        for (row, (a1, a2)) in sections.into_iter().enumerate() {
            let scale = if row == 0 { gain } else { 1.0 };
            // Each section carries one zero at z = 1 and one at z = -1.
            sos[[row, 0]] = scale;
            sos[[row, 1]] = 0.0;
            sos[[row, 2]] = -scale;
            sos[[row, 3]] = 1.0;
            sos[[row, 4]] = a1;
            sos[[row, 5]] = a2;
        }

        Ok(Self {
            sos,
            lowcut_hz,
            highcut_hz,
            sample_rate_hz,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> PipelineResult<Self> {
        Self::design(
            config.lowcut_hz,
            config.highcut_hz,
            config.sample_rate_hz,
            config.filter_order,
        )
    }

    pub fn sections(&self) -> ArrayView2<'_, f64> {
        self.sos.view()
    }

    pub fn band(&self) -> (f64, f64) {
        (self.lowcut_hz, self.highcut_hz)
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    /// Samples reflected onto each edge before filtering.
    pub fn padlen(&self) -> usize {
        3 * (2 * self.sos.nrows() + 1)
    }

    /// Shortest series [`BandpassFilter::apply`] accepts.
    pub fn min_samples(&self) -> usize {
        self.padlen() + 1
    }

    /// Zero-phase (forward-backward) filtering of the whole window.
    pub fn apply(&self, samples: &[f64]) -> PipelineResult<Vec<f64>> {
        let len = samples.len();
        let padlen = self.padlen();
        if len <= padlen {
            return Err(PipelineError::InsufficientSamples {
                available: len,
                required: self.min_samples(),
            });
        }

        let mut extended = odd_extension(samples, padlen);
        let steady = self.steady_state();

        let first = extended[0];
        self.run_sections(&mut extended, &steady, first);
        extended.reverse();
        let last = extended[0];
        self.run_sections(&mut extended, &steady, last);
        extended.reverse();

        Ok(extended[padlen..padlen + len].to_vec())
    }

    /// Per-section initial state for a unit step, scaled by the DC gain of
    /// the sections in front of it.
    fn steady_state(&self) -> Vec<[f64; 2]> {
        let mut scale = 1.0;
        let mut states = Vec::with_capacity(self.sos.nrows());
        for row in self.sos.rows() {
            let (b0, b1, b2, a1, a2) = (row[0], row[1], row[2], row[4], row[5]);
            let det = 1.0 + a1 + a2;
            let r0 = b1 - a1 * b0;
            let r1 = b2 - a2 * b0;
            let z0 = (r0 + r1) / det;
            let z1 = ((1.0 + a1) * r1 - a2 * r0) / det;
            states.push([scale * z0, scale * z1]);
            scale *= (b0 + b1 + b2) / det;
        }
        states
    }

    fn run_sections(&self, data: &mut [f64], steady: &[[f64; 2]], initial: f64) {
        for (row, state) in self.sos.rows().into_iter().zip(steady) {
            let (b0, b1, b2, a1, a2) = (row[0], row[1], row[2], row[4], row[5]);
            let mut z0 = state[0] * initial;
            let mut z1 = state[1] * initial;
            for value in data.iter_mut() {
                let x = *value;
                let y = b0 * x + z0;
                z0 = b1 * x - a1 * y + z1;
                z1 = b2 * x - a2 * y;
                *value = y;
            }
        }
    }
}

/// Groups z-plane poles into `(a1, a2)` denominators of second-order sections.
fn pair_poles(poles: &[Complex64]) -> Vec<(f64, f64)> {
    const IMAG_EPS: f64 = 1e-12;
    let mut sections = Vec::with_capacity(poles.len() / 2);
    let mut reals = Vec::new();
    for pole in poles {
        if pole.im > IMAG_EPS {
            sections.push((-2.0 * pole.re, pole.norm_sqr()));
        } else if pole.im.abs() <= IMAG_EPS {
            reals.push(pole.re);
        }
    }
    reals.sort_by(|a, b| a.total_cmp(b));
    for pair in reals.chunks(2) {
        match *pair {
            [r1, r2] => sections.push((-(r1 + r2), r1 * r2)),
            [r] => sections.push((-r, 0.0)),
            _ => {}
        }
    }
    sections
}

/// Point-reflects `padlen` samples about each endpoint.
fn odd_extension(samples: &[f64], padlen: usize) -> Vec<f64> {
    let len = samples.len();
    let first = samples[0];
    let last = samples[len - 1];
    let mut extended = Vec::with_capacity(len + 2 * padlen);
    extended.extend((1..=padlen).rev().map(|i| 2.0 * first - samples[i]));
    extended.extend_from_slice(samples);
    extended.extend((1..=padlen).map(|i| 2.0 * last - samples[len - 1 - i]));
    extended
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: f64 = 48.72;

    fn tone(freq: f64, amplitude: f64, offset: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| offset + amplitude * (2.0 * PI * freq * i as f64 / FS).sin())
            .collect()
    }

    fn peak_abs(series: &[f64]) -> f64 {
        series.iter().fold(0.0, |acc: f64, v| acc.max(v.abs()))
    }

    #[test]
    fn design_rejects_bad_cutoffs() {
        for (low, high, order) in [(0.0, 0.5, 4), (0.5, 0.1, 4), (0.1, 30.0, 4), (0.1, 0.5, 0)] {
            assert!(matches!(
                BandpassFilter::design(low, high, FS, order),
                Err(PipelineError::InvalidFilterSpec(_))
            ));
        }
    }

    #[test]
    fn design_produces_one_section_per_order() {
        let filter = BandpassFilter::design(0.1, 0.5, FS, 4).unwrap();
        assert_eq!(filter.sections().dim(), (4, 6));
        assert_eq!(filter.padlen(), 27);
        for row in filter.sections().rows() {
            // Stable sections: |a2| < 1.
            assert!(row[5].abs() < 1.0);
        }
    }

    #[test]
    fn odd_order_design_is_stable() {
        let filter = BandpassFilter::design(0.2, 2.0, 20.0, 3).unwrap();
        assert_eq!(filter.sections().nrows(), 3);
        let out = filter.apply(&tone(0.6, 1.0, 0.0, 600)).unwrap();
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn short_window_is_rejected() {
        let filter = BandpassFilter::design(0.1, 0.5, FS, 4).unwrap();
        let err = filter.apply(&[1.0; 27]).unwrap_err();
        assert_eq!(
            err,
            PipelineError::InsufficientSamples {
                available: 27,
                required: 28
            }
        );
        assert_eq!(filter.apply(&[1.0; 28]).unwrap().len(), 28);
    }

    #[test]
    fn constant_signal_is_removed() {
        let filter = BandpassFilter::design(0.1, 0.5, FS, 4).unwrap();
        let out = filter.apply(&vec![9.81; 2923]).unwrap();
        assert_eq!(out.len(), 2923);
        assert!(peak_abs(&out) < 1e-6, "residual {}", peak_abs(&out));
    }

    #[test]
    fn in_band_tone_passes_without_delay() {
        let filter = BandpassFilter::design(0.1, 0.5, FS, 4).unwrap();
        let input = tone(0.3, 0.1, 1.0, 2923);
        let out = filter.apply(&input).unwrap();

        let middle = &out[1000..2000];
        let amplitude = peak_abs(middle);
        assert!((0.08..0.12).contains(&amplitude), "amplitude {amplitude}");

        // Zero phase: the filtered crest lines up with the input crest.
        let crest_in = (1000..2000)
            .max_by(|&a, &b| input[a].total_cmp(&input[b]))
            .unwrap();
        // Search the same cycle; the tone period is about 162 samples.
        let crest_out = (crest_in - 40..=crest_in + 40)
            .max_by(|&a, &b| out[a].total_cmp(&out[b]))
            .unwrap();
        assert!(
            crest_in.abs_diff(crest_out) <= 3,
            "crest in {crest_in} out {crest_out}"
        );
    }

    #[test]
    fn out_of_band_tone_is_attenuated() {
        let filter = BandpassFilter::design(0.1, 0.5, FS, 4).unwrap();
        let out = filter.apply(&tone(5.0, 1.0, 0.0, 2923)).unwrap();
        assert!(peak_abs(&out[1000..1900]) < 0.01);
    }

    #[test]
    fn apply_is_deterministic() {
        let filter = BandpassFilter::design(0.1, 0.5, FS, 4).unwrap();
        let input = tone(0.25, 0.2, 9.0, 1500);
        assert_eq!(filter.apply(&input).unwrap(), filter.apply(&input).unwrap());
    }
}
