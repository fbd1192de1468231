pub struct StatsHelper;

impl StatsHelper {
    pub fn rms(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = samples.iter().map(|&v| v * v).sum();
        (sum_sq / samples.len() as f64).sqrt()
    }

    /// Mean spacing between consecutive indices, in samples.
    pub fn mean_spacing(indices: &[usize]) -> Option<f64> {
        if indices.len() < 2 {
            return None;
        }
        let span = (indices[indices.len() - 1] - indices[0]) as f64;
        Some(span / (indices.len() - 1) as f64)
    }
}
