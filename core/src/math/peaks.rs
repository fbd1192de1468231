/// Local-extremum search with height and spacing constraints.
pub struct PeakFinder;

impl PeakFinder {
    /// Indices of local maxima in `series`, in ascending order.
    ///
    /// Flat tops resolve to the (lower) midpoint of the plateau and the first
    /// and last samples are never reported. Peaks under `min_height` are
    /// dropped first; then, among peaks closer than `min_distance` samples,
    /// only the tallest survives.
    pub fn find(series: &[f64], min_distance: usize, min_height: Option<f64>) -> Vec<usize> {
        let mut peaks = Self::local_maxima(series);
        if let Some(height) = min_height {
            peaks.retain(|&idx| series[idx] >= height);
        }
        if min_distance > 1 && peaks.len() > 1 {
            peaks = Self::select_by_distance(series, &peaks, min_distance);
        }
        peaks
    }

    /// Same as [`PeakFinder::find`] on the negated series; `max_depth` is the
    /// largest value a valley may take.
    pub fn find_valleys(series: &[f64], min_distance: usize, max_depth: Option<f64>) -> Vec<usize> {
        let negated: Vec<f64> = series.iter().map(|v| -v).collect();
        Self::find(&negated, min_distance, max_depth.map(|d| -d))
    }

    fn local_maxima(series: &[f64]) -> Vec<usize> {
        let mut maxima = Vec::new();
        if series.len() < 3 {
            return maxima;
        }
        let last = series.len() - 1;
        let mut i = 1;
        while i < last {
            if series[i - 1] < series[i] {
                let mut ahead = i + 1;
                while ahead < last && series[ahead] == series[i] {
                    ahead += 1;
                }
                if series[ahead] < series[i] {
                    maxima.push((i + ahead - 1) / 2);
                    i = ahead;
                }
            }
            i += 1;
        }
        maxima
    }

    fn select_by_distance(series: &[f64], peaks: &[usize], min_distance: usize) -> Vec<usize> {
        let mut keep = vec![true; peaks.len()];
        let mut by_height: Vec<usize> = (0..peaks.len()).collect();
        by_height.sort_by(|&a, &b| series[peaks[a]].total_cmp(&series[peaks[b]]));

        for &j in by_height.iter().rev() {
            if !keep[j] {
                continue;
            }
            let mut k = j;
            while k > 0 && peaks[j] - peaks[k - 1] < min_distance {
                keep[k - 1] = false;
                k -= 1;
            }
            let mut k = j + 1;
            while k < peaks.len() && peaks[k] - peaks[j] < min_distance {
                keep[k] = false;
                k += 1;
            }
        }

        peaks
            .iter()
            .zip(keep)
            .filter_map(|(&idx, kept)| kept.then_some(idx))
            .collect()
    }
}
