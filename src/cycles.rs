//! Gait cycle detection
//!
//! Peaks are found the way `scipy.signal.find_peaks` finds them with
//! `distance` and `prominence` set; troughs are peaks of the negated series.

use crate::config::CycleConfig;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Peak search parameters in samples and series units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakCriteria {
    /// Minimum spacing between kept peaks (samples, rounded up, at least 1)
    pub distance: f64,
    /// Minimum prominence
    pub prominence: f64,
}

impl PeakCriteria {
    pub fn from_config(config: &CycleConfig, sample_rate: f64) -> Self {
        Self {
            distance: config.distance_factor * sample_rate,
            prominence: config.prominence,
        }
    }
}

/// Indices of strict local maxima; flat tops report their midpoint
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }
    let i_max = x.len() - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < i_max && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Keep the highest peaks so that no two kept peaks are closer than `distance`
fn select_by_distance(x: &[f64], peaks: &[usize], distance: f64) -> Vec<usize> {
    let distance = distance.ceil().max(1.0) as usize;
    let mut keep = vec![true; peaks.len()];

    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| {
        x[peaks[a]]
            .partial_cmp(&x[peaks[b]])
            .unwrap_or(Ordering::Equal)
    });

    // tallest first
    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, k)| k.then_some(p))
        .collect()
}

/// Vertical distance between a peak and its higher surrounding base
pub fn prominence(x: &[f64], peak: usize) -> f64 {
    let height = x[peak];

    let mut left_min = height;
    for &v in x[..=peak].iter().rev() {
        if v > height {
            break;
        }
        left_min = left_min.min(v);
    }

    let mut right_min = height;
    for &v in &x[peak..] {
        if v > height {
            break;
        }
        right_min = right_min.min(v);
    }

    height - left_min.max(right_min)
}

/// Peak indices, strictly increasing
pub fn find_peaks(x: &[f64], criteria: &PeakCriteria) -> Vec<usize> {
    let peaks = local_maxima(x);
    let peaks = select_by_distance(x, &peaks, criteria.distance);
    peaks
        .into_iter()
        .filter(|&p| prominence(x, p) >= criteria.prominence)
        .collect()
}

/// Trough indices: peaks of the negated series
pub fn find_troughs(x: &[f64], criteria: &PeakCriteria) -> Vec<usize> {
    let negated: Vec<f64> = x.iter().map(|v| -v).collect();
    find_peaks(&negated, criteria)
}

/// One peak and the trough that follows it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    pub peak_index: usize,
    pub trough_index: usize,
}

/// Statistics over one peak-to-peak interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleStats {
    /// 1-based
    pub cycle: usize,
    pub mean: f64,
    pub std: f64,
    pub max: f64,
    pub min: f64,
}

/// Extrema and cycles found in one joint series
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleDetection {
    pub peaks: Vec<usize>,
    pub troughs: Vec<usize>,
    pub cycles: Vec<Cycle>,
    pub stats: Vec<CycleStats>,
}

impl CycleDetection {
    /// At least two peaks and two troughs
    pub fn is_sufficient(&self) -> bool {
        self.peaks.len() >= 2 && self.troughs.len() >= 2
    }
}

/// Stage 4: peak/trough search and cycle segmentation
pub struct CycleDetector;

impl CycleDetector {
    pub fn detect(values: &[f64], criteria: &PeakCriteria) -> CycleDetection {
        let peaks = find_peaks(values, criteria);
        let troughs = find_troughs(values, criteria);
        let cycles = pair_cycles(&peaks, &troughs);
        let stats = cycle_stats(values, &peaks);
        CycleDetection {
            peaks,
            troughs,
            cycles,
            stats,
        }
    }
}

fn pair_cycles(peaks: &[usize], troughs: &[usize]) -> Vec<Cycle> {
    peaks
        .iter()
        .enumerate()
        .filter_map(|(i, &peak)| {
            let next_peak = peaks.get(i + 1).copied().unwrap_or(usize::MAX);
            troughs
                .iter()
                .find(|&&t| t > peak && t < next_peak)
                .map(|&trough| Cycle {
                    peak_index: peak,
                    trough_index: trough,
                })
        })
        .collect()
}

/// Mean, population std, max and min over each `[p_i, p_{i+1})`
pub fn cycle_stats(values: &[f64], peaks: &[usize]) -> Vec<CycleStats> {
    peaks
        .windows(2)
        .enumerate()
        .filter_map(|(i, w)| {
            let segment = values.get(w[0]..w[1])?;
            if segment.is_empty() {
                return None;
            }
            let n = segment.len() as f64;
            let mean = segment.iter().sum::<f64>() / n;
            let var = segment.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            Some(CycleStats {
                cycle: i + 1,
                mean,
                std: var.sqrt(),
                max: segment.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                min: segment.iter().copied().fold(f64::INFINITY, f64::min),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn criteria(distance: f64, prominence: f64) -> PeakCriteria {
        PeakCriteria {
            distance,
            prominence,
        }
    }

    fn sinusoid(amplitude: f64, freq: f64, fs: f64, secs: f64) -> Vec<f64> {
        let n = (fs * secs) as usize;
        (0..n)
            .map(|i| 60.0 + amplitude * (2.0 * PI * freq * i as f64 / fs).sin())
            .collect()
    }

    #[test]
    fn test_local_maxima_with_plateau() {
        let x = [0.0, 1.0, 0.0, 2.0, 2.0, 2.0, 1.0, 3.0, 3.0];
        // the trailing plateau never descends
        assert_eq!(local_maxima(&x), vec![1, 4]);
        assert!(local_maxima(&[1.0, 2.0]).is_empty());
    }

    #[test]
    fn test_prominence() {
        let x = [0.0, 5.0, 1.0, 3.0, 2.0, 6.0, 0.0];
        assert_eq!(prominence(&x, 1), 4.0);
        assert_eq!(prominence(&x, 3), 1.0);
        assert_eq!(prominence(&x, 5), 6.0);
    }

    #[test]
    fn test_distance_keeps_highest() {
        let x = [0.0, 3.0, 0.0, 5.0, 0.0, 4.0, 0.0, 0.0, 0.0, 2.0, 0.0];
        let peaks = find_peaks(&x, &criteria(3.0, 0.0));
        assert_eq!(peaks, vec![3, 9]);
    }

    #[test]
    fn test_prominence_threshold_rejects_jitter() {
        let x = [10.0, 12.0, 11.0, 20.0, 10.0, 11.5, 11.0, 20.0, 10.0];
        let peaks = find_peaks(&x, &criteria(1.0, 4.0));
        assert_eq!(peaks, vec![3, 7]);
    }

    #[test]
    fn test_sinusoid_peak_count_and_cycles() {
        let fs = 30.0;
        let x = sinusoid(10.0, 1.5, fs, 10.0);
        let c = PeakCriteria::from_config(&CycleConfig::default(), fs);
        let detection = CycleDetector::detect(&x, &c);

        // 15 periods in 10 s
        assert!((14..=16).contains(&detection.peaks.len()));
        assert!((14..=16).contains(&detection.troughs.len()));
        assert!(detection.is_sufficient());
        assert!(detection.peaks.windows(2).all(|w| w[0] < w[1]));

        for cycle in &detection.cycles {
            assert!(cycle.trough_index > cycle.peak_index);
        }
        assert_eq!(detection.stats.len(), detection.peaks.len() - 1);
        let first = &detection.stats[0];
        assert_eq!(first.cycle, 1);
        assert!((first.mean - 60.0).abs() < 0.5);
        assert!(first.max <= 70.0 + 1e-9 && first.min >= 50.0 - 1e-9);
    }

    #[test]
    fn test_flat_series_has_no_extrema() {
        let detection = CycleDetector::detect(&[5.0; 40], &criteria(15.0, 4.0));
        assert!(detection.peaks.is_empty());
        assert!(detection.troughs.is_empty());
        assert!(detection.cycles.is_empty());
        assert!(!detection.is_sufficient());
    }

    #[test]
    fn test_single_peak_is_insufficient() {
        let x: Vec<f64> = (0..60)
            .map(|i| 40.0 * (-((i as f64 - 30.0) / 6.0).powi(2)).exp())
            .collect();
        let detection = CycleDetector::detect(&x, &criteria(15.0, 4.0));
        assert_eq!(detection.peaks, vec![30]);
        assert!(!detection.is_sufficient());
    }
}
