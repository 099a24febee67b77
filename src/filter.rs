//! Temporal low-pass filtering of angle series
//!
//! Digital Butterworth design through the bilinear transform, applied causally
//! in transposed direct form II. Coefficients match the usual
//! `butter(order, cutoff / nyquist)` design.

use crate::config::{FilterConfig, FilterStart};
use crate::error::GaitError;
use crate::types::{AngleSeries, JointSeries};
use log::{debug, warn};
use num_complex::Complex64;
use std::f64::consts::PI;

/// IIR low-pass with normalised denominator (`a[0] == 1`)
#[derive(Debug, Clone, PartialEq)]
pub struct ButterworthLowPass {
    b: Vec<f64>,
    a: Vec<f64>,
}

impl ButterworthLowPass {
    /// Design an `order`-pole low-pass with -3 dB point at `cutoff_hz`.
    ///
    /// Requires `0 < cutoff_hz < sample_rate / 2`.
    pub fn design(order: usize, cutoff_hz: f64, sample_rate: f64) -> Result<Self, GaitError> {
        if order == 0 {
            return Err(GaitError::InvalidConfig("filter order must be at least 1".into()));
        }
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(GaitError::InvalidFrameRate(sample_rate));
        }
        let nyquist = sample_rate / 2.0;
        let wn = cutoff_hz / nyquist;
        if !(wn > 0.0 && wn < 1.0) {
            return Err(GaitError::InvalidConfig(format!(
                "cutoff {cutoff_hz} Hz must lie in (0, {nyquist}) Hz"
            )));
        }

        // Analog prototype poles on the left half of the unit circle, scaled to
        // the pre-warped cutoff, then mapped with the bilinear transform (fs = 2).
        let warped = 4.0 * (PI * wn / 2.0).tan();
        let n = order as f64;
        let poles: Vec<Complex64> = (0..order)
            .map(|k| {
                let theta = PI * (2.0 * k as f64 + n + 1.0) / (2.0 * n);
                let analog = Complex64::from_polar(warped, theta);
                (4.0 + analog) / (4.0 - analog)
            })
            .collect();

        let a = poly(&poles);
        // all zeros at z = -1
        let mut b = binomial_row(order);

        let gain = a.iter().sum::<f64>() / b.iter().sum::<f64>();
        b.iter_mut().for_each(|c| *c *= gain);

        Ok(Self { b, a })
    }

    pub fn numerator(&self) -> &[f64] {
        &self.b
    }

    pub fn denominator(&self) -> &[f64] {
        &self.a
    }

    pub fn order(&self) -> usize {
        self.a.len() - 1
    }

    /// Filter state for a signal that has sat at `x0` forever
    fn steady_state(&self, x0: f64) -> Vec<f64> {
        let n = self.order();
        let y0 = x0 * self.b.iter().sum::<f64>() / self.a.iter().sum::<f64>();
        let mut zi = vec![0.0; n];
        let mut acc = 0.0;
        for i in (0..n).rev() {
            acc += self.b[i + 1] * x0 - self.a[i + 1] * y0;
            zi[i] = acc;
        }
        zi
    }

    /// Causal filtering of a whole series, same length out.
    ///
    /// State starts at the steady state of the first sample, so a constant
    /// offset passes without a start-up transient.
    pub fn apply(&self, x: &[f64]) -> Vec<f64> {
        self.apply_from(x, FilterStart::SteadyState)
    }

    pub fn apply_from(&self, x: &[f64], start: FilterStart) -> Vec<f64> {
        let Some(&x0) = x.first() else {
            return Vec::new();
        };
        let n = self.order();
        let mut z = match start {
            FilterStart::SteadyState => self.steady_state(x0),
            FilterStart::Zero => vec![0.0; n],
        };
        let mut y = Vec::with_capacity(x.len());

        for &xi in x {
            let yi = self.b[0] * xi + z[0];
            for i in 0..n {
                let next = if i + 1 < n { z[i + 1] } else { 0.0 };
                z[i] = self.b[i + 1] * xi + next - self.a[i + 1] * yi;
            }
            y.push(yi);
        }
        y
    }
}

/// Expand `prod(z - r)` into real polynomial coefficients, highest power first
fn poly(roots: &[Complex64]) -> Vec<f64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for &r in roots {
        let mut next = vec![Complex64::new(0.0, 0.0); coeffs.len() + 1];
        for (i, &c) in coeffs.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c * r;
        }
        coeffs = next;
    }
    // conjugate pole pairs leave only rounding in the imaginary parts
    coeffs.into_iter().map(|c| c.re).collect()
}

fn binomial_row(n: usize) -> Vec<f64> {
    let mut row = vec![1.0];
    for k in 0..n {
        let next = row[k] * (n - k) as f64 / (k + 1) as f64;
        row.push(next);
    }
    row
}

/// Stage 3: the same low-pass applied to every joint series
#[derive(Debug, Clone)]
pub enum TemporalFilter {
    LowPass(ButterworthLowPass, FilterStart),
    /// Cutoff at or above Nyquist; series pass through unchanged
    Bypass,
}

impl TemporalFilter {
    /// `sample_rate` is the source frame rate. A subsampled series is filtered
    /// with the same coefficients, which lowers the effective cutoff by the
    /// stride.
    pub fn new(config: &FilterConfig, sample_rate: f64) -> Result<Self, GaitError> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(GaitError::InvalidFrameRate(sample_rate));
        }
        if config.cutoff_hz >= sample_rate / 2.0 {
            warn!(
                "cutoff {} Hz is not below Nyquist ({} Hz); filtering bypassed",
                config.cutoff_hz,
                sample_rate / 2.0
            );
            return Ok(TemporalFilter::Bypass);
        }
        let design = ButterworthLowPass::design(config.order, config.cutoff_hz, sample_rate)?;
        debug!(
            "butterworth order {} at {} Hz (fs {:.2} Hz): b={:?} a={:?}",
            config.order, config.cutoff_hz, sample_rate, design.b, design.a
        );
        Ok(TemporalFilter::LowPass(design, config.start))
    }

    pub fn is_bypassed(&self) -> bool {
        matches!(self, TemporalFilter::Bypass)
    }

    pub fn apply(&self, values: &[f64]) -> Vec<f64> {
        match self {
            TemporalFilter::LowPass(f, start) if values.len() >= 2 => {
                f.apply_from(values, *start)
            }
            _ => values.to_vec(),
        }
    }

    pub fn filter_series(&self, series: &JointSeries) -> JointSeries {
        series.with_values(self.apply(&series.values))
    }

    /// Filter every joint independently; timestamps are kept
    pub fn filter_angles(&self, angles: &AngleSeries) -> AngleSeries {
        angles.map_joints(|_, series| self.filter_series(series))
    }
}
