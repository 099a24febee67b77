//! Range-of-motion records
//!
//! Limb joints are measured as mean peak height minus mean trough depth,
//! which is less sensitive to a single mis-detected frame than raw max/min.

use crate::config::RomMethod;
use crate::cycles::CycleDetection;
use crate::types::Joint;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RomStatus {
    Available,
    /// Too few extrema (or samples) to measure
    InsufficientData,
}

/// ROM summary for one joint; measurements are `None` unless available
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RomRecord {
    pub joint: Joint,
    pub status: RomStatus,
    pub method: RomMethod,
    pub min_angle: Option<f64>,
    pub max_angle: Option<f64>,
    pub range_of_motion: Option<f64>,
    /// Raw max minus min, reported whenever the series is non-empty
    pub rom_span: Option<f64>,
}

impl RomRecord {
    pub fn is_available(&self) -> bool {
        self.status == RomStatus::Available
    }

    /// Value used for classification, asymmetry and recommendations
    pub fn value(&self) -> Option<f64> {
        self.range_of_motion
    }
}

fn mean_at(values: &[f64], indices: &[usize]) -> Option<f64> {
    if indices.is_empty() {
        return None;
    }
    let sum: f64 = indices.iter().map(|&i| values.get(i).copied()).sum::<Option<f64>>()?;
    Some(sum / indices.len() as f64)
}

/// `mean(peaks) - mean(troughs)`, `None` with fewer than two of either
pub fn rom_mean(values: &[f64], detection: &CycleDetection) -> Option<f64> {
    if !detection.is_sufficient() {
        return None;
    }
    Some(mean_at(values, &detection.peaks)? - mean_at(values, &detection.troughs)?)
}

/// `max - min`, `None` for an empty series
pub fn rom_span(values: &[f64]) -> Option<f64> {
    let (min, max) = min_max(values)?;
    Some(max - min)
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    }))
}

pub struct RomCalculator;

impl RomCalculator {
    pub fn compute(
        joint: Joint,
        values: &[f64],
        detection: &CycleDetection,
        method: RomMethod,
    ) -> RomRecord {
        let span = rom_span(values);
        let mut record = RomRecord {
            joint,
            status: RomStatus::InsufficientData,
            method,
            min_angle: None,
            max_angle: None,
            range_of_motion: None,
            rom_span: span,
        };

        let bounds = match method {
            RomMethod::PeakTroughMean if detection.is_sufficient() => mean_at(values, &detection.troughs)
                .zip(mean_at(values, &detection.peaks)),
            RomMethod::Span if values.len() >= 2 => min_max(values),
            _ => None,
        };

        if let Some((low, high)) = bounds {
            record.status = RomStatus::Available;
            record.min_angle = Some(low);
            record.max_angle = Some(high);
            record.range_of_motion = Some(high - low);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(peaks: Vec<usize>, troughs: Vec<usize>) -> CycleDetection {
        CycleDetection {
            peaks,
            troughs,
            ..Default::default()
        }
    }

    #[test]
    fn test_peak_trough_mean() {
        let values = [50.0, 70.0, 52.0, 68.0, 48.0, 72.0];
        let d = detection(vec![1, 3, 5], vec![2, 4]);
        let record = RomCalculator::compute(Joint::LeftKnee, &values, &d, RomMethod::PeakTroughMean);

        assert!(record.is_available());
        assert_eq!(record.max_angle, Some(70.0));
        assert_eq!(record.min_angle, Some(50.0));
        assert_eq!(record.range_of_motion, Some(20.0));
        assert_eq!(record.rom_span, Some(24.0));
    }

    #[test]
    fn test_one_peak_is_insufficient() {
        let values = [50.0, 70.0, 52.0, 55.0, 48.0];
        let d = detection(vec![1], vec![2, 4]);
        let record = RomCalculator::compute(Joint::RightHip, &values, &d, RomMethod::PeakTroughMean);

        assert_eq!(record.status, RomStatus::InsufficientData);
        assert_eq!(record.range_of_motion, None);
        assert_eq!(record.value(), None);
        // span is still informative
        assert_eq!(record.rom_span, Some(22.0));
        assert_eq!(rom_mean(&values, &d), None);
    }

    #[test]
    fn test_span_method() {
        let values = [2.0, 4.5, 3.0, 1.0];
        let record = RomCalculator::compute(
            Joint::SpineSegment,
            &values,
            &CycleDetection::default(),
            RomMethod::Span,
        );
        assert!(record.is_available());
        assert_eq!(record.min_angle, Some(1.0));
        assert_eq!(record.max_angle, Some(4.5));
        assert_eq!(record.range_of_motion, Some(3.5));
    }

    #[test]
    fn test_empty_series() {
        let record = RomCalculator::compute(
            Joint::SpineSegment,
            &[],
            &CycleDetection::default(),
            RomMethod::Span,
        );
        assert_eq!(record.status, RomStatus::InsufficientData);
        assert_eq!(record.rom_span, None);
    }
}
