//! Left/right asymmetry
//!
//! Positive deltas mean the right side moves through more range than the left.

use crate::rom::RomRecord;
use crate::types::{Joint, JointGroup};
use serde::{Deserialize, Serialize};

/// Signed `right - left` ROM difference for one paired group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsymmetryRecord {
    pub group: JointGroup,
    /// Degrees; `None` when either side has no ROM
    pub delta: Option<f64>,
    /// `|delta|` exceeds the threshold
    pub flagged: bool,
}

pub fn asymmetry(right_rom: f64, left_rom: f64) -> f64 {
    right_rom - left_rom
}

pub struct AsymmetryEngine;

impl AsymmetryEngine {
    /// One record per paired group, ankle first
    pub fn compute(records: &[RomRecord], threshold_deg: f64) -> Vec<AsymmetryRecord> {
        let rom = |joint: Joint| records.iter().find(|r| r.joint == joint).and_then(RomRecord::value);

        JointGroup::PAIRED
            .iter()
            .filter_map(|&group| {
                let (left, right) = group.pair()?;
                let delta = rom(right)
                    .zip(rom(left))
                    .map(|(r, l)| asymmetry(r, l));
                Some(AsymmetryRecord {
                    group,
                    delta,
                    flagged: delta.is_some_and(|d| d.abs() > threshold_deg),
                })
            })
            .collect()
    }
}
