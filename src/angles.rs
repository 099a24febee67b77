//! Joint angle extraction
//!
//! Converts each detected frame's landmarks into the seven joint angles.
//! Angles are the included angle between two segment vectors, in degrees.

use crate::ingest::DetectedFrame;
use crate::types::{AngleSeries, Joint, JointGroup, Landmark, LandmarkIndex, LandmarkSet, Side};
use log::{debug, warn};
use std::collections::BTreeMap;

/// Image-up reference axis (y grows downwards)
pub const VERTICAL: Vector2 = Vector2 { x: 0.0, y: -1.0 };

/// Segment vector in image coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Vector pointing from `from` to `to`
    pub fn between(from: &Landmark, to: &Landmark) -> Self {
        Self::new(to.x - from.x, to.y - from.y)
    }

    pub fn dot(&self, other: &Vector2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn neg(&self) -> Vector2 {
        Vector2::new(-self.x, -self.y)
    }
}

/// Angle between two vectors in degrees, `None` if either has zero length.
///
/// The cosine is clamped to [-1, 1] before `acos`, so rounding drift on
/// parallel vectors yields 0° or 180° rather than NaN.
pub fn angle_between(v1: &Vector2, v2: &Vector2) -> Option<f64> {
    let denom = v1.norm() * v2.norm();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    let cos = (v1.dot(v2) / denom).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}

/// Landmarks of one body side
struct Limb {
    shoulder: LandmarkIndex,
    hip: LandmarkIndex,
    knee: LandmarkIndex,
    ankle: LandmarkIndex,
    foot: LandmarkIndex,
}

const LEFT: Limb = Limb {
    shoulder: LandmarkIndex::LeftShoulder,
    hip: LandmarkIndex::LeftHip,
    knee: LandmarkIndex::LeftKnee,
    ankle: LandmarkIndex::LeftAnkle,
    foot: LandmarkIndex::LeftFootIndex,
};

const RIGHT: Limb = Limb {
    shoulder: LandmarkIndex::RightShoulder,
    hip: LandmarkIndex::RightHip,
    knee: LandmarkIndex::RightKnee,
    ankle: LandmarkIndex::RightAnkle,
    foot: LandmarkIndex::RightFootIndex,
};

fn limb(side: Side) -> &'static Limb {
    match side {
        Side::Left => &LEFT,
        Side::Right => &RIGHT,
    }
}

/// Angle of one joint in one frame.
///
/// `None` when a landmark is missing or a segment has zero length.
pub fn joint_angle(joint: Joint, set: &LandmarkSet) -> Option<f64> {
    let get = |idx: LandmarkIndex| set.get(idx);

    let Some(side) = joint.side() else {
        let shoulders = get(LandmarkIndex::LeftShoulder)?.midpoint(get(LandmarkIndex::RightShoulder)?);
        let hips = get(LandmarkIndex::LeftHip)?.midpoint(get(LandmarkIndex::RightHip)?);
        return angle_between(&Vector2::between(&hips, &shoulders), &VERTICAL);
    };

    let l = limb(side);
    let (a, b, c) = match joint.group() {
        JointGroup::Hip => (l.shoulder, l.hip, l.knee),
        JointGroup::Knee => (l.hip, l.knee, l.ankle),
        JointGroup::Ankle => (l.knee, l.ankle, l.foot),
        JointGroup::Spine => return None,
    };
    let (a, b, c) = (get(a)?, get(b)?, get(c)?);

    // proximal segment (b -> a) against the continuation of the distal one (b -> c reversed)
    let proximal = Vector2::between(b, a);
    let distal = Vector2::between(c, b);
    angle_between(&proximal, &distal)
}

/// Angle series and per-joint count of frames lost to degenerate geometry
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub angles: AngleSeries,
    pub degenerate: BTreeMap<Joint, usize>,
}

impl Extraction {
    pub fn degenerate_total(&self) -> usize {
        self.degenerate.values().sum()
    }
}

/// Stage 2: detected frames to joint angle series
pub struct AngleExtractor;

impl AngleExtractor {
    pub fn extract(frames: &[DetectedFrame]) -> Extraction {
        let mut extraction = Extraction::default();
        for joint in Joint::ALL {
            extraction.angles.joints.insert(joint, Default::default());
        }

        for frame in frames {
            extraction.angles.frame_time.push(frame.time);
            for joint in Joint::ALL {
                match joint_angle(joint, &frame.landmarks) {
                    Some(angle) => {
                        if let Some(series) = extraction.angles.joints.get_mut(&joint) {
                            series.push(frame.time, angle);
                        }
                    }
                    None => *extraction.degenerate.entry(joint).or_insert(0) += 1,
                }
            }
        }

        for (joint, count) in &extraction.degenerate {
            warn!(
                "{}: {} frame(s) excluded for degenerate geometry",
                joint, count
            );
        }
        debug!("extracted angles for {} frames", frames.len());
        extraction
    }
}
