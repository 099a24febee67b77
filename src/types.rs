//! Core types for the gait kinematics pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: landmark frames, joint-angle series, and the shared vocabulary of
//! joints, camera views and activities.

use crate::error::GaitError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A 2D point in normalized frame coordinates (x right, y down)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Midpoint between two landmarks
    pub fn midpoint(&self, other: &Landmark) -> Landmark {
        Landmark::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Fixed anatomical landmark index (MediaPipe 33-point numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkIndex {
    LeftShoulder,
    RightShoulder,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl LandmarkIndex {
    /// Every landmark the pipeline knows about
    pub const ALL: [LandmarkIndex; 12] = [
        LandmarkIndex::LeftShoulder,
        LandmarkIndex::RightShoulder,
        LandmarkIndex::LeftHip,
        LandmarkIndex::RightHip,
        LandmarkIndex::LeftKnee,
        LandmarkIndex::RightKnee,
        LandmarkIndex::LeftAnkle,
        LandmarkIndex::RightAnkle,
        LandmarkIndex::LeftHeel,
        LandmarkIndex::RightHeel,
        LandmarkIndex::LeftFootIndex,
        LandmarkIndex::RightFootIndex,
    ];

    /// Landmarks a frame must carry to be analysed
    pub const REQUIRED: [LandmarkIndex; 10] = [
        LandmarkIndex::LeftShoulder,
        LandmarkIndex::RightShoulder,
        LandmarkIndex::LeftHip,
        LandmarkIndex::RightHip,
        LandmarkIndex::LeftKnee,
        LandmarkIndex::RightKnee,
        LandmarkIndex::LeftAnkle,
        LandmarkIndex::RightAnkle,
        LandmarkIndex::LeftFootIndex,
        LandmarkIndex::RightFootIndex,
    ];

    /// Position in the 33-point pose model output
    pub fn index(&self) -> usize {
        match self {
            LandmarkIndex::LeftShoulder => 11,
            LandmarkIndex::RightShoulder => 12,
            LandmarkIndex::LeftHip => 23,
            LandmarkIndex::RightHip => 24,
            LandmarkIndex::LeftKnee => 25,
            LandmarkIndex::RightKnee => 26,
            LandmarkIndex::LeftAnkle => 27,
            LandmarkIndex::RightAnkle => 28,
            LandmarkIndex::LeftHeel => 29,
            LandmarkIndex::RightHeel => 30,
            LandmarkIndex::LeftFootIndex => 31,
            LandmarkIndex::RightFootIndex => 32,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.iter().copied().find(|l| l.index() == index)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LandmarkIndex::LeftShoulder => "left_shoulder",
            LandmarkIndex::RightShoulder => "right_shoulder",
            LandmarkIndex::LeftHip => "left_hip",
            LandmarkIndex::RightHip => "right_hip",
            LandmarkIndex::LeftKnee => "left_knee",
            LandmarkIndex::RightKnee => "right_knee",
            LandmarkIndex::LeftAnkle => "left_ankle",
            LandmarkIndex::RightAnkle => "right_ankle",
            LandmarkIndex::LeftHeel => "left_heel",
            LandmarkIndex::RightHeel => "right_heel",
            LandmarkIndex::LeftFootIndex => "left_foot_index",
            LandmarkIndex::RightFootIndex => "right_foot_index",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|l| l.as_str() == name)
    }
}

/// Landmarks detected in one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    points: BTreeMap<LandmarkIndex, Landmark>,
}

impl LandmarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: LandmarkIndex, landmark: Landmark) {
        self.points.insert(index, landmark);
    }

    pub fn get(&self, index: LandmarkIndex) -> Option<&Landmark> {
        self.points.get(&index)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True when every required landmark is present
    pub fn is_complete(&self) -> bool {
        LandmarkIndex::REQUIRED
            .iter()
            .all(|idx| self.points.contains_key(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LandmarkIndex, &Landmark)> {
        self.points.iter()
    }
}

impl FromIterator<(LandmarkIndex, Landmark)> for LandmarkSet {
    fn from_iter<T: IntoIterator<Item = (LandmarkIndex, Landmark)>>(iter: T) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

/// One processed video frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSample {
    pub frame_index: u64,
    /// Seconds from the start of the source
    pub timestamp: f64,
    /// `None` when the pose source found no subject in this frame
    pub landmarks: Option<LandmarkSet>,
}

/// Body side of a paired joint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// Joint group used for reference bands, narratives and asymmetry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointGroup {
    Spine,
    Hip,
    Knee,
    Ankle,
}

impl JointGroup {
    pub const ALL: [JointGroup; 4] = [
        JointGroup::Spine,
        JointGroup::Hip,
        JointGroup::Knee,
        JointGroup::Ankle,
    ];

    /// Groups that have a left and right joint
    pub const PAIRED: [JointGroup; 3] = [JointGroup::Ankle, JointGroup::Knee, JointGroup::Hip];

    pub fn as_str(&self) -> &'static str {
        match self {
            JointGroup::Spine => "spine",
            JointGroup::Hip => "hip",
            JointGroup::Knee => "knee",
            JointGroup::Ankle => "ankle",
        }
    }

    /// The (left, right) joints of a paired group
    pub fn pair(&self) -> Option<(Joint, Joint)> {
        match self {
            JointGroup::Spine => None,
            JointGroup::Hip => Some((Joint::LeftHip, Joint::RightHip)),
            JointGroup::Knee => Some((Joint::LeftKnee, Joint::RightKnee)),
            JointGroup::Ankle => Some((Joint::LeftAnkle, Joint::RightAnkle)),
        }
    }
}

/// The seven tracked joints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    SpineSegment,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl Joint {
    pub const ALL: [Joint; 7] = [
        Joint::SpineSegment,
        Joint::LeftHip,
        Joint::RightHip,
        Joint::LeftKnee,
        Joint::RightKnee,
        Joint::LeftAnkle,
        Joint::RightAnkle,
    ];

    pub fn group(&self) -> JointGroup {
        match self {
            Joint::SpineSegment => JointGroup::Spine,
            Joint::LeftHip | Joint::RightHip => JointGroup::Hip,
            Joint::LeftKnee | Joint::RightKnee => JointGroup::Knee,
            Joint::LeftAnkle | Joint::RightAnkle => JointGroup::Ankle,
        }
    }

    pub fn side(&self) -> Option<Side> {
        match self {
            Joint::SpineSegment => None,
            Joint::LeftHip | Joint::LeftKnee | Joint::LeftAnkle => Some(Side::Left),
            Joint::RightHip | Joint::RightKnee | Joint::RightAnkle => Some(Side::Right),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Joint::SpineSegment => "spine_segment",
            Joint::LeftHip => "left_hip",
            Joint::RightHip => "right_hip",
            Joint::LeftKnee => "left_knee",
            Joint::RightKnee => "right_knee",
            Joint::LeftAnkle => "left_ankle",
            Joint::RightAnkle => "right_ankle",
        }
    }

    /// Human-readable label for tables
    pub fn label(&self) -> &'static str {
        match self {
            Joint::SpineSegment => "Spine Segment",
            Joint::LeftHip => "Left Hip",
            Joint::RightHip => "Right Hip",
            Joint::LeftKnee => "Left Knee",
            Joint::RightKnee => "Right Knee",
            Joint::LeftAnkle => "Left Ankle",
            Joint::RightAnkle => "Right Ankle",
        }
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Camera placement relative to the subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraView {
    /// Sagittal plane (flexion/extension)
    Side,
    /// Frontal plane (ab/adduction, valgus/varus)
    Back,
}

impl CameraView {
    pub const ALL: [CameraView; 2] = [CameraView::Side, CameraView::Back];

    pub fn as_str(&self) -> &'static str {
        match self {
            CameraView::Side => "side",
            CameraView::Back => "back",
        }
    }
}

impl fmt::Display for CameraView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CameraView {
    type Err = GaitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "side" | "sagittal" => Ok(CameraView::Side),
            "back" | "frontal" | "posterior" => Ok(CameraView::Back),
            other => Err(GaitError::InvalidConfig(format!("unknown camera view '{other}'"))),
        }
    }
}

/// Movement being analysed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Activity {
    Walking,
    Running,
    PickupPen,
}

impl Activity {
    pub const ALL: [Activity; 3] = [Activity::Walking, Activity::Running, Activity::PickupPen];

    pub fn as_str(&self) -> &'static str {
        match self {
            Activity::Walking => "walking",
            Activity::Running => "running",
            Activity::PickupPen => "pickup-pen",
        }
    }

    /// Cyclic locomotion, as opposed to a single reach task
    pub fn is_gait(&self) -> bool {
        matches!(self, Activity::Walking | Activity::Running)
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Activity {
    type Err = GaitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "walking" | "walk" => Ok(Activity::Walking),
            "running" | "run" => Ok(Activity::Running),
            "pickup-pen" | "pickup_pen" | "pickup pen" => Ok(Activity::PickupPen),
            other => Err(GaitError::InvalidConfig(format!("unknown activity '{other}'"))),
        }
    }
}

/// Closed time interval in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Result<Self, GaitError> {
        if !start.is_finite() || !end.is_finite() {
            return Err(GaitError::InvalidWindow("bounds must be finite".to_string()));
        }
        if start > end {
            return Err(GaitError::InvalidWindow(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }
}

/// Ordered `(time, angle)` samples for one joint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JointSeries {
    pub time: Vec<f64>,
    pub values: Vec<f64>,
}

impl JointSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, time: f64, value: f64) {
        self.time.push(time);
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Same timestamps, replaced values
    pub fn with_values(&self, values: Vec<f64>) -> JointSeries {
        debug_assert_eq!(values.len(), self.time.len());
        JointSeries {
            time: self.time.clone(),
            values,
        }
    }

    /// New series holding only the samples inside `window`
    pub fn crop(&self, window: &TimeWindow) -> JointSeries {
        let mut cropped = JointSeries::new();
        for (&t, &v) in self.time.iter().zip(&self.values) {
            if window.contains(t) {
                cropped.push(t, v);
            }
        }
        cropped
    }
}

/// Per-joint angle series for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AngleSeries {
    /// Timestamps of every frame that reached the angle extractor
    pub frame_time: Vec<f64>,
    pub joints: BTreeMap<Joint, JointSeries>,
}

impl AngleSeries {
    pub fn get(&self, joint: Joint) -> Option<&JointSeries> {
        self.joints.get(&joint)
    }

    /// Apply `f` to every joint's values, keeping timestamps
    pub fn map_joints<F>(&self, mut f: F) -> AngleSeries
    where
        F: FnMut(Joint, &JointSeries) -> JointSeries,
    {
        AngleSeries {
            frame_time: self.frame_time.clone(),
            joints: self
                .joints
                .iter()
                .map(|(&joint, series)| (joint, f(joint, series)))
                .collect(),
        }
    }

    /// New bounded view of every joint inside `window`
    pub fn crop(&self, window: &TimeWindow) -> AngleSeries {
        AngleSeries {
            frame_time: self
                .frame_time
                .iter()
                .copied()
                .filter(|t| window.contains(*t))
                .collect(),
            joints: self
                .joints
                .iter()
                .map(|(&joint, series)| (joint, series.crop(window)))
                .collect(),
        }
    }
}

/// Quality flags surfaced in the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    /// Some frames had no landmarks
    DetectionGaps,
    /// Some joint/frame pairs had a zero-length segment
    DegenerateGeometry,
    /// Cutoff at or above Nyquist; series left unfiltered
    FilterBypassed,
    /// At least one joint has too few cycles for ROM
    InsufficientCycles,
    /// Analysis restricted to the centred part of a long stream
    DurationCropped,
    /// Analysis restricted to a caller-selected window
    WindowCropped,
    /// Frames subsampled at a stride greater than one
    Subsampled,
}
