//! Report assembly
//!
//! Collects the per-joint results of one run into a `GaitReport`: the display
//! ROM table, classifications with narrative keys, asymmetry and the
//! recommendations. Every joint is always present; joints that could not be
//! measured carry `not_computed` rather than a missing field.

use crate::asymmetry::AsymmetryRecord;
use crate::bands::Classification;
use crate::cycles::{CycleDetection, CycleStats};
use crate::error::GaitError;
use crate::narrative::{Narrative, NarrativeKey};
use crate::recommend::{Exercise, FootwearRecommendation, RomFeatures};
use crate::rom::{RomRecord, RomStatus};
use crate::types::{Activity, CameraView, Joint, JointSeries, QualityFlag, TimeWindow};
use crate::{GAIT_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Round to one decimal place for display
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Classification as reported, including the not-computed sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointClassification {
    SweetSpot,
    MinorOpportunity,
    MajorOpportunity,
    NotComputed,
}

impl JointClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            JointClassification::SweetSpot => "sweet_spot",
            JointClassification::MinorOpportunity => "minor_opportunity",
            JointClassification::MajorOpportunity => "major_opportunity",
            JointClassification::NotComputed => "not_computed",
        }
    }
}

impl From<Option<Classification>> for JointClassification {
    fn from(c: Option<Classification>) -> Self {
        match c {
            Some(Classification::SweetSpot) => JointClassification::SweetSpot,
            Some(Classification::MinorOpportunity) => JointClassification::MinorOpportunity,
            Some(Classification::MajorOpportunity) => JointClassification::MajorOpportunity,
            None => JointClassification::NotComputed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProvenance {
    pub source_id: Option<String>,
    pub view: CameraView,
    pub activity: Activity,
    pub fps: f64,
    pub effective_sample_rate: f64,
    pub stride: usize,
    pub window: Option<TimeWindow>,
    pub computed_at_utc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportQuality {
    pub frames_total: usize,
    pub frames_analyzed: usize,
    pub frames_dropped: usize,
    pub flags: Vec<QualityFlag>,
}

/// One display row, values rounded to 0.1°
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RomRow {
    pub joint: Joint,
    pub label: String,
    pub min_angle: Option<f64>,
    pub max_angle: Option<f64>,
    pub range_of_motion: Option<f64>,
}

impl From<&RomRecord> for RomRow {
    fn from(record: &RomRecord) -> Self {
        Self {
            joint: record.joint,
            label: record.joint.label().to_string(),
            min_angle: record.min_angle.map(round1),
            max_angle: record.max_angle.map(round1),
            range_of_motion: record.range_of_motion.map(round1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointReport {
    pub joint: Joint,
    pub status: RomStatus,
    /// Unrounded value used for classification
    pub rom: Option<f64>,
    pub rom_span: Option<f64>,
    pub peaks: usize,
    pub troughs: usize,
    pub classification: JointClassification,
    pub narrative: Narrative,
    pub cycle_stats: Vec<CycleStats>,
}

/// Time-aligned raw and filtered angles of one joint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesReport {
    pub time: Vec<f64>,
    pub raw: Vec<f64>,
    pub filtered: Vec<f64>,
}

/// Output of one (video, view, activity) run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaitReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub provenance: ReportProvenance,
    pub quality: ReportQuality,
    pub rom_table: Vec<RomRow>,
    pub joints: Vec<JointReport>,
    pub asymmetry: Vec<AsymmetryRecord>,
    pub features: RomFeatures,
    pub footwear: FootwearRecommendation,
    pub training: Vec<Exercise>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<BTreeMap<Joint, SeriesReport>>,
}

impl GaitReport {
    pub fn joint(&self, joint: Joint) -> Option<&JointReport> {
        self.joints.iter().find(|j| j.joint == joint)
    }

    pub fn rom_row(&self, joint: Joint) -> Option<&RomRow> {
        self.rom_table.iter().find(|r| r.joint == joint)
    }

    pub fn to_json(&self) -> Result<String, GaitError> {
        serde_json::to_string(self).map_err(|e| GaitError::EncodingError(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String, GaitError> {
        serde_json::to_string_pretty(self).map_err(|e| GaitError::EncodingError(e.to_string()))
    }
}

/// Everything computed for one joint
#[derive(Debug, Clone)]
pub struct JointAnalysis {
    pub joint: Joint,
    pub raw: JointSeries,
    pub filtered: JointSeries,
    pub detection: CycleDetection,
    pub rom: RomRecord,
    pub classification: Option<Classification>,
}

/// Run-level facts carried into provenance and quality
#[derive(Debug, Clone)]
pub struct RunContext {
    pub source_id: Option<String>,
    pub view: CameraView,
    pub activity: Activity,
    pub fps: f64,
    pub sample_rate: f64,
    pub stride: usize,
    pub window: Option<TimeWindow>,
    pub frames_total: usize,
    pub frames_analyzed: usize,
    pub frames_dropped: usize,
    pub flags: Vec<QualityFlag>,
}

/// Cross-joint results of stage 5
#[derive(Debug, Clone)]
pub struct Scoring {
    pub asymmetry: Vec<AsymmetryRecord>,
    pub features: RomFeatures,
    pub footwear: FootwearRecommendation,
    pub training: Vec<Exercise>,
}

/// Stage 6: assembles the report
pub struct SummaryAggregator {
    instance_id: String,
}

impl Default for SummaryAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryAggregator {
    /// Create an aggregator with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn aggregate(
        &self,
        context: &RunContext,
        joints: &[JointAnalysis],
        scoring: Scoring,
        include_series: bool,
    ) -> GaitReport {
        let producer = ReportProducer {
            name: PRODUCER_NAME.to_string(),
            version: GAIT_VERSION.to_string(),
            instance_id: self.instance_id.clone(),
        };

        let provenance = ReportProvenance {
            source_id: context.source_id.clone(),
            view: context.view,
            activity: context.activity,
            fps: context.fps,
            effective_sample_rate: context.sample_rate,
            stride: context.stride,
            window: context.window,
            computed_at_utc: Utc::now().to_rfc3339(),
        };

        let quality = ReportQuality {
            frames_total: context.frames_total,
            frames_analyzed: context.frames_analyzed,
            frames_dropped: context.frames_dropped,
            flags: context.flags.clone(),
        };

        let rom_table = joints.iter().map(|j| RomRow::from(&j.rom)).collect();
        let joint_reports = joints
            .iter()
            .map(|j| self.build_joint(context, j))
            .collect();

        let series = include_series.then(|| {
            joints
                .iter()
                .map(|j| {
                    (
                        j.joint,
                        SeriesReport {
                            time: j.raw.time.clone(),
                            raw: j.raw.values.clone(),
                            filtered: j.filtered.values.clone(),
                        },
                    )
                })
                .collect()
        });

        GaitReport {
            report_version: REPORT_VERSION.to_string(),
            producer,
            provenance,
            quality,
            rom_table,
            joints: joint_reports,
            asymmetry: scoring.asymmetry,
            features: scoring.features,
            footwear: scoring.footwear,
            training: scoring.training,
            series,
        }
    }

    fn build_joint(&self, context: &RunContext, analysis: &JointAnalysis) -> JointReport {
        let group = analysis.joint.group();
        let narrative = match analysis.classification {
            Some(c) => NarrativeKey::new(group, context.view, context.activity, c).into(),
            None => Narrative::not_computed(group, context.view, context.activity),
        };

        JointReport {
            joint: analysis.joint,
            status: analysis.rom.status,
            rom: analysis.rom.range_of_motion,
            rom_span: analysis.rom.rom_span,
            peaks: analysis.detection.peaks.len(),
            troughs: analysis.detection.troughs.len(),
            classification: analysis.classification.into(),
            narrative,
            cycle_stats: analysis.detection.stats.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RomMethod;
    use crate::recommend::FootwearCategory;

    fn analysis(joint: Joint, rom: Option<(f64, f64)>) -> JointAnalysis {
        let mut series = JointSeries::new();
        series.push(0.0, 50.0);
        series.push(0.1, 70.0);
        JointAnalysis {
            joint,
            raw: series.clone(),
            filtered: series,
            detection: CycleDetection::default(),
            rom: RomRecord {
                joint,
                status: if rom.is_some() {
                    RomStatus::Available
                } else {
                    RomStatus::InsufficientData
                },
                method: RomMethod::PeakTroughMean,
                min_angle: rom.map(|r| r.0),
                max_angle: rom.map(|r| r.1),
                range_of_motion: rom.map(|(lo, hi)| hi - lo),
                rom_span: Some(20.0),
            },
            classification: rom.map(|_| Classification::SweetSpot),
        }
    }

    fn context() -> RunContext {
        RunContext {
            source_id: Some("clip-7".to_string()),
            view: CameraView::Side,
            activity: Activity::Walking,
            fps: 30.0,
            sample_rate: 30.0,
            stride: 1,
            window: None,
            frames_total: 300,
            frames_analyzed: 298,
            frames_dropped: 2,
            flags: vec![QualityFlag::DetectionGaps],
        }
    }

    fn scoring() -> Scoring {
        Scoring {
            asymmetry: Vec::new(),
            features: RomFeatures::default(),
            footwear: FootwearCategory::Neutral.into(),
            training: Vec::new(),
        }
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(20.04), 20.0);
        assert_eq!(round1(20.06), 20.1);
        assert_eq!(round1(-4.96), -5.0);
    }

    #[test]
    fn test_report_structure() {
        let aggregator = SummaryAggregator::with_instance_id("test-instance".to_string());
        let joints = [
            analysis(Joint::LeftKnee, Some((50.04, 70.06))),
            analysis(Joint::RightKnee, None),
        ];
        let report = aggregator.aggregate(&context(), &joints, scoring(), false);

        assert_eq!(report.report_version, REPORT_VERSION);
        assert_eq!(report.producer.name, PRODUCER_NAME);
        assert_eq!(report.producer.instance_id, "test-instance");
        assert_eq!(report.quality.frames_dropped, 2);
        assert!(report.series.is_none());

        let row = report.rom_row(Joint::LeftKnee).unwrap();
        assert_eq!(row.min_angle, Some(50.0));
        assert_eq!(row.max_angle, Some(70.1));
        assert_eq!(row.range_of_motion, Some(20.0));
        assert_eq!(row.label, "Left Knee");

        let left = report.joint(Joint::LeftKnee).unwrap();
        assert_eq!(left.classification, JointClassification::SweetSpot);
        assert_eq!(left.narrative.key, "knee.side.walking.sweet_spot");
        assert!(left.narrative.text.is_some());

        let right = report.joint(Joint::RightKnee).unwrap();
        assert_eq!(right.status, RomStatus::InsufficientData);
        assert_eq!(right.classification, JointClassification::NotComputed);
        assert_eq!(right.narrative.key, "knee.side.walking.not_computed");
        assert_eq!(right.narrative.text, None);
        assert_eq!(report.rom_row(Joint::RightKnee).unwrap().range_of_motion, None);
    }

    #[test]
    fn test_json_shape() {
        let aggregator = SummaryAggregator::new();
        let joints = [analysis(Joint::SpineSegment, None)];
        let report = aggregator.aggregate(&context(), &joints, scoring(), true);
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(json["provenance"]["view"], "side");
        assert_eq!(json["provenance"]["activity"], "walking");
        assert_eq!(json["quality"]["flags"][0], "detection_gaps");
        assert_eq!(json["joints"][0]["classification"], "not_computed");
        assert_eq!(json["joints"][0]["status"], "insufficient_data");
        assert!(json["rom_table"][0]["range_of_motion"].is_null());
        assert_eq!(json["footwear"]["category"], "neutral");
        assert_eq!(json["series"]["spine_segment"]["raw"][1], 70.0);
        assert!(uuid::Uuid::parse_str(json["producer"]["instance_id"].as_str().unwrap()).is_ok());

        let parsed: GaitReport = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, report);
    }
}
