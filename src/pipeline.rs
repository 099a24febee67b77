//! Pipeline orchestration
//!
//! This module provides the public API of the crate. It runs one landmark
//! stream through every stage and returns the report:
//!
//! 1. Ingestor - Validate, crop, subsample and drop detection gaps
//! 2. AngleExtractor - Seven joint angles per frame
//! 3. TemporalFilter - Butterworth low-pass per joint
//! 4. CycleDetector - Peaks, troughs and cycles per joint
//! 5. ROM, classification, asymmetry and recommendations
//! 6. SummaryAggregator - Assemble the report
//!
//! Runs are stateless: the analyzer holds only configuration, so one instance
//! can serve any number of streams.

use crate::angles::AngleExtractor;
use crate::asymmetry::AsymmetryEngine;
use crate::bands::ReferenceBandSet;
use crate::config::AnalysisConfig;
use crate::cycles::{CycleDetector, PeakCriteria};
use crate::error::GaitError;
use crate::filter::TemporalFilter;
use crate::ingest::{Ingestor, LandmarkStream};
use crate::recommend::{recommend_footwear, recommend_training, RomFeatures};
use crate::rom::RomCalculator;
use crate::summary::{GaitReport, JointAnalysis, RunContext, Scoring, SummaryAggregator};
use crate::types::{Activity, CameraView, Joint, QualityFlag, TimeWindow};
use log::{debug, info, warn};

/// Analyze a landmark stream JSON document with the default configuration.
///
/// # Arguments
/// * `json` - Landmark stream document (`{fps, source_id?, frames}`)
/// * `view` - Camera placement
/// * `activity` - Movement being analysed
///
/// # Returns
/// The report as compact JSON
///
/// # Example
/// ```ignore
/// let report = analyze_json(&stream_json, CameraView::Side, Activity::Walking)?;
/// ```
pub fn analyze_json(json: &str, view: CameraView, activity: Activity) -> Result<String, GaitError> {
    let stream = LandmarkStream::from_json(json)?;
    GaitAnalyzer::new()
        .analyze(&stream, view, activity, None)?
        .to_json()
}

/// One stream of a batch
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub stream: LandmarkStream,
    pub view: CameraView,
    pub activity: Activity,
    pub window: Option<TimeWindow>,
}

/// Runs streams through the full pipeline
pub struct GaitAnalyzer {
    config: AnalysisConfig,
    bands: ReferenceBandSet,
    aggregator: SummaryAggregator,
}

impl Default for GaitAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl GaitAnalyzer {
    /// Create an analyzer with the default configuration and built-in bands
    pub fn new() -> Self {
        Self {
            config: AnalysisConfig::default(),
            bands: ReferenceBandSet::standard().clone(),
            aggregator: SummaryAggregator::new(),
        }
    }

    /// Create an analyzer from a validated configuration
    pub fn with_config(config: AnalysisConfig) -> Result<Self, GaitError> {
        config.validate()?;
        let bands = ReferenceBandSet::standard().with_overrides(&config.bands);
        Ok(Self {
            config,
            bands,
            aggregator: SummaryAggregator::new(),
        })
    }

    /// Replace the reference bands entirely
    pub fn with_bands(mut self, bands: ReferenceBandSet) -> Self {
        self.bands = bands;
        self
    }

    pub fn with_instance_id(mut self, instance_id: String) -> Self {
        self.aggregator = SummaryAggregator::with_instance_id(instance_id);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn bands(&self) -> &ReferenceBandSet {
        &self.bands
    }

    /// Run one stream. Only ingest-level and configuration problems are errors;
    /// per-joint problems are reported inside the report.
    pub fn analyze(
        &self,
        stream: &LandmarkStream,
        view: CameraView,
        activity: Activity,
        window: Option<TimeWindow>,
    ) -> Result<GaitReport, GaitError> {
        if !self.bands.covers(view, activity) {
            return Err(GaitError::MissingBands {
                view: view.to_string(),
                activity: activity.to_string(),
            });
        }

        // Stage 1: Ingest
        let ingested = Ingestor::ingest(stream, &self.config.ingest)?;
        let mut flags = ingested.flags.clone();

        // Stage 2: Angles
        let extraction = AngleExtractor::extract(&ingested.frames);
        if extraction.degenerate_total() > 0 {
            flags.push(QualityFlag::DegenerateGeometry);
        }

        // Stage 3: Filter the full series, then crop. The cutoff is normalised
        // against the source frame rate, also for subsampled streams.
        let filter = TemporalFilter::new(&self.config.filter, ingested.fps)?;
        if filter.is_bypassed() {
            flags.push(QualityFlag::FilterBypassed);
        }
        let filtered = filter.filter_angles(&extraction.angles);

        let (raw, filtered) = match &window {
            Some(w) => {
                let raw = extraction.angles.crop(w);
                if raw.frame_time.is_empty() {
                    return Err(GaitError::InvalidWindow(format!(
                        "no analysed frames between {} s and {} s",
                        w.start, w.end
                    )));
                }
                flags.push(QualityFlag::WindowCropped);
                (raw, filtered.crop(w))
            }
            None => (extraction.angles, filtered),
        };

        // Stage 4-5: Cycles, ROM and classification per joint
        let criteria = PeakCriteria::from_config(&self.config.cycles, ingested.sample_rate);
        let joints: Vec<JointAnalysis> = Joint::ALL
            .iter()
            .map(|&joint| {
                let raw_series = raw.get(joint).cloned().unwrap_or_default();
                let filtered_series = filtered.get(joint).cloned().unwrap_or_default();
                let detection = CycleDetector::detect(&filtered_series.values, &criteria);
                let rom = RomCalculator::compute(
                    joint,
                    &filtered_series.values,
                    &detection,
                    self.config.rom_method(joint),
                );
                let classification = rom
                    .value()
                    .map(|v| self.bands.classify(view, activity, joint.group(), v));
                debug!(
                    "{}: {} peaks, {} troughs, rom {:?}",
                    joint,
                    detection.peaks.len(),
                    detection.troughs.len(),
                    rom.value()
                );
                JointAnalysis {
                    joint,
                    raw: raw_series,
                    filtered: filtered_series,
                    detection,
                    rom,
                    classification,
                }
            })
            .collect();

        let insufficient: Vec<&str> = joints
            .iter()
            .filter(|j| !j.rom.is_available())
            .map(|j| j.joint.as_str())
            .collect();
        if !insufficient.is_empty() {
            warn!("insufficient cycles for ROM: {}", insufficient.join(", "));
            flags.push(QualityFlag::InsufficientCycles);
        }

        // Stage 5: Cross-joint scoring
        let records: Vec<_> = joints.iter().map(|j| j.rom.clone()).collect();
        let features = RomFeatures::from_records(&records);
        let mut training = recommend_training(&features, view, activity);
        training.truncate(self.config.max_exercises);
        let scoring = Scoring {
            asymmetry: AsymmetryEngine::compute(&records, self.config.asymmetry_threshold_deg),
            features,
            footwear: recommend_footwear(&features, view, activity),
            training,
        };

        // Stage 6: Report
        let context = RunContext {
            source_id: ingested.source_id.clone(),
            view,
            activity,
            fps: ingested.fps,
            sample_rate: ingested.sample_rate,
            stride: ingested.stride,
            window,
            frames_total: ingested.frames_total,
            frames_analyzed: raw.frame_time.len(),
            frames_dropped: ingested.frames_dropped,
            flags,
        };
        let report = self
            .aggregator
            .aggregate(&context, &joints, scoring, self.config.include_series);

        info!(
            "analyzed {} ({}/{}): {} frames, footwear {}",
            report.provenance.source_id.as_deref().unwrap_or("stream"),
            view,
            activity,
            report.quality.frames_analyzed,
            report.footwear.category
        );
        Ok(report)
    }

    /// Run each job independently; one failure never affects another
    pub fn analyze_batch(&self, jobs: &[AnalysisJob]) -> Vec<Result<GaitReport, GaitError>> {
        jobs.iter()
            .enumerate()
            .map(|(i, job)| {
                let result = self.analyze(&job.stream, job.view, job.activity, job.window);
                if let Err(e) = &result {
                    warn!("batch item {} failed: {}", i, e);
                }
                result
            })
            .collect()
    }

    /// Parse and analyze a JSON document, returning report JSON
    pub fn analyze_json(
        &self,
        json: &str,
        view: CameraView,
        activity: Activity,
        window: Option<TimeWindow>,
    ) -> Result<String, GaitError> {
        let stream = LandmarkStream::from_json(json)?;
        self.analyze(&stream, view, activity, window)?.to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::JointClassification;
    use crate::types::{FrameSample, Landmark, LandmarkIndex, LandmarkSet};
    use std::f64::consts::PI;

    /// Standing subject whose knees flex `knee_deg` degrees
    fn pose(knee_deg: f64) -> LandmarkSet {
        let theta = knee_deg.to_radians();
        let mut set = LandmarkSet::new();
        for (shoulder, hip, knee, ankle, foot, x) in [
            (
                LandmarkIndex::LeftShoulder,
                LandmarkIndex::LeftHip,
                LandmarkIndex::LeftKnee,
                LandmarkIndex::LeftAnkle,
                LandmarkIndex::LeftFootIndex,
                0.45,
            ),
            (
                LandmarkIndex::RightShoulder,
                LandmarkIndex::RightHip,
                LandmarkIndex::RightKnee,
                LandmarkIndex::RightAnkle,
                LandmarkIndex::RightFootIndex,
                0.55,
            ),
        ] {
            let ankle_pos = Landmark::new(x + 0.2 * theta.sin(), 0.6 + 0.2 * theta.cos());
            set.insert(shoulder, Landmark::new(x, 0.1));
            set.insert(hip, Landmark::new(x, 0.4));
            set.insert(knee, Landmark::new(x, 0.6));
            set.insert(ankle, ankle_pos);
            set.insert(foot, Landmark::new(ankle_pos.x + 0.08, ankle_pos.y));
        }
        set
    }

    fn walking_stream(secs: f64) -> LandmarkStream {
        let fps = 30.0;
        let frames = (0..(secs * fps) as usize)
            .map(|i| {
                let t = i as f64 / fps;
                FrameSample {
                    frame_index: i as u64,
                    timestamp: t,
                    landmarks: Some(pose(60.0 + 10.0 * (2.0 * PI * 1.5 * t).sin())),
                }
            })
            .collect();
        LandmarkStream::new(fps, frames)
    }

    #[test]
    fn test_analyze_knee_oscillation() {
        let report = GaitAnalyzer::new()
            .analyze(&walking_stream(10.0), CameraView::Side, Activity::Walking, None)
            .unwrap();

        let knee = report.joint(Joint::LeftKnee).unwrap();
        assert!(knee.peaks >= 12);
        let rom = knee.rom.unwrap();
        assert!((rom - 20.0).abs() < 2.0, "knee rom {rom}");
        assert_eq!(report.joints.len(), 7);
        assert_eq!(report.rom_table.len(), 7);
        assert_eq!(report.quality.frames_analyzed, 300);
    }

    #[test]
    fn test_still_joints_are_not_computed() {
        let report = GaitAnalyzer::new()
            .analyze(&walking_stream(4.0), CameraView::Side, Activity::Walking, None)
            .unwrap();

        // hips never move
        let hip = report.joint(Joint::LeftHip).unwrap();
        assert_eq!(hip.classification, JointClassification::NotComputed);
        assert!(report.quality.flags.contains(&QualityFlag::InsufficientCycles));

        // spine span is always measurable
        let spine = report.joint(Joint::SpineSegment).unwrap();
        assert_eq!(spine.rom, Some(0.0));
        assert_eq!(spine.classification, JointClassification::SweetSpot);
    }

    #[test]
    fn test_window_crop() {
        let window = TimeWindow::new(2.0, 6.0).unwrap();
        let report = GaitAnalyzer::new()
            .analyze(
                &walking_stream(10.0),
                CameraView::Side,
                Activity::Walking,
                Some(window),
            )
            .unwrap();
        assert_eq!(report.quality.frames_analyzed, 121);
        assert!(report.quality.flags.contains(&QualityFlag::WindowCropped));
        assert_eq!(report.provenance.window, Some(window));

        let empty = TimeWindow::new(50.0, 60.0).unwrap();
        assert!(matches!(
            GaitAnalyzer::new().analyze(
                &walking_stream(10.0),
                CameraView::Side,
                Activity::Walking,
                Some(empty)
            ),
            Err(GaitError::InvalidWindow(_))
        ));
    }

    #[test]
    fn test_missing_bands() {
        let analyzer = GaitAnalyzer::new().with_bands(ReferenceBandSet::empty());
        assert!(matches!(
            analyzer.analyze(&walking_stream(2.0), CameraView::Back, Activity::Running, None),
            Err(GaitError::MissingBands { .. })
        ));
    }

    #[test]
    fn test_batch_isolates_failures() {
        let jobs = vec![
            AnalysisJob {
                stream: LandmarkStream::new(30.0, Vec::new()),
                view: CameraView::Side,
                activity: Activity::Walking,
                window: None,
            },
            AnalysisJob {
                stream: walking_stream(5.0),
                view: CameraView::Side,
                activity: Activity::Walking,
                window: None,
            },
        ];
        let results = GaitAnalyzer::new().analyze_batch(&jobs);
        assert!(matches!(results[0], Err(GaitError::NoFrames)));
        assert!(results[1].is_ok());
    }

    #[test]
    fn test_analyze_json_roundtrip() {
        let stream = walking_stream(3.0);
        let json = serde_json::to_string(&stream).unwrap();
        let out = analyze_json(&json, CameraView::Side, Activity::Walking).unwrap();
        let report: GaitReport = serde_json::from_str(&out).unwrap();
        assert_eq!(report.provenance.fps, 30.0);
        assert_eq!(report.training.len(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = AnalysisConfig::default();
        config.filter.order = 0;
        assert!(GaitAnalyzer::with_config(config).is_err());
    }
}
