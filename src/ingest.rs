//! Landmark stream ingest
//!
//! Parses landmark documents produced by an external pose estimator, checks
//! them for corruption, and selects the frames that reach the angle extractor:
//! - centred crop of long recordings
//! - fixed-stride subsampling
//! - removal of frames without a complete landmark set
//!
//! Two document forms are accepted. The JSON form carries the frame rate:
//!
//! ```json
//! { "fps": 30.0, "source_id": "clip-01", "frames": [
//!     { "frame_index": 0, "timestamp": 0.0, "landmarks": { "left_hip": { "x": 0.48, "y": 0.52 } } },
//!     { "frame_index": 1, "timestamp": 0.033, "landmarks": null }
//! ] }
//! ```
//!
//! The NDJSON form has one frame per line and takes the frame rate from the
//! caller. `landmarks` may also be the pose model's 33-entry array.

use crate::config::IngestConfig;
use crate::error::GaitError;
use crate::types::{FrameSample, Landmark, LandmarkIndex, LandmarkSet, QualityFlag};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current landmark stream schema
pub const STREAM_SCHEMA: &str = "gait.landmark_stream.v1";

/// Landmark payload as emitted by pose sources
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawLandmarks {
    /// Full model output indexed by landmark number; `null` for missing points
    Indexed(Vec<Option<Landmark>>),
    /// Landmarks keyed by snake_case name; unknown names and `null` points are ignored
    Named(BTreeMap<String, Option<Landmark>>),
}

impl RawLandmarks {
    fn into_set(self) -> LandmarkSet {
        match self {
            RawLandmarks::Indexed(points) => points
                .into_iter()
                .enumerate()
                .filter_map(|(i, p)| Some((LandmarkIndex::from_index(i)?, p?)))
                .collect(),
            RawLandmarks::Named(points) => points
                .into_iter()
                .filter_map(|(name, p)| Some((LandmarkIndex::from_name(&name)?, p?)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawFrame {
    frame_index: u64,
    timestamp: f64,
    #[serde(default)]
    landmarks: Option<RawLandmarks>,
}

impl From<RawFrame> for FrameSample {
    fn from(raw: RawFrame) -> Self {
        FrameSample {
            frame_index: raw.frame_index,
            timestamp: raw.timestamp,
            landmarks: raw.landmarks.map(RawLandmarks::into_set),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawStream {
    #[serde(default)]
    schema_version: Option<String>,
    #[serde(default)]
    source_id: Option<String>,
    fps: f64,
    frames: Vec<RawFrame>,
}

/// Ordered frames from one video at a known frame rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkStream {
    pub schema_version: String,
    pub source_id: Option<String>,
    pub fps: f64,
    pub frames: Vec<FrameSample>,
}

impl LandmarkStream {
    pub fn new(fps: f64, frames: Vec<FrameSample>) -> Self {
        Self {
            schema_version: STREAM_SCHEMA.to_string(),
            source_id: None,
            fps,
            frames,
        }
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    /// Parse the JSON document form
    pub fn from_json(json: &str) -> Result<Self, GaitError> {
        let raw: RawStream = serde_json::from_str(json)?;
        if let Some(version) = &raw.schema_version {
            if version != STREAM_SCHEMA {
                return Err(GaitError::CorruptSource(format!(
                    "unsupported schema version {version}, expected {STREAM_SCHEMA}"
                )));
            }
        }
        Ok(Self {
            schema_version: STREAM_SCHEMA.to_string(),
            source_id: raw.source_id,
            fps: raw.fps,
            frames: raw.frames.into_iter().map(FrameSample::from).collect(),
        })
    }

    /// Parse the NDJSON form (one frame per line)
    pub fn from_ndjson(ndjson: &str, fps: f64) -> Result<Self, GaitError> {
        let mut frames = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawFrame>(trimmed) {
                Ok(frame) => frames.push(frame.into()),
                Err(e) => {
                    return Err(GaitError::CorruptSource(format!(
                        "failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(Self::new(fps, frames))
    }

    /// Seconds covered by the stream
    pub fn duration(&self) -> f64 {
        match (self.frames.first(), self.frames.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp + 1.0 / self.fps,
            _ => 0.0,
        }
    }

    /// Structural checks; returns every problem found
    pub fn validate(&self) -> Vec<FrameIssue> {
        let mut issues = Vec::new();
        let mut prev: Option<&FrameSample> = None;

        for (position, frame) in self.frames.iter().enumerate() {
            let mut push = |error: ValidationError| {
                issues.push(FrameIssue {
                    position,
                    frame_index: frame.frame_index,
                    error,
                })
            };

            if !frame.timestamp.is_finite() {
                push(ValidationError::NonFiniteTimestamp);
            }
            if let Some(p) = prev {
                if frame.frame_index <= p.frame_index {
                    push(ValidationError::FrameIndexNotIncreasing {
                        previous: p.frame_index,
                        current: frame.frame_index,
                    });
                }
                if frame.timestamp < p.timestamp {
                    push(ValidationError::TimestampDecreasing {
                        previous: p.timestamp,
                        current: frame.timestamp,
                    });
                }
            }
            if let Some(set) = &frame.landmarks {
                if let Some((idx, _)) = set.iter().find(|(_, l)| !l.is_finite()) {
                    push(ValidationError::NonFiniteCoordinate(idx.as_str().to_string()));
                }
            }
            prev = Some(frame);
        }
        issues
    }

    /// Per-stream counts for the validate command
    pub fn summary(&self) -> StreamSummary {
        let mut summary = StreamSummary {
            total_frames: self.frames.len(),
            detected_frames: 0,
            undetected_frames: 0,
            incomplete_frames: 0,
            duration_secs: self.duration(),
            issues: self.validate(),
        };
        for frame in &self.frames {
            match &frame.landmarks {
                None => summary.undetected_frames += 1,
                Some(set) if !set.is_complete() => summary.incomplete_frames += 1,
                Some(_) => summary.detected_frames += 1,
            }
        }
        summary
    }
}

/// Structural problems that make a landmark source unusable
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize)]
pub enum ValidationError {
    #[error("frame index not increasing: {previous} then {current}")]
    FrameIndexNotIncreasing { previous: u64, current: u64 },

    #[error("timestamp decreasing: {previous} then {current}")]
    TimestampDecreasing { previous: f64, current: f64 },

    #[error("timestamp is not finite")]
    NonFiniteTimestamp,

    #[error("non-finite coordinate for {0}")]
    NonFiniteCoordinate(String),
}

/// A validation problem located in the stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameIssue {
    pub position: usize,
    pub frame_index: u64,
    pub error: ValidationError,
}

/// Counts reported by `LandmarkStream::summary`
#[derive(Debug, Clone, Serialize)]
pub struct StreamSummary {
    pub total_frames: usize,
    pub detected_frames: usize,
    pub undetected_frames: usize,
    pub incomplete_frames: usize,
    pub duration_secs: f64,
    pub issues: Vec<FrameIssue>,
}

/// A frame with a complete landmark set, time-rebased to the analysed span
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFrame {
    pub frame_index: u64,
    /// Seconds from the first analysed frame
    pub time: f64,
    pub landmarks: LandmarkSet,
}

/// Frames ready for angle extraction
#[derive(Debug, Clone)]
pub struct IngestedStream {
    pub source_id: Option<String>,
    pub fps: f64,
    pub stride: usize,
    /// Samples per second after subsampling
    pub sample_rate: f64,
    pub frames_total: usize,
    /// Frames left after cropping and subsampling
    pub frames_considered: usize,
    /// Considered frames without a complete landmark set
    pub frames_dropped: usize,
    pub frames: Vec<DetectedFrame>,
    pub flags: Vec<QualityFlag>,
}

/// Stage 1: landmark stream to detected frames
pub struct Ingestor;

impl Ingestor {
    pub fn ingest(stream: &LandmarkStream, config: &IngestConfig) -> Result<IngestedStream, GaitError> {
        if !(stream.fps.is_finite() && stream.fps > 0.0) {
            return Err(GaitError::InvalidFrameRate(stream.fps));
        }
        if stream.frames.is_empty() {
            return Err(GaitError::NoFrames);
        }
        if let Some(issue) = stream.validate().into_iter().next() {
            return Err(GaitError::CorruptSource(format!(
                "frame {} (position {}): {}",
                issue.frame_index, issue.position, issue.error
            )));
        }

        let mut flags = Vec::new();
        let stride = config.stride.max(1);

        let cropped = match config.max_duration_secs {
            Some(max) if stream.duration() > max => {
                flags.push(QualityFlag::DurationCropped);
                centred_frames(&stream.frames, max)
            }
            _ => &stream.frames[..],
        };

        if stride > 1 {
            flags.push(QualityFlag::Subsampled);
        }
        let considered: Vec<&FrameSample> = cropped.iter().step_by(stride).collect();
        let origin = considered.first().map(|f| f.timestamp).unwrap_or(0.0);

        let mut frames = Vec::with_capacity(considered.len());
        let mut dropped = 0usize;
        for frame in &considered {
            match &frame.landmarks {
                Some(set) if set.is_complete() => frames.push(DetectedFrame {
                    frame_index: frame.frame_index,
                    time: frame.timestamp - origin,
                    landmarks: set.clone(),
                }),
                _ => dropped += 1,
            }
        }

        if frames.is_empty() {
            return Err(GaitError::NoDetections(dropped));
        }
        if dropped > 0 {
            warn!(
                "{} of {} frames had no complete landmark set and were dropped",
                dropped,
                considered.len()
            );
            flags.push(QualityFlag::DetectionGaps);
        }
        debug!(
            "ingested {} frames ({} considered, stride {}, {:.2} Hz)",
            frames.len(),
            considered.len(),
            stride,
            stream.fps / stride as f64
        );

        Ok(IngestedStream {
            source_id: stream.source_id.clone(),
            fps: stream.fps,
            stride,
            sample_rate: stream.fps / stride as f64,
            frames_total: stream.frames.len(),
            frames_considered: considered.len(),
            frames_dropped: dropped,
            frames,
            flags,
        })
    }
}

/// Frames in `[centre - max_secs / 2, centre + max_secs / 2)`
fn centred_frames(frames: &[FrameSample], max_secs: f64) -> &[FrameSample] {
    let (first, last) = match (frames.first(), frames.last()) {
        (Some(f), Some(l)) => (f.timestamp, l.timestamp),
        _ => return frames,
    };
    let centre = (first + last) / 2.0;
    let half = max_secs / 2.0;
    let start = frames.partition_point(|f| f.timestamp < centre - half);
    let end = frames.partition_point(|f| f.timestamp < centre + half);
    &frames[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_set() -> LandmarkSet {
        LandmarkIndex::REQUIRED
            .iter()
            .enumerate()
            .map(|(i, &idx)| (idx, Landmark::new(0.1 * i as f64, 0.05 * i as f64)))
            .collect()
    }

    fn frames(n: usize, fps: f64, gaps: &[usize]) -> Vec<FrameSample> {
        (0..n)
            .map(|i| FrameSample {
                frame_index: i as u64,
                timestamp: i as f64 / fps,
                landmarks: if gaps.contains(&i) { None } else { Some(complete_set()) },
            })
            .collect()
    }

    fn no_crop() -> IngestConfig {
        IngestConfig {
            stride: 1,
            max_duration_secs: None,
        }
    }

    #[test]
    fn test_parse_named_landmarks() {
        let json = r#"{
            "fps": 30.0,
            "source_id": "clip",
            "frames": [
                {"frame_index": 0, "timestamp": 0.0, "landmarks": {"left_hip": {"x": 0.4, "y": 0.5}, "nose": {"x": 0.5, "y": 0.1}}},
                {"frame_index": 1, "timestamp": 0.033, "landmarks": null},
                {"frame_index": 2, "timestamp": 0.066}
            ]
        }"#;
        let stream = LandmarkStream::from_json(json).unwrap();
        assert_eq!(stream.source_id.as_deref(), Some("clip"));
        assert_eq!(stream.frames.len(), 3);

        let set = stream.frames[0].landmarks.as_ref().unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(LandmarkIndex::LeftHip), Some(&Landmark::new(0.4, 0.5)));
        assert!(stream.frames[1].landmarks.is_none());
        assert!(stream.frames[2].landmarks.is_none());
    }

    #[test]
    fn test_null_named_landmark_is_a_gap() {
        let json = r#"{
            "fps": 30.0,
            "frames": [
                {"frame_index": 0, "timestamp": 0.0, "landmarks": {"left_hip": null, "nose": {"x": 0.5, "y": 0.1}}}
            ]
        }"#;
        let stream = LandmarkStream::from_json(json).unwrap();
        let set = stream.frames[0].landmarks.as_ref().unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.get(LandmarkIndex::LeftHip).is_none());
        assert!(matches!(
            Ingestor::ingest(&stream, &no_crop()),
            Err(GaitError::NoDetections(1))
        ));
    }

    #[test]
    fn test_parse_indexed_landmarks() {
        let mut points = vec![serde_json::Value::Null; 33];
        points[23] = serde_json::json!({"x": 0.45, "y": 0.55});
        points[31] = serde_json::json!({"x": 0.40, "y": 0.95});
        let line = serde_json::json!({"frame_index": 7, "timestamp": 0.25, "landmarks": points});

        let stream = LandmarkStream::from_ndjson(&line.to_string(), 30.0).unwrap();
        let set = stream.frames[0].landmarks.as_ref().unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(LandmarkIndex::LeftHip), Some(&Landmark::new(0.45, 0.55)));
        assert_eq!(
            set.get(LandmarkIndex::LeftFootIndex),
            Some(&Landmark::new(0.40, 0.95))
        );
    }

    #[test]
    fn test_ndjson_reports_line_number() {
        let ndjson = "{\"frame_index\": 0, \"timestamp\": 0.0}\n\nnot json\n";
        let err = LandmarkStream::from_ndjson(ndjson, 30.0).unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_wrong_schema_version_rejected() {
        let json = r#"{"schema_version": "other.v2", "fps": 30.0, "frames": []}"#;
        assert!(matches!(
            LandmarkStream::from_json(json),
            Err(GaitError::CorruptSource(_))
        ));
    }

    #[test]
    fn test_empty_stream_is_ingest_failure() {
        let stream = LandmarkStream::new(30.0, Vec::new());
        assert!(matches!(
            Ingestor::ingest(&stream, &no_crop()),
            Err(GaitError::NoFrames)
        ));
    }

    #[test]
    fn test_all_undetected_is_ingest_failure() {
        let all: Vec<usize> = (0..10).collect();
        let stream = LandmarkStream::new(30.0, frames(10, 30.0, &all));
        assert!(matches!(
            Ingestor::ingest(&stream, &no_crop()),
            Err(GaitError::NoDetections(10))
        ));
    }

    #[test]
    fn test_detection_gaps_dropped_and_flagged() {
        let stream = LandmarkStream::new(30.0, frames(10, 30.0, &[2, 5]));
        let ingested = Ingestor::ingest(&stream, &no_crop()).unwrap();
        assert_eq!(ingested.frames.len(), 8);
        assert_eq!(ingested.frames_dropped, 2);
        assert!(ingested.flags.contains(&QualityFlag::DetectionGaps));
        assert!(ingested.frames.iter().all(|f| f.frame_index != 2 && f.frame_index != 5));
    }

    #[test]
    fn test_incomplete_landmark_set_is_a_gap() {
        let mut all = frames(4, 30.0, &[]);
        let mut partial = LandmarkSet::new();
        partial.insert(LandmarkIndex::LeftHip, Landmark::new(0.5, 0.5));
        all[1].landmarks = Some(partial);

        let ingested = Ingestor::ingest(&LandmarkStream::new(30.0, all), &no_crop()).unwrap();
        assert_eq!(ingested.frames.len(), 3);
        assert_eq!(ingested.frames_dropped, 1);
    }

    #[test]
    fn test_stride_subsampling() {
        let stream = LandmarkStream::new(30.0, frames(30, 30.0, &[]));
        let config = IngestConfig {
            stride: 3,
            max_duration_secs: None,
        };
        let ingested = Ingestor::ingest(&stream, &config).unwrap();
        assert_eq!(ingested.frames.len(), 10);
        assert_eq!(ingested.sample_rate, 10.0);
        assert_eq!(ingested.frames[1].frame_index, 3);
        assert!(ingested.flags.contains(&QualityFlag::Subsampled));
    }

    #[test]
    fn test_long_stream_centre_crop() {
        // 20 s at 10 fps, keep the middle 12 s
        let stream = LandmarkStream::new(10.0, frames(200, 10.0, &[]));
        let config = IngestConfig {
            stride: 1,
            max_duration_secs: Some(12.0),
        };
        let ingested = Ingestor::ingest(&stream, &config).unwrap();
        assert!(ingested.flags.contains(&QualityFlag::DurationCropped));
        assert_eq!(ingested.frames.first().unwrap().frame_index, 40);
        assert_eq!(ingested.frames.len(), 120);
        assert_eq!(ingested.frames[0].time, 0.0);
    }

    #[test]
    fn test_centre_crop_excludes_upper_bound() {
        // 0..=20 s at 1 fps; the 12 s window [4, 16) lands exactly on frames
        let stream = LandmarkStream::new(1.0, frames(21, 1.0, &[]));
        let config = IngestConfig {
            stride: 1,
            max_duration_secs: Some(12.0),
        };
        let ingested = Ingestor::ingest(&stream, &config).unwrap();
        assert_eq!(ingested.frames.len(), 12);
        assert_eq!(ingested.frames.first().unwrap().frame_index, 4);
        assert_eq!(ingested.frames.last().unwrap().frame_index, 15);
    }

    #[test]
    fn test_corrupt_ordering_is_fatal() {
        let mut all = frames(5, 30.0, &[]);
        all.swap(1, 3);
        let stream = LandmarkStream::new(30.0, all);
        assert!(!stream.validate().is_empty());
        assert!(matches!(
            Ingestor::ingest(&stream, &no_crop()),
            Err(GaitError::CorruptSource(_))
        ));
    }

    #[test]
    fn test_invalid_frame_rate() {
        let stream = LandmarkStream::new(0.0, frames(3, 30.0, &[]));
        assert!(matches!(
            Ingestor::ingest(&stream, &no_crop()),
            Err(GaitError::InvalidFrameRate(_))
        ));
    }

    #[test]
    fn test_summary_counts() {
        let mut all = frames(6, 30.0, &[0, 1]);
        all[2].landmarks = Some(LandmarkSet::new());
        let summary = LandmarkStream::new(30.0, all).summary();
        assert_eq!(summary.total_frames, 6);
        assert_eq!(summary.undetected_frames, 2);
        assert_eq!(summary.incomplete_frames, 1);
        assert_eq!(summary.detected_frames, 3);
        assert!(summary.issues.is_empty());
    }
}
