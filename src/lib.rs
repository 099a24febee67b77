//! Gait Kinematics - joint-angle kinematics and gait-quality scoring
//!
//! Turns per-frame 2D pose landmarks from a walking, running or pickup-pen video
//! into a gait report through a deterministic pipeline: ingest → joint angles
//! → Butterworth low-pass → cycle detection → ROM, classification, asymmetry and
//! recommendations → report.
//!
//! ## Quick start
//!
//! ```ignore
//! use gait_kinematics::{Activity, CameraView, GaitAnalyzer, LandmarkStream};
//!
//! let stream = LandmarkStream::from_json(&json)?;
//! let report = GaitAnalyzer::new().analyze(&stream, CameraView::Side, Activity::Walking, None)?;
//! println!("{}", report.to_json_pretty()?);
//! ```

pub mod angles;
pub mod asymmetry;
pub mod bands;
pub mod config;
pub mod cycles;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod narrative;
pub mod pipeline;
pub mod recommend;
pub mod rom;
pub mod summary;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use bands::{Classification, ReferenceBandSet};
pub use config::AnalysisConfig;
pub use error::GaitError;
pub use ingest::LandmarkStream;
pub use pipeline::{analyze_json, AnalysisJob, GaitAnalyzer};
pub use summary::GaitReport;
pub use types::{Activity, CameraView, Joint, JointGroup, TimeWindow};

/// Library version embedded in every report
pub const GAIT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "gait-kinematics";
