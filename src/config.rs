//! Analysis configuration
//!
//! Every tunable of the pipeline lives here. Defaults reproduce the clinical
//! protocol: 4th-order 6 Hz Butterworth, 4° prominence, half-second peak
//! spacing and a 10° asymmetry flag.

use crate::bands::JointBands;
use crate::error::GaitError;
use crate::types::{Activity, CameraView, Joint, JointGroup};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Initial filter state at the first sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStart {
    /// As if the first sample had been held forever; no start-up transient
    #[default]
    SteadyState,
    /// All-zero state; the series rises from 0 through the filter's step response
    Zero,
}

/// Low-pass filter parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Butterworth order
    pub order: usize,
    /// Cutoff frequency (Hz), normalised against the source frame rate
    pub cutoff_hz: f64,
    pub start: FilterStart,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            order: 4,
            cutoff_hz: 6.0,
            start: FilterStart::SteadyState,
        }
    }
}

/// Peak/trough detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Minimum prominence (degrees)
    pub prominence: f64,
    /// Minimum peak spacing as a fraction of the sample rate
    pub distance_factor: f64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            prominence: 4.0,
            distance_factor: 0.5,
        }
    }
}

/// Frame selection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Keep every n-th frame
    pub stride: usize,
    /// Analyse only the centred part of longer streams
    pub max_duration_secs: Option<f64>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            stride: 1,
            max_duration_secs: Some(12.0),
        }
    }
}

/// How a joint's range of motion is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RomMethod {
    /// Mean of peaks minus mean of troughs
    PeakTroughMean,
    /// Raw max minus min of the filtered series.
    ///
    /// Sensitive to the filter's start-up: with `FilterStart::Zero` the span
    /// includes the rise from 0.
    Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RomConfig {
    pub spine_method: RomMethod,
    pub limb_method: RomMethod,
}

impl Default for RomConfig {
    fn default() -> Self {
        Self {
            spine_method: RomMethod::Span,
            limb_method: RomMethod::PeakTroughMean,
        }
    }
}

/// Replacement bands for one (view, activity, group) cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandOverride {
    pub view: CameraView,
    pub activity: Activity,
    pub group: JointGroup,
    pub bands: JointBands,
}

/// Complete analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub filter: FilterConfig,
    pub cycles: CycleConfig,
    pub ingest: IngestConfig,
    pub rom: RomConfig,
    /// Absolute right-left difference that flags asymmetry (degrees)
    pub asymmetry_threshold_deg: f64,
    /// Training exercises kept in the report
    pub max_exercises: usize,
    /// Emit raw and filtered series in the report
    pub include_series: bool,
    /// Reference band overrides
    pub bands: Vec<BandOverride>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            cycles: CycleConfig::default(),
            ingest: IngestConfig::default(),
            rom: RomConfig::default(),
            asymmetry_threshold_deg: 10.0,
            max_exercises: 1,
            include_series: false,
            bands: Vec::new(),
        }
    }
}

impl AnalysisConfig {
    /// Parse and validate a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self, GaitError> {
        let config: AnalysisConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, GaitError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            GaitError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> Result<String, GaitError> {
        serde_json::to_string_pretty(self).map_err(GaitError::JsonError)
    }

    pub fn validate(&self) -> Result<(), GaitError> {
        if self.filter.order == 0 {
            return Err(GaitError::InvalidConfig("filter order must be at least 1".into()));
        }
        if !(self.filter.cutoff_hz.is_finite() && self.filter.cutoff_hz > 0.0) {
            return Err(GaitError::InvalidConfig(format!(
                "filter cutoff must be positive, got {}",
                self.filter.cutoff_hz
            )));
        }
        if !(self.cycles.prominence.is_finite() && self.cycles.prominence >= 0.0) {
            return Err(GaitError::InvalidConfig(format!(
                "prominence must be non-negative, got {}",
                self.cycles.prominence
            )));
        }
        if !(self.cycles.distance_factor.is_finite() && self.cycles.distance_factor > 0.0) {
            return Err(GaitError::InvalidConfig(format!(
                "distance factor must be positive, got {}",
                self.cycles.distance_factor
            )));
        }
        if self.ingest.stride == 0 {
            return Err(GaitError::InvalidConfig("stride must be at least 1".into()));
        }
        if let Some(max) = self.ingest.max_duration_secs {
            if !(max.is_finite() && max > 0.0) {
                return Err(GaitError::InvalidConfig(format!(
                    "max duration must be positive, got {max}"
                )));
            }
        }
        if self.max_exercises == 0 {
            return Err(GaitError::InvalidConfig(
                "max_exercises must be at least 1".into(),
            ));
        }
        if !(self.asymmetry_threshold_deg.is_finite() && self.asymmetry_threshold_deg >= 0.0) {
            return Err(GaitError::InvalidConfig(format!(
                "asymmetry threshold must be non-negative, got {}",
                self.asymmetry_threshold_deg
            )));
        }
        for o in &self.bands {
            o.bands.validate().map_err(|msg| {
                GaitError::InvalidConfig(format!(
                    "bands for {}/{}/{}: {msg}",
                    o.view,
                    o.activity,
                    o.group.as_str()
                ))
            })?;
        }
        Ok(())
    }

    pub fn rom_method(&self, joint: Joint) -> RomMethod {
        match joint.group() {
            JointGroup::Spine => self.rom.spine_method,
            _ => self.rom.limb_method,
        }
    }
}
