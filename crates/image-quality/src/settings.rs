//! Tunable configuration for the quality engine

use crate::error::{QualityError, Result};
use image::Rgb;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which analyzers run, how much each contributes and where the label
/// boundaries sit. Thresholds are on the 0-100 quality scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualitySettings {
    pub detect_blur: bool,
    pub detect_noise: bool,
    pub detect_compression: bool,
    pub detect_overexposure: bool,
    pub blur_weight: f64,
    pub noise_weight: f64,
    pub compression_weight: f64,
    /// Multiplier for the exposure term. 100 reproduces the historical fixed
    /// multiplier, so older settings files score identically.
    pub exposure_weight: f64,
    pub rejected_threshold: i32,
    pub accepted_threshold: i32,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            detect_blur: true,
            detect_noise: true,
            detect_compression: true,
            detect_overexposure: true,
            blur_weight: 100.0,
            noise_weight: 100.0,
            compression_weight: 100.0,
            exposure_weight: 100.0,
            rejected_threshold: 10,
            accepted_threshold: 60,
        }
    }
}

impl QualitySettings {
    /// Settings with every analyzer switched off
    pub fn all_disabled() -> Self {
        Self {
            detect_blur: false,
            detect_noise: false,
            detect_compression: false,
            detect_overexposure: false,
            ..Self::default()
        }
    }

    pub fn any_detector_enabled(&self) -> bool {
        self.detect_blur || self.detect_noise || self.detect_compression || self.detect_overexposure
    }

    /// Check the threshold ordering the classifier relies on
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("rejected_threshold", self.rejected_threshold),
            ("accepted_threshold", self.accepted_threshold),
        ] {
            if !(0..=100).contains(&value) {
                return Err(QualityError::InvalidSettings(format!(
                    "{} must be within 0-100, got {}",
                    name, value
                )));
            }
        }

        if self.rejected_threshold >= self.accepted_threshold {
            return Err(QualityError::InvalidSettings(format!(
                "rejected_threshold ({}) must be lower than accepted_threshold ({})",
                self.rejected_threshold, self.accepted_threshold
            )));
        }

        for (name, value) in [
            ("blur_weight", self.blur_weight),
            ("noise_weight", self.noise_weight),
            ("compression_weight", self.compression_weight),
            ("exposure_weight", self.exposure_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(QualityError::InvalidSettings(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }

    /// Load settings from a JSON file; missing keys take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Configuration handed to the pure-colour mask generator
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureMaskSettings {
    pub under_exposure_indicator: bool,
    pub over_exposure_indicator: bool,
    /// Strict mode: every colour channel must be clipped, not just one
    pub pure_clipping: bool,
    pub under_exposure_percent: f64,
    pub over_exposure_percent: f64,
    pub under_exposure_color: Rgb<u8>,
    pub over_exposure_color: Rgb<u8>,
}

impl Default for ExposureMaskSettings {
    fn default() -> Self {
        Self {
            under_exposure_indicator: true,
            over_exposure_indicator: true,
            pure_clipping: true,
            under_exposure_percent: 5.0,
            over_exposure_percent: 5.0,
            under_exposure_color: Rgb([0, 0, 0]),
            over_exposure_color: Rgb([255, 255, 255]),
        }
    }
}
