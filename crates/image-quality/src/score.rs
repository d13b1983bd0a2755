//! Normalisation, weighting and pick-label classification
//!
//! Raw detector outputs are mapped onto a 0-100 scale, weighted and summed
//! into one quality value, which is then bucketed into a [`PickLabel`].

use crate::context::{RawScores, RunState};
use crate::settings::QualitySettings;
use serde::{Deserialize, Serialize};

/// Laplacian responses are scored against the full signed 16-bit range
pub const LAPLACIAN_RANGE: f64 = 32767.0;
/// Artifact counts are scored against a 1024-pixel reference image
pub const COMPRESSION_REFERENCE: f64 = 1024.0;

/// Triage verdict for one photograph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PickLabel {
    NoPick,
    Rejected,
    Pending,
    Accepted,
}

impl std::fmt::Display for PickLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PickLabel::NoPick => write!(f, "no-pick"),
            PickLabel::Rejected => write!(f, "rejected"),
            PickLabel::Pending => write!(f, "pending"),
            PickLabel::Accepted => write!(f, "accepted"),
        }
    }
}

impl std::str::FromStr for PickLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "no-pick" | "nopick" | "none" => Ok(PickLabel::NoPick),
            "rejected" => Ok(PickLabel::Rejected),
            "pending" => Ok(PickLabel::Pending),
            "accepted" => Ok(PickLabel::Accepted),
            _ => Err(format!(
                "Invalid pick label: {}. Valid options: no-pick, rejected, pending, accepted",
                s
            )),
        }
    }
}

/// Detector scores on the common 0-100 scale. Disabled detectors score 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedScores {
    pub blur: f64,
    pub noise: f64,
    pub compression: f64,
    pub over_exposure: f64,
}

impl NormalizedScores {
    pub fn from_raw(raw: &RawScores, settings: &QualitySettings) -> Self {
        let raw = raw.sanitized();
        let mut scores = Self::default();

        if settings.detect_blur {
            scores.blur = raw.blur_ratio * 100.0 + (raw.blur_max / LAPLACIAN_RANGE) * 100.0;
        }
        if settings.detect_noise {
            scores.noise = raw.noise * 100.0;
        }
        if settings.detect_compression {
            scores.compression = (raw.compression_count as f64 / COMPRESSION_REFERENCE) * 100.0;
        }
        if settings.detect_overexposure {
            scores.over_exposure = 100.0 - raw.over_exposure * 100.0;
        }

        scores
    }

    /// Weighted sum on the 0-100 quality scale
    pub fn combine(&self, settings: &QualitySettings) -> f64 {
        (self.blur * settings.blur_weight
            + self.noise * settings.noise_weight
            + self.compression * settings.compression_weight
            + self.over_exposure * settings.exposure_weight)
            / 100.0
    }
}

/// Bucket a final quality value.
///
/// Exactly 0.0 means no detector produced data. Otherwise the truncated value
/// `q` is Rejected below `rejected_threshold`, Pending below
/// `accepted_threshold`, and Accepted from there up. `q == rejected_threshold`
/// is Pending.
pub fn classify(final_quality: f64, settings: &QualitySettings) -> PickLabel {
    if final_quality == 0.0 || !final_quality.is_finite() {
        return PickLabel::NoPick;
    }

    let q = final_quality.floor() as i64;
    if q < settings.rejected_threshold as i64 {
        PickLabel::Rejected
    } else if q < settings.accepted_threshold as i64 {
        PickLabel::Pending
    } else {
        PickLabel::Accepted
    }
}

/// Everything one assessment produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub raw: RawScores,
    pub normalized: NormalizedScores,
    pub final_quality: f64,
    pub label: PickLabel,
    pub state: RunState,
}

impl QualityReport {
    pub fn from_raw(raw: RawScores, settings: &QualitySettings) -> Self {
        let normalized = NormalizedScores::from_raw(&raw, settings);
        let final_quality = normalized.combine(settings);
        let label = classify(final_quality, settings);

        Self {
            raw: raw.sanitized(),
            normalized,
            final_quality,
            label,
            state: RunState::Completed,
        }
    }

    /// Plain-text diagnostic trace, one `metric=value` line per metric
    pub fn trace_lines(&self) -> Vec<String> {
        vec![
            format!("blur_ratio={:.6}", self.raw.blur_ratio),
            format!("blur_max={:.1}", self.raw.blur_max),
            format!("noise={:.6}", self.raw.noise),
            format!("compression_count={}", self.raw.compression_count),
            format!("over_exposure={:.6}", self.raw.over_exposure),
            format!("under_exposure={:.6}", self.raw.under_exposure),
            format!("final_blur={:.3}", self.normalized.blur),
            format!("final_noise={:.3}", self.normalized.noise),
            format!("final_compression={:.3}", self.normalized.compression),
            format!("final_over_exposure={:.3}", self.normalized.over_exposure),
            format!("final_quality={:.3}", self.final_quality),
            format!("label={}", self.label),
        ]
    }

    /// Order two reports by quality, breaking ties on the blur score
    pub fn compare(&self, other: &Self) -> std::cmp::Ordering {
        match self.final_quality.partial_cmp(&other.final_quality).unwrap_or(std::cmp::Ordering::Equal) {
            std::cmp::Ordering::Equal => self
                .normalized
                .blur
                .partial_cmp(&other.normalized.blur)
                .unwrap_or(std::cmp::Ordering::Equal),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds(rejected: i32, accepted: i32) -> QualitySettings {
        QualitySettings {
            rejected_threshold: rejected,
            accepted_threshold: accepted,
            ..QualitySettings::default()
        }
    }

    #[test]
    fn test_label_parsing_and_display() {
        assert_eq!("accepted".parse::<PickLabel>().unwrap(), PickLabel::Accepted);
        assert_eq!("REJECTED".parse::<PickLabel>().unwrap(), PickLabel::Rejected);
        assert_eq!("no-pick".parse::<PickLabel>().unwrap(), PickLabel::NoPick);
        assert!("maybe".parse::<PickLabel>().is_err());
        assert_eq!(PickLabel::Pending.to_string(), "pending");
    }

    #[test]
    fn test_classification_boundaries() {
        let settings = thresholds(30, 70);
        assert_eq!(classify(0.0, &settings), PickLabel::NoPick);
        assert_eq!(classify(0.5, &settings), PickLabel::Rejected);
        assert_eq!(classify(29.99, &settings), PickLabel::Rejected);
        assert_eq!(classify(30.0, &settings), PickLabel::Pending);
        assert_eq!(classify(69.9, &settings), PickLabel::Pending);
        assert_eq!(classify(70.0, &settings), PickLabel::Accepted);
        assert_eq!(classify(250.0, &settings), PickLabel::Accepted);
        assert_eq!(classify(f64::NAN, &settings), PickLabel::NoPick);
    }

    #[test]
    fn test_negative_quality_is_rejected() {
        assert_eq!(classify(-3.0, &thresholds(10, 60)), PickLabel::Rejected);
    }

    #[test]
    fn test_all_disabled_scores_exactly_zero() {
        let settings = QualitySettings::all_disabled();
        let raw = RawScores {
            blur_ratio: 0.7,
            blur_max: 900.0,
            noise: 1.2,
            compression_count: 40,
            over_exposure: 0.1,
            under_exposure: 0.2,
        };
        let report = QualityReport::from_raw(raw, &settings);
        assert_eq!(report.final_quality, 0.0);
        assert_eq!(report.label, PickLabel::NoPick);
    }

    #[test]
    fn test_uniform_gray_scenario_is_accepted() {
        let settings = thresholds(30, 70);
        let raw = RawScores {
            blur_ratio: f64::NAN,
            ..RawScores::default()
        };
        let report = QualityReport::from_raw(raw, &settings);

        assert_eq!(report.normalized.blur, 0.0);
        assert_eq!(report.normalized.over_exposure, 100.0);
        assert_eq!(report.final_quality, 100.0);
        assert_eq!(report.label, PickLabel::Accepted);
    }

    #[test]
    fn test_exposure_term_is_independent_of_other_weights() {
        let raw = RawScores {
            over_exposure: 0.5,
            ..RawScores::default()
        };
        for weight in [0.0, 25.0, 100.0, 400.0] {
            let settings = QualitySettings {
                detect_blur: false,
                detect_noise: false,
                detect_compression: false,
                blur_weight: weight,
                noise_weight: weight,
                compression_weight: weight,
                ..QualitySettings::default()
            };
            let report = QualityReport::from_raw(raw, &settings);
            assert_eq!(report.normalized.over_exposure, 50.0);
            assert_eq!(report.final_quality, 50.0);
        }
    }

    #[test]
    fn test_exposure_weight_scales_term() {
        let raw = RawScores {
            over_exposure: 0.5,
            ..RawScores::default()
        };
        let settings = QualitySettings {
            detect_overexposure: true,
            exposure_weight: 50.0,
            ..QualitySettings::all_disabled()
        };
        assert_eq!(QualityReport::from_raw(raw, &settings).final_quality, 25.0);
    }

    #[test]
    fn test_compression_count_is_monotonic() {
        let settings = QualitySettings {
            compression_weight: 10.0,
            ..QualitySettings::default()
        };
        let mut previous = f64::NEG_INFINITY;
        for count in [0u64, 1, 2, 10, 500, 5000] {
            let raw = RawScores {
                blur_ratio: 0.2,
                blur_max: 300.0,
                noise: 0.1,
                compression_count: count,
                over_exposure: 0.05,
                under_exposure: 0.0,
            };
            let report = QualityReport::from_raw(raw, &settings);
            assert!(report.final_quality > previous);
            previous = report.final_quality;
        }
    }

    #[test]
    fn test_normalisation_formulas() {
        let raw = RawScores {
            blur_ratio: 0.25,
            blur_max: 32767.0 / 2.0,
            noise: 0.3,
            compression_count: 512,
            over_exposure: 0.2,
            under_exposure: 0.0,
        };
        let scores = NormalizedScores::from_raw(&raw, &QualitySettings::default());
        assert!((scores.blur - 75.0).abs() < 1e-9);
        assert!((scores.noise - 30.0).abs() < 1e-9);
        assert!((scores.compression - 50.0).abs() < 1e-9);
        assert!((scores.over_exposure - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_trace_lines_cover_every_metric() {
        let report = QualityReport::from_raw(RawScores::default(), &QualitySettings::default());
        let lines = report.trace_lines();
        assert_eq!(lines.len(), 12);
        assert!(lines.iter().any(|l| l == "label=accepted"));
        assert!(lines.iter().all(|l| l.contains('=')));
    }

    #[test]
    fn test_compare_breaks_ties_on_blur() {
        let settings = QualitySettings::default();
        let sharp = QualityReport::from_raw(
            RawScores { blur_ratio: 0.5, ..RawScores::default() },
            &settings,
        );
        let mut soft = sharp.clone();
        soft.normalized.blur = 10.0;
        assert_eq!(sharp.compare(&soft), std::cmp::Ordering::Greater);
    }
}
