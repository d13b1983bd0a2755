//! Image quality analysis for Photo Triage
//!
//! [`QualityAnalyzer`] is the engine's entry point: configure it, hand it
//! images, and read back a [`PickLabel`] (or the full [`QualityReport`]).
//! One analyzer can be shared between threads; `cancel()` from any of them
//! stops every run in flight.

use crate::batch::{BatchEntry, BatchReport};
use crate::context::{CancelToken, RawScores, RunContext, RunState};
use crate::detectors::{BlurDetector, CompressionDetector, ExposureDetector, NoiseDetector};
use crate::error::{QualityError, Result};
use crate::image::{load_image, SourceImage};
use crate::kmeans::KMeansParams;
use crate::preprocess;
use crate::primitives::Primitives;
use crate::score::{PickLabel, QualityReport};
use crate::settings::{ExposureMaskSettings, QualitySettings};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use std::path::Path;

pub struct QualityAnalyzer {
    settings: RwLock<QualitySettings>,
    primitives: Primitives,
    kmeans: KMeansParams,
    exposure_mask: ExposureMaskSettings,
    cancel: CancelToken,
    last_state: Mutex<RunState>,
}

impl QualityAnalyzer {
    pub fn new(settings: QualitySettings) -> Self {
        Self::with_primitives(settings, Primitives::default())
    }

    /// Analyzer backed by custom vision primitives
    pub fn with_primitives(settings: QualitySettings, primitives: Primitives) -> Self {
        warn_if_suspicious(&settings);
        Self {
            settings: RwLock::new(settings),
            primitives,
            kmeans: KMeansParams::default(),
            exposure_mask: ExposureMaskSettings::default(),
            cancel: CancelToken::new(),
            last_state: Mutex::new(RunState::Idle),
        }
    }

    /// Replace the settings used by subsequent runs
    pub fn configure(&self, settings: QualitySettings) {
        warn_if_suspicious(&settings);
        *self.settings.write() = settings;
    }

    pub fn settings(&self) -> QualitySettings {
        self.settings.read().clone()
    }

    /// Stop every run in flight. The analyzer stays cancelled until [`reset`](Self::reset).
    pub fn cancel(&self) {
        tracing::info!("Quality analysis cancellation requested");
        self.cancel.cancel();
    }

    pub fn reset(&self) {
        self.cancel.reset();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Handle that can cancel this analyzer from elsewhere, e.g. a timeout thread
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// State of the most recently finished or started run. Runs made in
    /// parallel (as in [`analyze_batch`](Self::analyze_batch)) all write here, so
    /// per-image state is only reliable on [`QualityReport::state`].
    pub fn state(&self) -> RunState {
        *self.last_state.lock()
    }

    /// Assess an image and return its pick label. Invalid images and cancelled
    /// runs come back as [`PickLabel::NoPick`].
    ///
    /// The cancel flag belongs to the analyzer, not to a single run: after
    /// [`cancel`](Self::cancel) every call returns NoPick until
    /// [`reset`](Self::reset), even if the cancel arrived after a run finished.
    pub fn run(&self, image: &dyn SourceImage) -> PickLabel {
        match self.assess(image) {
            Ok(report) => report.label,
            Err(e) => {
                tracing::debug!("No pick: {}", e);
                PickLabel::NoPick
            }
        }
    }

    /// Assess an image and return every score that went into the verdict
    pub fn assess(&self, image: &dyn SourceImage) -> Result<QualityReport> {
        if image.is_empty() {
            return Err(QualityError::InvalidImage(format!(
                "zero-sized image ({}x{})",
                image.width(),
                image.height()
            )));
        }

        let settings = self.settings();
        let mut ctx = RunContext::new(self.cancel.clone(), image.bit_depth(), image.width(), image.height());
        ctx.set_state(RunState::Running);
        *self.last_state.lock() = RunState::Running;

        if !settings.any_detector_enabled() {
            ctx.set_state(RunState::Completed);
            *self.last_state.lock() = RunState::Completed;
            return Ok(QualityReport::from_raw(RawScores::default(), &settings));
        }

        let outcome = self.execute(image, &settings, &mut ctx);

        // A cancel that lands after the last poll still discards the scores
        let outcome = outcome.and_then(|()| ctx.check_cancelled());

        match outcome {
            Ok(()) => {
                ctx.set_state(RunState::Completed);
                *self.last_state.lock() = RunState::Completed;
                let report = QualityReport::from_raw(ctx.scores, &settings);
                tracing::info!(
                    width = ctx.width,
                    height = ctx.height,
                    depth = %ctx.bit_depth,
                    final_quality = report.final_quality,
                    label = %report.label,
                    "Quality assessment complete"
                );
                Ok(report)
            }
            Err(e) => {
                let state = if matches!(e, QualityError::Cancelled) {
                    RunState::Cancelled
                } else {
                    RunState::Completed
                };
                ctx.set_state(state);
                *self.last_state.lock() = state;
                Err(e)
            }
        }
    }

    /// Load an image file and assess it
    pub fn analyze_image<P: AsRef<Path>>(&self, path: P) -> Result<QualityReport> {
        let path = path.as_ref();
        self.cancel.check()?;
        let image = load_image(path)?;
        tracing::debug!(path = %path.display(), "Analyzing image");
        self.assess(&image)
    }

    /// Assess many files in parallel. Failures are recorded per entry and never
    /// abort the batch.
    pub fn analyze_batch<P: AsRef<Path> + Sync>(&self, paths: &[P]) -> BatchReport {
        let entries = paths
            .par_iter()
            .map(|path| {
                let path = path.as_ref();
                match self.analyze_image(path) {
                    Ok(report) => BatchEntry::assessed(path, report),
                    Err(e) => {
                        if !matches!(e, QualityError::Cancelled) {
                            tracing::warn!("Quality analysis failed for {}: {}", path.display(), e);
                        }
                        BatchEntry::failed(path, &e)
                    }
                }
            })
            .collect();

        BatchReport { entries }
    }

    fn execute(&self, image: &dyn SourceImage, settings: &QualitySettings, ctx: &mut RunContext) -> Result<()> {
        preprocess::prepare(image, settings.detect_noise, ctx)?;

        let blur = BlurDetector {
            edges: &*self.primitives.edges,
            blur: &*self.primitives.blur,
            laplacian: &*self.primitives.laplacian,
        };
        let noise = NoiseDetector {
            clusterer: &*self.primitives.clusterer,
            params: self.kmeans,
        };
        let exposure = ExposureDetector {
            mask_generator: &*self.primitives.mask_generator,
            settings: self.exposure_mask.clone(),
        };

        let shared: &RunContext = ctx;
        let ((blur, noise), (compression, exposure)) = rayon::join(
            || {
                rayon::join(
                    || settings.detect_blur.then(|| blur.detect(shared)).transpose(),
                    || settings.detect_noise.then(|| noise.detect(shared)).transpose(),
                )
            },
            || {
                rayon::join(
                    || settings.detect_compression.then(|| CompressionDetector.detect(shared)).transpose(),
                    || settings.detect_overexposure.then(|| exposure.detect(image, shared)).transpose(),
                )
            },
        );

        let blur = blur?.unwrap_or_default();
        let noise = noise?.unwrap_or_default();
        let compression = compression?.unwrap_or_default();
        let exposure = exposure?.unwrap_or_default();

        ctx.scores = RawScores {
            blur_ratio: blur.edge_ratio,
            blur_max: blur.laplacian_max,
            noise: noise.score,
            compression_count: compression,
            over_exposure: exposure.over,
            under_exposure: exposure.under,
        };
        Ok(())
    }
}

impl Default for QualityAnalyzer {
    fn default() -> Self {
        Self::new(QualitySettings::default())
    }
}

fn warn_if_suspicious(settings: &QualitySettings) {
    if let Err(e) = settings.validate() {
        tracing::warn!("Using questionable quality settings: {}", e);
    }
}
