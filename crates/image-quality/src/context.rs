//! Per-run state shared by the detectors
//!
//! A [`RunContext`] is created at the start of an assessment and dropped at the
//! end. It carries the cancellation token, the preprocessing buffers every
//! detector reads, and the raw scores collected so far.

use crate::error::{QualityError, Result};
use crate::image::BitDepth;
use crate::preprocess::ChannelBuffers;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag.
///
/// Clones observe the same flag. Cancellation is one-shot: the flag stays set
/// until [`CancelToken::reset`] is called explicitly.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent and safe from any thread.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }

    /// Poll point for pixel and row loops
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(QualityError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Lifecycle of one assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Running => write!(f, "running"),
            RunState::Completed => write!(f, "completed"),
            RunState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Raw detector outputs before normalisation. A disabled detector leaves its
/// fields at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawScores {
    /// Mean over max of the Canny edge map, nominally 0..1
    pub blur_ratio: f64,
    /// Largest signed Laplacian response
    pub blur_max: f64,
    pub noise: f64,
    pub compression_count: u64,
    pub over_exposure: f64,
    pub under_exposure: f64,
}

/// Replace a non-finite metric with the neutral score 0
pub(crate) fn clamp_metric(name: &str, value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        tracing::debug!(metric = name, value, "Degenerate metric clamped to 0");
        0.0
    }
}

impl RawScores {
    /// Copy with every non-finite score clamped to 0
    pub fn sanitized(&self) -> Self {
        Self {
            blur_ratio: clamp_metric("blur_ratio", self.blur_ratio),
            blur_max: clamp_metric("blur_max", self.blur_max),
            noise: clamp_metric("noise", self.noise),
            compression_count: self.compression_count,
            over_exposure: clamp_metric("over_exposure", self.over_exposure),
            under_exposure: clamp_metric("under_exposure", self.under_exposure),
        }
    }
}

pub struct RunContext {
    cancel: CancelToken,
    pub bit_depth: BitDepth,
    pub width: u32,
    pub height: u32,
    /// Row-major (height x width) luminance, `(R + G + B) / 3` of the 8-bit copy
    pub gray: GrayImage,
    /// Native-depth channel samples, present only when noise detection runs
    pub channels: Option<ChannelBuffers>,
    pub scores: RawScores,
    state: RunState,
}

impl RunContext {
    pub fn new(cancel: CancelToken, bit_depth: BitDepth, width: u32, height: u32) -> Self {
        Self {
            cancel,
            bit_depth,
            width,
            height,
            gray: GrayImage::new(0, 0),
            channels: None,
            scores: RawScores::default(),
            state: RunState::Idle,
        }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn check_cancelled(&self) -> Result<()> {
        self.cancel.check()
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: RunState) {
        tracing::trace!(from = %self.state, to = %state, "Run state transition");
        self.state = state;
    }
}
