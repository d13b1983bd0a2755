//! Blur metrics computed from the grayscale buffer
//!
//! Two unrelated numbers come out of this detector and are scored separately:
//!
//! - **edge ratio**: mean over max of a Canny edge map after a 3x3 box blur.
//!   NaN when the image has no edges at all; the aggregator clamps it to 0.
//! - **Laplacian maximum**: the largest *signed* response of an aperture-3
//!   Laplacian after a 3x3 Gaussian blur. This is not the usual "variance of
//!   Laplacian" sharpness measure and is kept as-is so scores stay comparable
//!   with existing culling thresholds.

use crate::context::{CancelToken, RunContext};
use crate::error::Result;
use crate::primitives::{Blur, EdgeDetector, Laplacian, SignedImage};
use image::GrayImage;
use serde::{Deserialize, Serialize};

pub const CANNY_LOW_THRESHOLD: f32 = 0.4;
pub const CANNY_THRESHOLD_RATIO: f32 = 3.0;
/// Starting point for the Laplacian maximum scan
pub const LAPLACIAN_SENTINEL: i16 = -32767;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BlurEstimate {
    pub edge_ratio: f64,
    pub laplacian_max: f64,
}

pub struct BlurDetector<'a> {
    pub edges: &'a dyn EdgeDetector,
    pub blur: &'a dyn Blur,
    pub laplacian: &'a dyn Laplacian,
}

impl<'a> BlurDetector<'a> {
    pub fn detect(&self, ctx: &RunContext) -> Result<BlurEstimate> {
        let cancel = ctx.cancel_token();
        let edge_ratio = self.edge_ratio(&ctx.gray, cancel)?;
        let laplacian_max = self.laplacian_max(&ctx.gray, cancel)?;

        tracing::debug!(edge_ratio, laplacian_max, "Blur metrics");
        Ok(BlurEstimate { edge_ratio, laplacian_max })
    }

    pub fn edge_ratio(&self, gray: &GrayImage, cancel: &CancelToken) -> Result<f64> {
        let denoised = self.blur.box_blur_3x3(gray);
        cancel.check()?;

        let edges = self.edges.detect_edges(
            &denoised,
            CANNY_LOW_THRESHOLD,
            CANNY_LOW_THRESHOLD * CANNY_THRESHOLD_RATIO,
        );
        cancel.check()?;

        edge_intensity_ratio(&edges, cancel)
    }

    pub fn laplacian_max(&self, gray: &GrayImage, cancel: &CancelToken) -> Result<f64> {
        let denoised = self.blur.gaussian_blur_3x3(gray);
        cancel.check()?;

        let response = self.laplacian.laplacian(&denoised);
        cancel.check()?;

        Ok(max_response(&response, cancel)? as f64)
    }
}

/// `mean / max` of the edge map; 0 / 0 yields NaN, deliberately left for the caller
pub fn edge_intensity_ratio(edges: &GrayImage, cancel: &CancelToken) -> Result<f64> {
    let mut sum = 0.0f64;
    let mut max = 0u8;

    for row in edges.rows() {
        cancel.check()?;
        for p in row {
            sum += p[0] as f64;
            max = max.max(p[0]);
        }
    }

    let count = edges.width() as f64 * edges.height() as f64;
    let mean = sum / count;
    Ok(mean / max as f64)
}

/// Largest signed value in the response map, never below the sentinel
pub fn max_response(response: &SignedImage, cancel: &CancelToken) -> Result<i16> {
    let mut max = LAPLACIAN_SENTINEL;

    for row in response.rows() {
        cancel.check()?;
        for p in row {
            if p[0] > max {
                max = p[0];
            }
        }
    }

    Ok(max)
}
