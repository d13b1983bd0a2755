//! Vision primitives the detectors are built on
//!
//! Each primitive is a small trait so a different numerical backend can be
//! swapped in. [`ImageprocBackend`] provides the default implementations on top
//! of the `imageproc` crate.

use crate::kmeans::{KMeansClusterer, LloydKMeans};
use crate::mask::{ClippingMaskGenerator, PureColorMaskGenerator};
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter::{box_filter, filter3x3};
use std::sync::Arc;

/// Signed 16-bit single-channel response map
pub type SignedImage = ImageBuffer<Luma<i16>, Vec<i16>>;

/// 3x3 Gaussian kernel (sigma 0.8), the discrete form of a 3-tap binomial
const GAUSSIAN_3X3: [f32; 9] = [
    1.0 / 16.0, 2.0 / 16.0, 1.0 / 16.0,
    2.0 / 16.0, 4.0 / 16.0, 2.0 / 16.0,
    1.0 / 16.0, 2.0 / 16.0, 1.0 / 16.0,
];

/// Aperture-3 Laplacian: second Sobel derivatives in x and y, summed
const LAPLACIAN_3X3: [i16; 9] = [
    2, 0, 2,
    0, -8, 0,
    2, 0, 2,
];

pub trait EdgeDetector: Send + Sync {
    /// Canny edge map (aperture 3); edge pixels are 255, everything else 0
    fn detect_edges(&self, gray: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage;
}

pub trait Blur: Send + Sync {
    fn box_blur_3x3(&self, gray: &GrayImage) -> GrayImage;

    fn gaussian_blur_3x3(&self, gray: &GrayImage) -> GrayImage;
}

pub trait Laplacian: Send + Sync {
    /// Aperture-3 Laplacian with signed 16-bit output so negative responses survive
    fn laplacian(&self, gray: &GrayImage) -> SignedImage;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageprocBackend;

impl EdgeDetector for ImageprocBackend {
    fn detect_edges(&self, gray: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
        imageproc::edges::canny(gray, low_threshold, high_threshold)
    }
}

impl Blur for ImageprocBackend {
    fn box_blur_3x3(&self, gray: &GrayImage) -> GrayImage {
        box_filter(gray, 1, 1)
    }

    fn gaussian_blur_3x3(&self, gray: &GrayImage) -> GrayImage {
        filter3x3(gray, &GAUSSIAN_3X3)
    }
}

impl Laplacian for ImageprocBackend {
    fn laplacian(&self, gray: &GrayImage) -> SignedImage {
        filter3x3(gray, &LAPLACIAN_3X3)
    }
}

/// The full set of collaborators one analyzer uses
#[derive(Clone)]
pub struct Primitives {
    pub edges: Arc<dyn EdgeDetector>,
    pub blur: Arc<dyn Blur>,
    pub laplacian: Arc<dyn Laplacian>,
    pub clusterer: Arc<dyn KMeansClusterer>,
    pub mask_generator: Arc<dyn PureColorMaskGenerator>,
}

impl Default for Primitives {
    fn default() -> Self {
        Self {
            edges: Arc::new(ImageprocBackend),
            blur: Arc::new(ImageprocBackend),
            laplacian: Arc::new(ImageprocBackend),
            clusterer: Arc::new(LloydKMeans::default()),
            mask_generator: Arc::new(ClippingMaskGenerator),
        }
    }
}

impl std::fmt::Debug for Primitives {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Primitives").finish_non_exhaustive()
    }
}
