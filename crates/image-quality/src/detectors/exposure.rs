//! Clipped highlight and shadow fractions

use crate::context::{CancelToken, RunContext};
use crate::error::Result;
use crate::image::SourceImage;
use crate::mask::PureColorMaskGenerator;
use crate::settings::ExposureMaskSettings;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExposureEstimate {
    /// Fraction of pixels clipped to black, 0..1
    pub under: f64,
    /// Fraction of pixels clipped to white, 0..1
    pub over: f64,
}

pub struct ExposureDetector<'a> {
    pub mask_generator: &'a dyn PureColorMaskGenerator,
    pub settings: ExposureMaskSettings,
}

impl<'a> ExposureDetector<'a> {
    pub fn detect(&self, image: &dyn SourceImage, ctx: &RunContext) -> Result<ExposureEstimate> {
        let cancel = ctx.cancel_token();
        let mask = self.mask_generator.generate(image, &self.settings, cancel)?;
        let estimate = self.measure(&mask, cancel)?;

        tracing::debug!(under = estimate.under, over = estimate.over, "Exposure metrics");
        Ok(estimate)
    }

    /// Count opaque marker pixels in the mask. Unmarked pixels are fully
    /// transparent, so they never match the black marker.
    pub fn measure(&self, mask: &RgbaImage, cancel: &CancelToken) -> Result<ExposureEstimate> {
        let total = mask.width() as u64 * mask.height() as u64;
        if total == 0 {
            return Ok(ExposureEstimate::default());
        }

        let over_marker = self.settings.over_exposure_color.0;
        let under_marker = self.settings.under_exposure_color.0;
        let mut over = 0u64;
        let mut under = 0u64;

        for row in mask.rows() {
            cancel.check()?;
            for p in row {
                if p[3] != 255 {
                    continue;
                }
                let rgb = [p[0], p[1], p[2]];
                if rgb == over_marker {
                    over += 1;
                } else if rgb == under_marker {
                    under += 1;
                }
            }
        }

        Ok(ExposureEstimate {
            under: under as f64 / total as f64,
            over: over as f64 / total as f64,
        })
    }
}
