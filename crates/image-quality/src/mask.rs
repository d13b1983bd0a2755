//! Pure-colour clipping masks
//!
//! A mask has the source's dimensions. Pixels judged clipped are painted with
//! the configured marker colour at full opacity; all others stay fully
//! transparent black.

use crate::context::CancelToken;
use crate::error::Result;
use crate::image::SourceImage;
use crate::settings::ExposureMaskSettings;
use image::{Rgba, RgbaImage};

pub trait PureColorMaskGenerator: Send + Sync {
    fn generate(&self, image: &dyn SourceImage, settings: &ExposureMaskSettings, cancel: &CancelToken) -> Result<RgbaImage>;
}

/// Marks pixels whose samples sit within a percentage of either end of the range
#[derive(Debug, Clone, Copy, Default)]
pub struct ClippingMaskGenerator;

/// Sample thresholds `(under_max, over_min)` for the image's depth
pub fn clipping_limits(max_value: f64, settings: &ExposureMaskSettings) -> (u16, u16) {
    let under = (max_value * settings.under_exposure_percent / 100.0).round();
    let over = (max_value - max_value * settings.over_exposure_percent / 100.0).round();
    (under.clamp(0.0, max_value) as u16, over.clamp(0.0, max_value) as u16)
}

impl PureColorMaskGenerator for ClippingMaskGenerator {
    fn generate(&self, image: &dyn SourceImage, settings: &ExposureMaskSettings, cancel: &CancelToken) -> Result<RgbaImage> {
        let (width, height) = (image.width(), image.height());
        let mut mask = RgbaImage::new(width, height);

        if !settings.under_exposure_indicator && !settings.over_exposure_indicator {
            return Ok(mask);
        }

        let (under_limit, over_limit) = clipping_limits(image.bit_depth().max_value(), settings);
        let under_marker = marker(settings.under_exposure_color.0);
        let over_marker = marker(settings.over_exposure_color.0);

        for y in 0..height {
            cancel.check()?;
            for x in 0..width {
                let [r, g, b, _] = image.pixel(x, y);
                let rgb = [r, g, b];

                let under = if settings.pure_clipping {
                    rgb.iter().all(|&s| s <= under_limit)
                } else {
                    rgb.iter().any(|&s| s <= under_limit)
                };
                if settings.under_exposure_indicator && under {
                    mask.put_pixel(x, y, under_marker);
                }

                // Over-exposure is painted last and wins when both match
                let over = if settings.pure_clipping {
                    rgb.iter().all(|&s| s >= over_limit)
                } else {
                    rgb.iter().any(|&s| s >= over_limit)
                };
                if settings.over_exposure_indicator && over {
                    mask.put_pixel(x, y, over_marker);
                }
            }
        }

        Ok(mask)
    }
}

fn marker(rgb: [u8; 3]) -> Rgba<u8> {
    Rgba([rgb[0], rgb[1], rgb[2], 255])
}
