//! Buffers derived once per run from the source image

use crate::context::{CancelToken, RunContext};
use crate::error::Result;
use crate::image::SourceImage;
use image::{GrayImage, Luma, RgbaImage};

/// Per-channel samples at the source's native depth, row-major (y outer, x inner)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelBuffers {
    pub red: Vec<f32>,
    pub green: Vec<f32>,
    pub blue: Vec<f32>,
}

impl ChannelBuffers {
    pub fn len(&self) -> usize {
        self.red.len()
    }

    pub fn is_empty(&self) -> bool {
        self.red.is_empty()
    }
}

/// Grayscale where every cell is `floor((R + G + B) / 3)`
pub fn grayscale(rgba: &RgbaImage, cancel: &CancelToken) -> Result<GrayImage> {
    let (width, height) = rgba.dimensions();
    let mut gray = GrayImage::new(width, height);

    for y in 0..height {
        cancel.check()?;
        for x in 0..width {
            let p = rgba.get_pixel(x, y);
            let sum = p[0] as u32 + p[1] as u32 + p[2] as u32;
            gray.put_pixel(x, y, Luma([(sum / 3) as u8]));
        }
    }

    Ok(gray)
}

/// Collect native-depth R, G, B samples in scan order
pub fn channel_buffers(image: &dyn SourceImage, cancel: &CancelToken) -> Result<ChannelBuffers> {
    let count = image.pixel_count();
    let mut buffers = ChannelBuffers {
        red: Vec::with_capacity(count),
        green: Vec::with_capacity(count),
        blue: Vec::with_capacity(count),
    };

    for y in 0..image.height() {
        cancel.check()?;
        for x in 0..image.width() {
            let [r, g, b, _] = image.pixel(x, y);
            buffers.red.push(r as f32);
            buffers.green.push(g as f32);
            buffers.blue.push(b as f32);
        }
    }

    Ok(buffers)
}

/// Fill the context's grayscale buffer, plus the channel buffers when the
/// noise detector will need them. On cancellation the context is left partial.
pub fn prepare(image: &dyn SourceImage, with_channels: bool, ctx: &mut RunContext) -> Result<()> {
    let rgba = image.to_rgba8();
    ctx.check_cancelled()?;

    ctx.gray = grayscale(&rgba, ctx.cancel_token())?;

    if with_channels {
        ctx.channels = Some(channel_buffers(image, ctx.cancel_token())?);
    }

    tracing::trace!(
        width = ctx.width,
        height = ctx.height,
        channels = with_channels,
        "Preprocessing complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QualityError;
    use crate::image::{BitDepth, DecodedImage, Rgba16Image};
    use image::Rgba;

    #[test]
    fn test_grayscale_truncates_mean() {
        let mut img = RgbaImage::new(3, 2);
        img.put_pixel(0, 0, Rgba([10, 10, 11, 255])); // 31 / 3 = 10.33
        img.put_pixel(2, 1, Rgba([255, 255, 254, 255])); // 764 / 3 = 254.67

        let gray = grayscale(&img, &CancelToken::new()).unwrap();
        assert_eq!(gray.dimensions(), (3, 2));
        assert_eq!(gray.get_pixel(0, 0)[0], 10);
        assert_eq!(gray.get_pixel(2, 1)[0], 254);
        assert_eq!(gray.get_pixel(1, 0)[0], 0);
    }

    #[test]
    fn test_grayscale_is_row_major_for_wide_images() {
        let mut img = RgbaImage::new(5, 2);
        img.put_pixel(4, 1, Rgba([90, 90, 90, 255]));

        let gray = grayscale(&img, &CancelToken::new()).unwrap();
        assert_eq!(gray.width(), 5);
        assert_eq!(gray.height(), 2);
        assert_eq!(gray.get_pixel(4, 1)[0], 90);
    }

    #[test]
    fn test_channel_buffers_scan_order_and_depth() {
        let mut img = Rgba16Image::new(2, 2);
        img.put_pixel(1, 0, Rgba([1000, 2000, 3000, 65535]));
        img.put_pixel(0, 1, Rgba([4000, 5000, 6000, 65535]));
        let decoded = DecodedImage::from(img);

        let buffers = channel_buffers(&decoded, &CancelToken::new()).unwrap();
        assert_eq!(buffers.len(), 4);
        assert_eq!(buffers.red, vec![0.0, 1000.0, 4000.0, 0.0]);
        assert_eq!(buffers.green[2], 5000.0);
        assert_eq!(buffers.blue[1], 3000.0);
    }

    #[test]
    fn test_prepare_skips_channels_when_not_needed() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([30, 60, 90, 255]));
        let mut ctx = RunContext::new(CancelToken::new(), BitDepth::Eight, 4, 4);

        prepare(&img, false, &mut ctx).unwrap();
        assert!(ctx.channels.is_none());
        assert_eq!(ctx.gray.get_pixel(3, 3)[0], 60);

        prepare(&img, true, &mut ctx).unwrap();
        assert_eq!(ctx.channels.as_ref().map(|c| c.len()), Some(16));
    }

    #[test]
    fn test_prepare_stops_when_cancelled() {
        let img = RgbaImage::new(8, 8);
        let token = CancelToken::new();
        token.cancel();
        let mut ctx = RunContext::new(token, BitDepth::Eight, 8, 8);

        assert!(matches!(prepare(&img, true, &mut ctx), Err(QualityError::Cancelled)));
    }
}
