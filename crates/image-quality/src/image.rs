//! Source image access for quality assessment
//!
//! The engine only ever reads the caller's image. It needs the dimensions, the
//! sample depth, per-pixel RGBA at native depth and an 8-bit copy; anything that
//! can provide those implements [`SourceImage`].

use crate::error::{QualityError, Result};
use image::{DynamicImage, ImageBuffer, ImageReader, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 16-bit RGBA buffer as produced by the `image` crate
pub type Rgba16Image = ImageBuffer<Rgba<u16>, Vec<u16>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitDepth {
    Eight,
    Sixteen,
}

impl BitDepth {
    /// Largest sample value representable at this depth
    pub fn max_value(&self) -> f64 {
        match self {
            BitDepth::Eight => 255.0,
            BitDepth::Sixteen => 65535.0,
        }
    }

    pub fn is_sixteen_bit(&self) -> bool {
        matches!(self, BitDepth::Sixteen)
    }
}

impl std::fmt::Display for BitDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BitDepth::Eight => write!(f, "8-bit"),
            BitDepth::Sixteen => write!(f, "16-bit"),
        }
    }
}

/// Read-only view of an image under assessment.
pub trait SourceImage: Send + Sync {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn bit_depth(&self) -> BitDepth;

    /// RGBA samples of the pixel at `(x, y)` at native depth
    fn pixel(&self, x: u32, y: u32) -> [u16; 4];

    /// 8-bit RGBA copy of the whole image
    fn to_rgba8(&self) -> RgbaImage;

    fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

impl SourceImage for RgbaImage {
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    fn bit_depth(&self) -> BitDepth {
        BitDepth::Eight
    }

    fn pixel(&self, x: u32, y: u32) -> [u16; 4] {
        let p = self.get_pixel(x, y);
        [p[0] as u16, p[1] as u16, p[2] as u16, p[3] as u16]
    }

    fn to_rgba8(&self) -> RgbaImage {
        self.clone()
    }
}

/// Decoded photograph kept at its native sample depth
#[derive(Debug, Clone)]
pub enum DecodedImage {
    Eight(RgbaImage),
    Sixteen(Rgba16Image),
}

impl From<DynamicImage> for DecodedImage {
    fn from(img: DynamicImage) -> Self {
        let color = img.color();
        let bytes_per_sample = color.bytes_per_pixel() / color.channel_count().max(1);

        // Float sources are folded into 16-bit storage
        if bytes_per_sample > 1 {
            DecodedImage::Sixteen(img.to_rgba16())
        } else {
            DecodedImage::Eight(img.to_rgba8())
        }
    }
}

impl From<RgbaImage> for DecodedImage {
    fn from(img: RgbaImage) -> Self {
        DecodedImage::Eight(img)
    }
}

impl From<Rgba16Image> for DecodedImage {
    fn from(img: Rgba16Image) -> Self {
        DecodedImage::Sixteen(img)
    }
}

impl SourceImage for DecodedImage {
    fn width(&self) -> u32 {
        match self {
            DecodedImage::Eight(img) => img.width(),
            DecodedImage::Sixteen(img) => img.width(),
        }
    }

    fn height(&self) -> u32 {
        match self {
            DecodedImage::Eight(img) => img.height(),
            DecodedImage::Sixteen(img) => img.height(),
        }
    }

    fn bit_depth(&self) -> BitDepth {
        match self {
            DecodedImage::Eight(_) => BitDepth::Eight,
            DecodedImage::Sixteen(_) => BitDepth::Sixteen,
        }
    }

    fn pixel(&self, x: u32, y: u32) -> [u16; 4] {
        match self {
            DecodedImage::Eight(img) => SourceImage::pixel(img, x, y),
            DecodedImage::Sixteen(img) => img.get_pixel(x, y).0,
        }
    }

    fn to_rgba8(&self) -> RgbaImage {
        match self {
            DecodedImage::Eight(img) => img.clone(),
            DecodedImage::Sixteen(img) => DynamicImage::ImageRgba16(img.clone()).to_rgba8(),
        }
    }
}

/// Decode an image file, keeping 16-bit data at 16 bits
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DecodedImage> {
    let path = path.as_ref();
    let load_err = |source| QualityError::Load {
        path: path.to_path_buf(),
        source,
    };

    let img = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(load_err)?;

    Ok(DecodedImage::from(img))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_image_depth_detection() {
        let eight = DecodedImage::from(DynamicImage::new_rgb8(4, 3));
        assert_eq!(eight.bit_depth(), BitDepth::Eight);
        assert_eq!((eight.width(), eight.height()), (4, 3));

        let sixteen = DecodedImage::from(DynamicImage::new_rgb16(4, 3));
        assert_eq!(sixteen.bit_depth(), BitDepth::Sixteen);

        let float = DecodedImage::from(DynamicImage::new_rgb32f(2, 2));
        assert_eq!(float.bit_depth(), BitDepth::Sixteen);
    }

    #[test]
    fn test_sixteen_bit_pixels_keep_native_depth() {
        let img = Rgba16Image::from_pixel(2, 2, Rgba([65535, 32768, 0, 65535]));
        let decoded = DecodedImage::from(img);

        assert_eq!(decoded.pixel(1, 1), [65535, 32768, 0, 65535]);

        let copy = decoded.to_rgba8();
        assert_eq!(copy.get_pixel(0, 0)[0], 255);
        assert_eq!(copy.get_pixel(0, 0)[2], 0);
    }

    #[test]
    fn test_empty_image() {
        let img = RgbaImage::new(0, 10);
        assert!(img.is_empty());
        assert_eq!(SourceImage::pixel_count(&img), 0);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = load_image("/definitely/not/here.jpg");
        assert!(matches!(result, Err(QualityError::Io(_))));
    }

    #[test]
    fn test_load_roundtrip_png() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("gray.png");
        RgbaImage::from_pixel(5, 7, Rgba([10, 20, 30, 255])).save(&path)?;

        let decoded = load_image(&path)?;
        assert_eq!(decoded.bit_depth(), BitDepth::Eight);
        assert_eq!(decoded.pixel(4, 6), [10, 20, 30, 255]);
        Ok(())
    }
}
