//! Image Codec
//!
//! Decoding, resampling, rotation and encoding of page bitmaps, behind the
//! [`ImageCodec`] trait so the edit pipeline never touches `image` directly.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

// ============================================================
// Error Types
// ============================================================

/// Image codec error types
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Unsupported output format for {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CodecError>;

// ============================================================
// Options
// ============================================================

/// Resampling filter used by resize, rotate and combine scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleFilter {
    #[default]
    Nearest,
    Bilinear,
    Bicubic,
}

impl ResampleFilter {
    fn filter_type(self) -> FilterType {
        match self {
            ResampleFilter::Nearest => FilterType::Nearest,
            ResampleFilter::Bilinear => FilterType::Triangle,
            ResampleFilter::Bicubic => FilterType::CatmullRom,
        }
    }

    fn interpolation(self) -> Interpolation {
        match self {
            ResampleFilter::Nearest => Interpolation::Nearest,
            ResampleFilter::Bilinear => Interpolation::Bilinear,
            ResampleFilter::Bicubic => Interpolation::Bicubic,
        }
    }
}

/// Explicit output image format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    Bmp,
    Tiff,
    Webp,
    Gif,
}

impl OutputFormat {
    /// File extension including the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => ".jpg",
            OutputFormat::Png => ".png",
            OutputFormat::Bmp => ".bmp",
            OutputFormat::Tiff => ".tif",
            OutputFormat::Webp => ".webp",
            OutputFormat::Gif => ".gif",
        }
    }

    /// Parse a format name or extension (`jpg`, `.PNG`, `tiff`)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "jpe" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            "bmp" => Some(OutputFormat::Bmp),
            "tif" | "tiff" => Some(OutputFormat::Tiff),
            "webp" => Some(OutputFormat::Webp),
            "gif" => Some(OutputFormat::Gif),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension().trim_start_matches('.'))
    }
}

// ============================================================
// Codec Trait
// ============================================================

/// Bitmap operations used by extraction, editing and saving
pub trait ImageCodec {
    /// Decode an image from encoded bytes
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage>;

    /// Decode an image file
    fn decode_path(&self, path: &Path) -> Result<DynamicImage>;

    /// Resize to exactly `width` x `height`
    fn resize(
        &self,
        image: &DynamicImage,
        width: u32,
        height: u32,
        filter: ResampleFilter,
    ) -> Result<DynamicImage>;

    /// Rotate counter-clockwise by `degrees`, expanding the canvas to fit
    fn rotate(&self, image: &DynamicImage, degrees: f32, filter: ResampleFilter)
        -> Result<DynamicImage>;

    /// Encode to `path`; the format follows the file extension
    fn save(&self, image: &DynamicImage, path: &Path) -> Result<()>;
}

/// [`ImageCodec`] backed by the `image` and `imageproc` crates
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateCodec;

impl ImageCrateCodec {
    pub fn new() -> Self {
        Self
    }
}

impl ImageCodec for ImageCrateCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }

    fn decode_path(&self, path: &Path) -> Result<DynamicImage> {
        if !path.exists() {
            return Err(CodecError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )));
        }
        image::open(path).map_err(|e| CodecError::Decode(format!("{}: {}", path.display(), e)))
    }

    fn resize(
        &self,
        image: &DynamicImage,
        width: u32,
        height: u32,
        filter: ResampleFilter,
    ) -> Result<DynamicImage> {
        if width == 0 || height == 0 {
            return Err(CodecError::InvalidDimensions { width, height });
        }
        if image.dimensions() == (width, height) {
            return Ok(image.clone());
        }
        Ok(image.resize_exact(width, height, filter.filter_type()))
    }

    fn rotate(
        &self,
        image: &DynamicImage,
        degrees: f32,
        filter: ResampleFilter,
    ) -> Result<DynamicImage> {
        if !degrees.is_finite() {
            return Err(CodecError::Encode(format!("invalid rotation angle {}", degrees)));
        }

        let normalized = degrees.rem_euclid(360.0);
        // Quarter turns are lossless; image's rotate90 is clockwise
        if normalized == 0.0 {
            return Ok(image.clone());
        } else if normalized == 90.0 {
            return Ok(image.rotate270());
        } else if normalized == 180.0 {
            return Ok(image.rotate180());
        } else if normalized == 270.0 {
            return Ok(image.rotate90());
        }

        Ok(rotate_expanded(image, normalized, filter))
    }

    fn save(&self, image: &DynamicImage, path: &Path) -> Result<()> {
        let format = ImageFormat::from_path(path)
            .map_err(|_| CodecError::UnsupportedFormat(path.display().to_string()))?;

        // JPEG has no alpha channel
        let result = match format {
            ImageFormat::Jpeg if image.color().has_alpha() => {
                DynamicImage::ImageRgb8(image.to_rgb8()).save_with_format(path, format)
            }
            _ => image.save_with_format(path, format),
        };
        result.map_err(|e| CodecError::Encode(format!("{}: {}", path.display(), e)))
    }
}

/// Rotate counter-clockwise about the centre onto a canvas large enough to
/// hold every corner. Uncovered pixels are transparent, or black when the
/// source has no alpha channel.
fn rotate_expanded(image: &DynamicImage, degrees: f32, filter: ResampleFilter) -> DynamicImage {
    let (width, height) = image.dimensions();
    let radians = degrees.to_radians();
    let (sin, cos) = radians.sin_cos();

    let w = width as f32;
    let h = height as f32;
    let new_width = (w * cos.abs() + h * sin.abs()).round().max(1.0) as u32;
    let new_height = (w * sin.abs() + h * cos.abs()).round().max(1.0) as u32;

    // Projection::rotate turns clockwise in image coordinates
    let projection = Projection::translate(new_width as f32 / 2.0, new_height as f32 / 2.0)
        * Projection::rotate(-radians)
        * Projection::translate(-w / 2.0, -h / 2.0);

    let source = image.to_rgba8();
    let mut out = image::RgbaImage::new(new_width, new_height);
    warp_into(
        &source,
        &projection,
        filter.interpolation(),
        Rgba([0, 0, 0, 0]),
        &mut out,
    );

    let rotated = DynamicImage::ImageRgba8(out);
    if image.color().has_alpha() {
        rotated
    } else {
        DynamicImage::ImageRgb8(rotated.to_rgb8())
    }
}
