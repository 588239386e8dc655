//! Decode, rotate, scale and encode.
//!
//! # Design Decisions
//!
//! - **Never upscale**: pictures already inside the box keep their size.
//! - **Quarter turns only**: rotation is rounded to the nearest multiple of
//!   90 degrees, which is exact and lossless for pixel grids.
//! - **JPEG output**: thumbnails are re-encoded as JPEG at a configurable
//!   quality, so alpha channels are flattened.

use std::io::Cursor;
use std::path::Path;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};

use crate::error::RenderError;
use crate::target::Size;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Resampling trade-off used when shrinking pictures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleQuality {
    /// Bilinear filtering
    Fast,
    /// Lanczos filtering
    #[default]
    Quality,
}

impl ScaleQuality {
    fn filter(self) -> FilterType {
        match self {
            ScaleQuality::Fast => FilterType::Triangle,
            ScaleQuality::Quality => FilterType::Lanczos3,
        }
    }
}

/// The pixel-level rendering function used by the workers.
///
/// Implementations must be stateless or internally synchronised: one
/// pipeline is shared by every worker and called from blocking threads.
pub trait RenderPipeline: Send + Sync {
    /// Whether a decoder exists for the file at `path`.
    fn can_decode(&self, path: &Path) -> bool;

    /// Decode `source`, rotate it by `rotation` degrees and fit it inside `max`.
    ///
    /// `path` names the source for format detection and error messages.
    fn render_image(
        &self,
        source: &[u8],
        path: &Path,
        rotation: f64,
        max: Size,
    ) -> Result<DynamicImage, RenderError>;

    /// Encode a rendered image.
    fn encode(&self, image: &DynamicImage) -> Result<Bytes, RenderError>;

    /// Full pipeline: decode, rotate, scale, encode.
    fn render(
        &self,
        source: &[u8],
        path: &Path,
        rotation: f64,
        max: Size,
    ) -> Result<Bytes, RenderError> {
        let image = self.render_image(source, path, rotation, max)?;
        self.encode(&image)
    }
}

/// [`RenderPipeline`] on top of the `image` crate.
#[derive(Debug, Clone)]
pub struct ImagePipeline {
    quality: u8,
    scale: ScaleQuality,
}

impl ImagePipeline {
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_JPEG_QUALITY, ScaleQuality::default())
    }

    /// Quality outside 1-100 is clamped.
    pub fn with_settings(quality: u8, scale: ScaleQuality) -> Self {
        Self {
            quality: clamp_quality(quality),
            scale,
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    fn decode(&self, source: &[u8], path: &Path) -> Result<DynamicImage, RenderError> {
        let decode_error = |message: String| RenderError::Decode {
            path: path.to_path_buf(),
            message,
        };

        let reader = match ImageFormat::from_path(path) {
            Ok(format) => ImageReader::with_format(Cursor::new(source), format),
            Err(_) => ImageReader::new(Cursor::new(source))
                .with_guessed_format()
                .map_err(|e| decode_error(e.to_string()))?,
        };

        reader.decode().map_err(|e| decode_error(e.to_string()))
    }
}

impl Default for ImagePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPipeline for ImagePipeline {
    fn can_decode(&self, path: &Path) -> bool {
        ImageFormat::from_path(path)
            .map(|format| format.reading_enabled())
            .unwrap_or(false)
    }

    fn render_image(
        &self,
        source: &[u8],
        path: &Path,
        rotation: f64,
        max: Size,
    ) -> Result<DynamicImage, RenderError> {
        let image = rotate(self.decode(source, path)?, rotation);
        Ok(fit_within(image, max, self.scale))
    }

    fn encode(&self, image: &DynamicImage) -> Result<Bytes, RenderError> {
        let rgb = image.to_rgb8();
        let mut output = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut output, self.quality);

        encoder
            .encode_image(&rgb)
            .map_err(|e| RenderError::Encode {
                message: e.to_string(),
            })?;

        Ok(Bytes::from(output))
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

/// Number of clockwise quarter turns closest to `degrees`, in `0..4`.
pub fn quarter_turns(degrees: f64) -> u8 {
    if !degrees.is_finite() {
        return 0;
    }
    ((degrees / 90.0).round() as i64).rem_euclid(4) as u8
}

/// Rotate clockwise by the quarter-turn nearest to `degrees`.
pub fn rotate(image: DynamicImage, degrees: f64) -> DynamicImage {
    match quarter_turns(degrees) {
        1 => image.rotate90(),
        2 => image.rotate180(),
        3 => image.rotate270(),
        _ => image,
    }
}

/// Shrink `image` to fit inside `max`, preserving the aspect ratio.
pub fn fit_within(image: DynamicImage, max: Size, quality: ScaleQuality) -> DynamicImage {
    if max.width == 0 || max.height == 0 {
        return image;
    }
    if image.width() <= max.width && image.height() <= max.height {
        return image;
    }
    image.resize(max.width, max.height, quality.filter())
}

// =============================================================================
// Tests
// =============================================================================
