// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — decode, scale, rotate by quarter turns and encode
// in-memory images using the `image` crate.

use image::DynamicImage;
use folio_core::error::FolioError;
use folio_core::types::Rotation;
use tracing::{debug, instrument};

/// Image processing pipeline operating on a single in-memory image.
///
/// Each transformation consumes `self` and returns a new `ImageProcessor`
/// wrapping the transformed image, enabling method chaining.
///
/// ```ignore
/// let jpeg = ImageProcessor::from_bytes(&png)?
///     .scale(0.5, 4096)
///     .rotate(Rotation::Deg90)
///     .to_jpeg_bytes(80)?;
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Create a processor from raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, FolioError> {
        let img = image::load_from_memory(data)
            .map_err(|err| FolioError::ImageError(format!("failed to decode image: {err}")))?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    /// Current image width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Current image height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Consume the processor and return the underlying `DynamicImage`.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations (consume self, return new Self) -----------------------

    /// Scale both axes by `factor`, never producing a side longer than
    /// `max_side` or shorter than one pixel. Uses Lanczos3 filtering.
    #[instrument(skip(self), fields(factor, max_side))]
    pub fn scale(self, factor: f32, max_side: u32) -> Self {
        let (width, height) = scaled_size(
            self.image.width() as f32,
            self.image.height() as f32,
            factor,
            max_side,
        );
        if width == self.image.width() && height == self.image.height() {
            return self;
        }
        let resized =
            self.image
                .resize_exact(width, height, image::imageops::FilterType::Lanczos3);
        debug!(new_w = width, new_h = height, "Scale complete");
        Self { image: resized }
    }

    /// Rotate clockwise by a quarter-turn multiple. Lossless.
    pub fn rotate(self, rotation: Rotation) -> Self {
        let image = match rotation {
            Rotation::Deg0 => self.image,
            Rotation::Deg90 => self.image.rotate90(),
            Rotation::Deg180 => self.image.rotate180(),
            Rotation::Deg270 => self.image.rotate270(),
        };
        Self { image }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as JPEG bytes with the given quality (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>, FolioError> {
        let mut buffer = Vec::new();
        let rgb = self.image.to_rgb8();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
        rgb.write_with_encoder(encoder)
            .map_err(|err| FolioError::ImageError(format!("JPEG encoding failed: {err}")))?;
        Ok(buffer)
    }
}

/// Target size for scaling a `width` x `height` surface by `factor`, clamped
/// so the longer side does not exceed `max_side`. Aspect ratio is preserved.
pub fn scaled_size(width: f32, height: f32, factor: f32, max_side: u32) -> (u32, u32) {
    let mut w = width * factor;
    let mut h = height * factor;
    let longest = w.max(h);
    if longest > max_side as f32 {
        let shrink = max_side as f32 / longest;
        w *= shrink;
        h *= shrink;
    }
    ((w.round() as u32).max(1), (h.round() as u32).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::png_bytes;

    #[test]
    fn scale_halves_both_axes() {
        let processor = ImageProcessor::from_bytes(&png_bytes(40, 20, 1)).unwrap();
        let scaled = processor.scale(0.5, 4096);
        assert_eq!((scaled.width(), scaled.height()), (20, 10));
    }

    #[test]
    fn scale_respects_max_side() {
        assert_eq!(scaled_size(10_000.0, 5_000.0, 1.0, 1000), (1000, 500));
        assert_eq!(scaled_size(1.0, 1.0, 0.1, 1000), (1, 1));
    }

    #[test]
    fn quarter_rotation_swaps_axes() {
        let processor = ImageProcessor::from_bytes(&png_bytes(30, 10, 1)).unwrap();
        let rotated = processor.rotate(Rotation::Deg90);
        assert_eq!((rotated.width(), rotated.height()), (10, 30));
    }

    #[test]
    fn garbage_is_an_image_error() {
        let result = ImageProcessor::from_bytes(b"not an image");
        assert!(matches!(result, Err(FolioError::ImageError(_))));
    }

    #[test]
    fn jpeg_output_decodes() {
        let processor = ImageProcessor::from_bytes(&png_bytes(8, 8, 3)).unwrap();
        let jpeg = processor.to_jpeg_bytes(80).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 8);
    }
}
