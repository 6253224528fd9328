// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rendering — turn one page of a source document into a preview
// thumbnail plus its display dimensions.
//
// Thumbnails are preview artifacts only; they are never embedded in the
// reassembled output.

use std::sync::Arc;

use folio_core::error::{FolioError, Result};
use folio_core::types::{Dimensions, Rotation, SourceIndex, Thumbnail};
use folio_core::PipelineConfig;
use tracing::{debug, instrument};

use crate::image::ImageProcessor;
use crate::pdf::raster::rasterize_page;
use crate::pdf::reader::PdfReader;
use crate::source::{ImageSource, SourceDocument, SourceHandle};

/// Longest thumbnail side in pixels, whatever the scale factor.
pub const MAX_THUMBNAIL_SIDE: u32 = 4096;

const THUMBNAIL_MIME: &str = "image/jpeg";

/// How thumbnails are produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThumbnailSpec {
    /// Constant downscale applied to both axes.
    pub scale: f32,
    pub jpeg_quality: u8,
}

impl Default for ThumbnailSpec {
    fn default() -> Self {
        Self {
            scale: 0.5,
            jpeg_quality: 80,
        }
    }
}

impl From<&PipelineConfig> for ThumbnailSpec {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            scale: config.thumbnail_scale,
            jpeg_quality: config.thumbnail_jpeg_quality,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub thumbnail: Thumbnail,
    pub dimensions: Dimensions,
}

/// Renders one page of a source document.
///
/// Implementations must be pure with respect to the source: the same page
/// renders to the same result, and a failure affects only that page.
pub trait PageRenderer: Send + Sync {
    fn render(
        &self,
        source: &SourceDocument,
        page_index: u32,
        spec: &ThumbnailSpec,
    ) -> Result<RenderedPage>;
}

/// Default renderer.
///
/// PDF pages are validated (page tree, inherited attributes, content
/// streams) and then rasterised upright at the spec's scale. Images are
/// scaled copies of themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThumbnailRenderer;

impl PageRenderer for ThumbnailRenderer {
    #[instrument(skip(self, source, spec), fields(source_index = %source.source_index))]
    fn render(
        &self,
        source: &SourceDocument,
        page_index: u32,
        spec: &ThumbnailSpec,
    ) -> Result<RenderedPage> {
        let page_error = |err: FolioError| FolioError::PageRender {
            source_index: source.source_index,
            page_index,
            reason: err.to_string(),
        };

        match &source.handle {
            SourceHandle::Pdf(reader) => {
                render_pdf_page(reader, page_index, spec).map_err(page_error)
            }
            SourceHandle::Image(image) => {
                if page_index != 0 {
                    return Err(page_error(FolioError::ImageError(format!(
                        "images have a single page, asked for page {page_index}"
                    ))));
                }
                render_image(image, spec).map_err(page_error)
            }
        }
    }
}

fn render_pdf_page(
    reader: &PdfReader,
    page_index: u32,
    spec: &ThumbnailSpec,
) -> Result<RenderedPage> {
    reader.validate_page(page_index)?;
    let canvas = rasterize_page(reader, page_index, spec.scale, MAX_THUMBNAIL_SIDE)?;
    let (px_w, px_h) = canvas.dimensions();

    let bytes = ImageProcessor::from_dynamic(canvas.into()).to_jpeg_bytes(spec.jpeg_quality)?;
    debug!(page_index, px_w, px_h, "PDF page rasterised");
    Ok(RenderedPage {
        thumbnail: thumbnail(bytes, px_w, px_h),
        dimensions: Dimensions::new(px_w as f32, px_h as f32),
    })
}

fn render_image(image: &ImageSource, spec: &ThumbnailSpec) -> Result<RenderedPage> {
    let scaled = ImageProcessor::from_bytes(&image.bytes)?.scale(spec.scale, MAX_THUMBNAIL_SIDE);
    let (px_w, px_h) = (scaled.width(), scaled.height());
    let bytes = scaled.to_jpeg_bytes(spec.jpeg_quality)?;
    Ok(RenderedPage {
        thumbnail: thumbnail(bytes, px_w, px_h),
        dimensions: Dimensions::new(px_w as f32, px_h as f32),
    })
}

fn thumbnail(bytes: Vec<u8>, width: u32, height: u32) -> Thumbnail {
    Thumbnail {
        bytes: Arc::from(bytes),
        width,
        height,
        mime_type: THUMBNAIL_MIME.to_string(),
    }
}

/// Re-encode a thumbnail turned by the page's user rotation, for display or
/// export of previews.
pub fn oriented_preview(
    thumbnail: &Thumbnail,
    rotation: Rotation,
    jpeg_quality: u8,
) -> Result<Vec<u8>> {
    if rotation == Rotation::Deg0 {
        return Ok(thumbnail.bytes.to_vec());
    }
    ImageProcessor::from_bytes(&thumbnail.bytes)?
        .rotate(rotation)
        .to_jpeg_bytes(jpeg_quality)
}

/// Where a render failure came from, for log fields.
pub fn failure_origin(err: &FolioError) -> Option<(SourceIndex, u32)> {
    match err {
        FolioError::PageRender {
            source_index,
            page_index,
            ..
        } => Some((*source_index, *page_index)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{PdfFixture, build_pdf, png_bytes};
    use crate::source::open;
    use folio_core::types::UploadedFile;

    fn pdf_source(fixture: &PdfFixture) -> SourceDocument {
        let file = UploadedFile::new("doc.pdf", "application/pdf", build_pdf(fixture));
        open(SourceIndex(0), &file, &PipelineConfig::default()).unwrap()
    }

    #[test]
    fn pdf_thumbnail_is_half_the_media_box() {
        let source = pdf_source(&PdfFixture::new("A", 1));
        let page = ThumbnailRenderer.render(&source, 0, &ThumbnailSpec::default()).unwrap();

        assert_eq!((page.thumbnail.width, page.thumbnail.height), (306, 396));
        assert_eq!(page.dimensions, Dimensions::new(306.0, 396.0));
        assert_eq!(page.thumbnail.mime_type, "image/jpeg");
        assert!(::image::load_from_memory(&page.thumbnail.bytes).is_ok());
    }

    #[test]
    fn inherited_rotation_swaps_preview_axes() {
        let fixture = PdfFixture {
            rotate: Some(90),
            ..PdfFixture::new("R", 1)
        };
        let source = pdf_source(&fixture);
        let page = ThumbnailRenderer.render(&source, 0, &ThumbnailSpec::default()).unwrap();
        assert_eq!((page.thumbnail.width, page.thumbnail.height), (396, 306));
    }

    #[test]
    fn pages_with_different_content_get_different_thumbnails() {
        let source = pdf_source(&PdfFixture::new("A", 2));
        let spec = ThumbnailSpec::default();
        let first = ThumbnailRenderer.render(&source, 0, &spec).unwrap();
        let second = ThumbnailRenderer.render(&source, 1, &spec).unwrap();

        assert_ne!(first.thumbnail.bytes, second.thumbnail.bytes);
        let first = ::image::load_from_memory(&first.thumbnail.bytes).unwrap().to_rgb8();
        let second = ::image::load_from_memory(&second.thumbnail.bytes).unwrap().to_rgb8();
        assert_ne!(first, second);
    }

    #[test]
    fn page_text_shows_up_as_ink() {
        let source = pdf_source(&PdfFixture::new("A", 1));
        let spec = ThumbnailSpec {
            scale: 2.0,
            ..ThumbnailSpec::default()
        };
        let page = ThumbnailRenderer.render(&source, 0, &spec).unwrap();
        let decoded = ::image::load_from_memory(&page.thumbnail.bytes).unwrap().to_rgb8();

        // Text line starts at (50, 700) in page space: pixel row ~184.
        let band = (90..700)
            .flat_map(|x| (150..200).map(move |y| (x, y)))
            .filter(|&(x, y)| decoded.get_pixel(x, y).0.iter().all(|&c| c < 100))
            .count();
        assert!(band > 20, "only {band} ink pixels in the text band");

        let corner_ink = decoded.get_pixel(10, 1500).0.iter().any(|&c| c < 200);
        assert!(!corner_ink);
    }

    #[test]
    fn broken_page_fails_alone() {
        let fixture = PdfFixture {
            corrupt_pages: vec![1],
            ..PdfFixture::new("C", 3)
        };
        let source = pdf_source(&fixture);
        let spec = ThumbnailSpec::default();

        assert!(ThumbnailRenderer.render(&source, 0, &spec).is_ok());
        let err = ThumbnailRenderer.render(&source, 1, &spec).unwrap_err();
        assert_eq!(failure_origin(&err), Some((SourceIndex(0), 1)));
        assert!(ThumbnailRenderer.render(&source, 2, &spec).is_ok());
    }

    #[test]
    fn image_thumbnail_is_scaled_copy() {
        let file = UploadedFile::new("B.png", "image/png", png_bytes(200, 100, 4));
        let source = open(SourceIndex(1), &file, &PipelineConfig::default()).unwrap();
        let page = ThumbnailRenderer.render(&source, 0, &ThumbnailSpec::default()).unwrap();

        assert_eq!((page.thumbnail.width, page.thumbnail.height), (100, 50));
        assert!(ThumbnailRenderer.render(&source, 1, &ThumbnailSpec::default()).is_err());
    }

    #[test]
    fn oriented_preview_turns_the_thumbnail() {
        let source = pdf_source(&PdfFixture::new("O", 1));
        let page = ThumbnailRenderer.render(&source, 0, &ThumbnailSpec::default()).unwrap();

        let turned = oriented_preview(&page.thumbnail, Rotation::Deg90, 80).unwrap();
        let decoded = ::image::load_from_memory(&turned).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (396, 306));

        let same = oriented_preview(&page.thumbnail, Rotation::Deg0, 80).unwrap();
        assert_eq!(same, page.thumbnail.bytes.to_vec());
    }
}
