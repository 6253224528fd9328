// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Source loader — validate uploaded files at the input boundary and open them
// as read-only source documents.
//
// A file that cannot be accepted or opened only blocks itself; the other
// files of the same upload are still loaded.

use std::sync::Arc;

use ::image::ImageFormat;
use folio_core::PipelineConfig;
use folio_core::error::{FolioError, Result};
use folio_core::types::{SourceIndex, SourceKind, UploadedFile};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::integrity::hash_bytes;
use crate::pdf::reader::PdfReader;

/// Raw bytes of an uploaded image plus what was learned from decoding its
/// header once.
#[derive(Debug, Clone)]
pub struct ImageSource {
    pub bytes: Arc<[u8]>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Decoded handle needed for later copy operations.
#[derive(Debug)]
pub enum SourceHandle {
    Pdf(PdfReader),
    Image(ImageSource),
}

/// One uploaded file, decoded but not yet split into pages.
///
/// Immutable after creation; shared behind `Arc` between the extraction
/// worker and the reassembly engine.
#[derive(Debug)]
pub struct SourceDocument {
    pub source_index: SourceIndex,
    pub name: String,
    pub kind: SourceKind,
    pub page_count: u32,
    /// SHA-256 of the uploaded bytes.
    pub content_hash: String,
    pub handle: SourceHandle,
}

impl SourceDocument {
    pub fn pdf(&self) -> Option<&PdfReader> {
        match &self.handle {
            SourceHandle::Pdf(reader) => Some(reader),
            SourceHandle::Image(_) => None,
        }
    }

    pub fn image(&self) -> Option<&ImageSource> {
        match &self.handle {
            SourceHandle::Image(image) => Some(image),
            SourceHandle::Pdf(_) => None,
        }
    }
}

/// A file that never reached extraction.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedFile {
    pub source_index: SourceIndex,
    pub name: String,
    pub reason: String,
}

/// Outcome of loading an upload list.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub sources: Vec<Arc<SourceDocument>>,
    pub rejected: Vec<RejectedFile>,
}

impl LoadReport {
    pub fn total_pages(&self) -> usize {
        self.sources.iter().map(|s| s.page_count as usize).sum()
    }
}

/// Check a file at the input boundary, before any decoding.
///
/// Only `application/pdf` and `image/*` types the image decoder understands
/// are accepted.
pub fn accept(file: &UploadedFile, config: &PipelineConfig) -> Result<SourceKind> {
    if file.byte_size > config.max_file_bytes {
        return Err(FolioError::FileTooLarge {
            name: file.name.clone(),
            size: file.byte_size,
            limit: config.max_file_bytes,
        });
    }

    let mime = file.mime_type.to_ascii_lowercase();
    if mime == "application/pdf" {
        return Ok(SourceKind::Pdf);
    }
    if mime.starts_with("image/") && ImageFormat::from_mime_type(&mime).is_some() {
        return Ok(SourceKind::Image);
    }
    Err(FolioError::UnsupportedDocument(file.mime_type.clone()))
}

/// Open one accepted file as a source document.
#[instrument(skip(file, config), fields(name = %file.name, mime = %file.mime_type))]
pub fn open(
    source_index: SourceIndex,
    file: &UploadedFile,
    config: &PipelineConfig,
) -> Result<SourceDocument> {
    let kind = accept(file, config)?;
    let decode_error = |reason: String| FolioError::Decode {
        name: file.name.clone(),
        reason,
    };

    let (handle, page_count) = match kind {
        SourceKind::Pdf => {
            let reader = PdfReader::from_bytes(&file.bytes)
                .map_err(|err| decode_error(err.to_string()))?;
            let pages = u32::try_from(reader.page_count())
                .map_err(|_| decode_error("page count overflow".into()))?;
            if pages == 0 {
                return Err(decode_error("document has no pages".into()));
            }
            (SourceHandle::Pdf(reader), pages)
        }
        SourceKind::Image => {
            let format = ::image::guess_format(&file.bytes)
                .map_err(|err| decode_error(format!("unrecognised image data: {err}")))?;
            let (width, height) = ::image::ImageReader::with_format(
                std::io::Cursor::new(&file.bytes[..]),
                format,
            )
            .into_dimensions()
            .map_err(|err| decode_error(format!("unreadable image header: {err}")))?;
            if width == 0 || height == 0 {
                return Err(decode_error("image has no pixels".into()));
            }
            let image = ImageSource {
                bytes: Arc::clone(&file.bytes),
                format,
                width,
                height,
            };
            (SourceHandle::Image(image), 1)
        }
    };

    info!(%source_index, page_count, "source opened");
    Ok(SourceDocument {
        source_index,
        name: file.name.clone(),
        kind,
        page_count,
        content_hash: hash_bytes(&file.bytes),
        handle,
    })
}

/// Open every file of an upload list. Indices start at `first_index` and
/// follow list order, including for rejected files.
pub fn load_sources(
    files: &[UploadedFile],
    first_index: u32,
    config: &PipelineConfig,
) -> LoadReport {
    let mut report = LoadReport::default();
    for (offset, file) in files.iter().enumerate() {
        let source_index = SourceIndex(first_index + offset as u32);
        match open(source_index, file, config) {
            Ok(source) => report.sources.push(Arc::new(source)),
            Err(err) => {
                warn!(%source_index, name = %file.name, error = %err, "file rejected");
                report.rejected.push(RejectedFile {
                    source_index,
                    name: file.name.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    report
}
