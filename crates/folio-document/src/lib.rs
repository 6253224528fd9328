// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// folio-document — Document handling for the Folio page pipeline.
//
// Opens uploaded PDFs and images as read-only source documents, renders page
// thumbnails, and reassembles an edited page order into a new PDF.

pub mod image;
pub mod integrity;
pub mod pdf;
pub mod render;
pub mod source;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use image::processor::ImageProcessor;
pub use integrity::hash_bytes;
pub use pdf::assemble::{AssembledDocument, Assembler, AssemblyOptions};
pub use pdf::reader::PdfReader;
pub use render::{PageRenderer, RenderedPage, ThumbnailRenderer, ThumbnailSpec};
pub use source::{ImageSource, LoadReport, RejectedFile, SourceDocument, SourceHandle};
