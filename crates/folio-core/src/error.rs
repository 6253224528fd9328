// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Folio.

use thiserror::Error;

use crate::types::{PageId, SourceIndex};

/// Top-level error type for all Folio operations.
#[derive(Debug, Error)]
pub enum FolioError {
    // -- Input boundary --
    #[error("unsupported document type: {0}")]
    UnsupportedDocument(String),

    #[error("file {name} is too large ({size} bytes, limit {limit})")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    // -- Extraction --
    #[error("cannot open {name}: {reason}")]
    Decode { name: String, reason: String },

    #[error("page {page_index} of source {source_index} failed to render: {reason}")]
    PageRender {
        source_index: SourceIndex,
        page_index: u32,
        reason: String,
    },

    #[error("batch has {pages} pages, limit is {limit}")]
    BatchTooLarge { pages: usize, limit: usize },

    #[error("no readable source documents")]
    NoSources,

    #[error("extraction worker failed: {0}")]
    Worker(String),

    #[error("operation cancelled")]
    Cancelled,

    // -- Page model --
    #[error("working order invariant violated: {0}")]
    OrderInvariantViolation(String),

    #[error("unknown page {0}")]
    UnknownPage(PageId),

    #[error("result belongs to a superseded extraction batch")]
    StaleBatch,

    #[error("an extraction batch is still running")]
    ExtractionInProgress,

    // -- Reassembly --
    #[error("reassembly failed: {0}")]
    Reassembly(String),

    // -- Document libraries --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FolioError>;
