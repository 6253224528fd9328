// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Observer interface — how the presentation layer learns about pipeline
// state changes. Pipeline logic never depends on how these are displayed.

use std::path::Path;

use folio_core::error::FolioError;
use folio_core::human_errors::humanize_error;
use folio_core::types::{BatchId, PageDescriptor};
use folio_document::{AssembledDocument, RejectedFile};
use tracing::{error, info, warn};

use crate::protocol::ExtractionSummary;

/// Receives pipeline notifications. Every method defaults to doing nothing.
pub trait PipelineObserver: Send + Sync {
    fn on_progress(&self, _batch: BatchId, _fraction: f64) {}

    fn on_page_ready(&self, _batch: BatchId, _descriptor: &PageDescriptor) {}

    fn on_extraction_finished(&self, _summary: &ExtractionSummary) {}

    fn on_extraction_failed(&self, _batch: BatchId, _error: &FolioError) {}

    fn on_extraction_cancelled(&self, _batch: BatchId, _completed: usize) {}

    fn on_sources_rejected(&self, _rejected: &[RejectedFile]) {}

    fn on_export_finished(&self, _document: &AssembledDocument, _delivered_to: Option<&Path>) {}

    fn on_export_failed(&self, _error: &FolioError) {}
}

/// Ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Logs every transition through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_progress(&self, batch: BatchId, fraction: f64) {
        info!(%batch, percent = (fraction * 100.0).round(), "extracting pages");
    }

    fn on_extraction_finished(&self, summary: &ExtractionSummary) {
        info!(
            batch = %summary.batch,
            ready = summary.ready,
            failed = summary.failed,
            total = summary.total,
            "pages ready"
        );
    }

    fn on_extraction_failed(&self, batch: BatchId, error: &FolioError) {
        let human = humanize_error(error);
        error!(%batch, %error, suggestion = %human.suggestion, "{}", human.message);
    }

    fn on_extraction_cancelled(&self, batch: BatchId, completed: usize) {
        info!(%batch, completed, "extraction cancelled");
    }

    fn on_sources_rejected(&self, rejected: &[RejectedFile]) {
        for file in rejected {
            warn!(
                source = %file.source_index,
                name = %file.name,
                reason = %file.reason,
                "file skipped"
            );
        }
    }

    fn on_export_finished(&self, document: &AssembledDocument, delivered_to: Option<&Path>) {
        info!(
            pages = document.page_count,
            bytes = document.bytes.len(),
            filename = %document.filename,
            path = ?delivered_to,
            "export finished"
        );
    }

    fn on_export_failed(&self, error: &FolioError) {
        let human = humanize_error(error);
        error!(%error, suggestion = %human.suggestion, "{}", human.message);
    }
}
