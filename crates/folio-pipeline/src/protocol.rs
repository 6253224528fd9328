// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Messages exchanged between the extraction worker and its owner.
//
// Every event is tagged with the batch it belongs to, so events of a batch
// that has been superseded can be recognised and dropped.

use std::sync::Arc;

use folio_core::types::{BatchId, PageDescriptor, PageId};
use folio_document::SourceDocument;
use serde::{Deserialize, Serialize};

/// Work handed to the extraction worker.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub batch: BatchId,
    /// Sources in upload order; pages are produced in this order.
    pub sources: Vec<Arc<SourceDocument>>,
}

impl ExtractionRequest {
    pub fn total_pages(&self) -> usize {
        self.sources.iter().map(|s| s.page_count as usize).sum()
    }
}

/// What the worker reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum WorkerEvent {
    /// Completed pages / total pages across all documents, in [0, 1].
    Progress { fraction: f64 },
    /// One page finished, either `Ready` or `Error`.
    PageReady { descriptor: PageDescriptor },
    /// Every page was attempted. `descriptors` holds ready and error pages in
    /// source order; `failed` lists the ids of the error pages.
    Done {
        descriptors: Vec<PageDescriptor>,
        failed: Vec<PageId>,
    },
    /// The batch could not run at all.
    Error { message: String },
    /// Stopped on request; `descriptors` are the pages finished before.
    Cancelled { descriptors: Vec<PageDescriptor> },
}

impl WorkerEvent {
    /// Whether no further events follow this one.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done { .. } | Self::Error { .. } | Self::Cancelled { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEvent {
    pub batch: BatchId,
    pub event: WorkerEvent,
}

/// Counts derived from a `Done` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionSummary {
    pub batch: BatchId,
    pub ready: usize,
    pub failed: usize,
    pub total: usize,
}

impl ExtractionSummary {
    pub fn from_done(batch: BatchId, descriptors: &[PageDescriptor], failed: &[PageId]) -> Self {
        Self {
            batch,
            ready: descriptors.iter().filter(|d| d.is_ready()).count(),
            failed: failed.len(),
            total: descriptors.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::types::{Dimensions, PageStatus, Rotation, SourceIndex};

    #[test]
    fn events_use_kind_tag() {
        let event = WorkerEvent::Progress { fraction: 0.5 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "progress");
        assert_eq!(json["fraction"], 0.5);

        let done = WorkerEvent::Done {
            descriptors: vec![],
            failed: vec![PageId(4)],
        };
        let json = serde_json::to_value(&done).unwrap();
        assert_eq!(json["kind"], "done");
        assert_eq!(json["failed"][0], 4);
    }

    #[test]
    fn page_ready_round_trips_without_thumbnail_bytes() {
        let descriptor = PageDescriptor {
            id: PageId(1),
            source_index: SourceIndex(0),
            original_page_index: 2,
            thumbnail: None,
            dimensions: Dimensions::new(306.0, 396.0),
            rotation: Rotation::Deg90,
            status: PageStatus::Ready,
            error: None,
        };
        let event = BatchEvent {
            batch: BatchId(3),
            event: WorkerEvent::PageReady { descriptor },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"pageReady\""));
        assert!(json.contains("\"originalPageIndex\":2"));
        let back: BatchEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn terminal_events() {
        assert!(!WorkerEvent::Progress { fraction: 1.0 }.is_terminal());
        assert!(WorkerEvent::Error { message: "x".into() }.is_terminal());
        assert!(WorkerEvent::Cancelled { descriptors: vec![] }.is_terminal());
    }
}
