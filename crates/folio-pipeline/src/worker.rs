// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Extraction worker — turns source documents into page descriptors off the
// caller's task, streaming progress as it goes.
//
// Rendering is CPU-bound and synchronous, so each batch runs on tokio's
// blocking pool and reports through an unbounded channel. Pages are produced
// strictly in source order; a page that fails to render becomes an `Error`
// descriptor and the batch carries on.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use folio_core::PipelineConfig;
use folio_core::error::FolioError;
use folio_core::types::{BatchId, PageDescriptor, PageIdAllocator, PageStatus};
use folio_document::render::failure_origin;
use folio_document::{PageRenderer, ThumbnailRenderer, ThumbnailSpec};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::protocol::{BatchEvent, ExtractionRequest, WorkerEvent};

/// Spawns extraction batches.
///
/// Cheap to clone; every batch shares the same page id allocator, so ids stay
/// unique across re-extractions.
#[derive(Clone)]
pub struct ExtractionWorker {
    renderer: Arc<dyn PageRenderer>,
    ids: Arc<PageIdAllocator>,
    spec: ThumbnailSpec,
    max_pages_per_batch: usize,
}

impl ExtractionWorker {
    pub fn new(config: &PipelineConfig, ids: Arc<PageIdAllocator>) -> Self {
        Self::with_renderer(config, ids, Arc::new(ThumbnailRenderer))
    }

    /// Use a different page renderer (e.g. a real rasteriser).
    pub fn with_renderer(
        config: &PipelineConfig,
        ids: Arc<PageIdAllocator>,
        renderer: Arc<dyn PageRenderer>,
    ) -> Self {
        Self {
            renderer,
            ids,
            spec: ThumbnailSpec::from(config),
            max_pages_per_batch: config.max_pages_per_batch,
        }
    }

    /// Start a batch on the blocking pool. Must be called from within a
    /// tokio runtime.
    pub fn spawn(&self, request: ExtractionRequest) -> ExtractionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let batch = request.batch;

        let worker = self.clone();
        let flag = Arc::clone(&cancel);
        tokio::task::spawn_blocking(move || {
            worker.run(&request, &flag, |event| tx.send(BatchEvent { batch, event }).is_ok());
        });

        ExtractionHandle {
            batch,
            cancel,
            events: rx,
        }
    }

    /// Run one batch to completion on the current thread.
    ///
    /// `emit` returns `false` once nobody listens any more, which stops the
    /// batch like a cancellation (without a terminal event).
    #[instrument(skip_all, fields(batch = %request.batch, sources = request.sources.len()))]
    pub fn run(
        &self,
        request: &ExtractionRequest,
        cancel: &AtomicBool,
        mut emit: impl FnMut(WorkerEvent) -> bool,
    ) {
        if request.sources.is_empty() {
            emit(WorkerEvent::Error {
                message: FolioError::NoSources.to_string(),
            });
            return;
        }

        let total = request.total_pages();
        if total > self.max_pages_per_batch {
            let err = FolioError::BatchTooLarge {
                pages: total,
                limit: self.max_pages_per_batch,
            };
            warn!(total, limit = self.max_pages_per_batch, "batch rejected before rendering");
            emit(WorkerEvent::Error {
                message: err.to_string(),
            });
            return;
        }

        let mut descriptors: Vec<PageDescriptor> = Vec::with_capacity(total);
        let mut failed = Vec::new();

        for source in &request.sources {
            for page_index in 0..source.page_count {
                if cancel.load(Ordering::Relaxed) {
                    info!(completed = descriptors.len(), total, "extraction cancelled");
                    emit(WorkerEvent::Cancelled { descriptors });
                    return;
                }

                let id = self.ids.allocate();
                let descriptor = match self.renderer.render(source, page_index, &self.spec) {
                    Ok(page) => PageDescriptor {
                        id,
                        source_index: source.source_index,
                        original_page_index: page_index,
                        thumbnail: Some(page.thumbnail),
                        dimensions: page.dimensions,
                        rotation: Default::default(),
                        status: PageStatus::Ready,
                        error: None,
                    },
                    Err(err) => {
                        let origin = failure_origin(&err);
                        warn!(page = %id, ?origin, error = %err, "page failed to render");
                        failed.push(id);
                        PageDescriptor {
                            id,
                            source_index: source.source_index,
                            original_page_index: page_index,
                            thumbnail: None,
                            dimensions: Default::default(),
                            rotation: Default::default(),
                            status: PageStatus::Error,
                            error: Some(err.to_string()),
                        }
                    }
                };

                let completed = descriptors.len() + 1;
                let fraction = completed as f64 / total as f64;
                debug!(page = %id, completed, total, "page extracted");
                if !emit(WorkerEvent::PageReady {
                    descriptor: descriptor.clone(),
                }) || !emit(WorkerEvent::Progress { fraction })
                {
                    debug!("event receiver dropped, stopping batch");
                    return;
                }
                descriptors.push(descriptor);
            }
        }

        info!(total, failed = failed.len(), "extraction finished");
        emit(WorkerEvent::Done {
            descriptors,
            failed,
        });
    }
}

/// Owner's side of a running batch. Dropping the handle cancels the batch.
#[derive(Debug)]
pub struct ExtractionHandle {
    batch: BatchId,
    cancel: Arc<AtomicBool>,
    events: mpsc::UnboundedReceiver<BatchEvent>,
}

impl ExtractionHandle {
    pub fn batch(&self) -> BatchId {
        self.batch
    }

    /// Ask the worker to stop before the next page. No effect once the batch
    /// has finished.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Next event, or `None` once the worker has gone away.
    pub async fn recv(&mut self) -> Option<BatchEvent> {
        self.events.recv().await
    }
}

impl Drop for ExtractionHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::types::{PageId, SourceIndex, UploadedFile};
    use folio_document::fixtures::{PdfFixture, build_pdf, png_bytes};
    use folio_document::source::load_sources;

    fn request(files: Vec<UploadedFile>) -> ExtractionRequest {
        let report = load_sources(&files, 0, &PipelineConfig::default());
        assert!(report.rejected.is_empty());
        ExtractionRequest {
            batch: BatchId(1),
            sources: report.sources,
        }
    }

    fn pdf(label: &str, pages: u32) -> UploadedFile {
        UploadedFile::new(
            format!("{label}.pdf"),
            "application/pdf",
            build_pdf(&PdfFixture::new(label, pages)),
        )
    }

    fn collect(worker: &ExtractionWorker, request: &ExtractionRequest) -> Vec<WorkerEvent> {
        let mut events = Vec::new();
        worker.run(request, &AtomicBool::new(false), |event| {
            events.push(event);
            true
        });
        events
    }

    fn worker() -> ExtractionWorker {
        ExtractionWorker::new(&PipelineConfig::default(), Arc::new(PageIdAllocator::new()))
    }

    #[test]
    fn pages_arrive_in_source_order() {
        let req = request(vec![
            pdf("A", 2),
            UploadedFile::new("B.png", "image/png", png_bytes(20, 20, 1)),
        ]);
        let events = collect(&worker(), &req);

        let pages: Vec<(u32, u32)> = events
            .iter()
            .filter_map(|e| match e {
                WorkerEvent::PageReady { descriptor } => {
                    Some((descriptor.source_index.0, descriptor.original_page_index))
                }
                _ => None,
            })
            .collect();
        assert_eq!(pages, vec![(0, 0), (0, 1), (1, 0)]);

        let Some(WorkerEvent::Done { descriptors, failed }) = events.last() else {
            panic!("expected done, got {:?}", events.last());
        };
        assert_eq!(descriptors.len(), 3);
        assert!(failed.is_empty());
        assert!(descriptors.iter().all(|d| d.thumbnail.is_some()));
    }

    #[test]
    fn progress_is_monotonic_and_ends_at_one() {
        let req = request(vec![pdf("A", 3), pdf("B", 4)]);
        let events = collect(&worker(), &req);

        let fractions: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                WorkerEvent::Progress { fraction } => Some(*fraction),
                _ => None,
            })
            .collect();
        assert_eq!(fractions.len(), 7);
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(fractions.iter().filter(|f| **f == 1.0).count(), 1);
        assert_eq!(fractions.last(), Some(&1.0));
    }

    #[test]
    fn failed_page_does_not_stop_the_batch() {
        let fixture = PdfFixture {
            corrupt_pages: vec![1],
            ..PdfFixture::new("C", 5)
        };
        let file = UploadedFile::new("C.pdf", "application/pdf", build_pdf(&fixture));
        let events = collect(&worker(), &request(vec![file]));

        let Some(WorkerEvent::Done { descriptors, failed }) = events.last() else {
            panic!("expected done");
        };
        assert_eq!(descriptors.len(), 5);
        assert_eq!(failed.len(), 1);
        let bad = descriptors.iter().find(|d| d.id == failed[0]).unwrap();
        assert_eq!(bad.original_page_index, 1);
        assert_eq!(bad.status, PageStatus::Error);
        assert!(bad.error.is_some());
    }

    #[test]
    fn oversized_batch_is_rejected_before_rendering() {
        let config = PipelineConfig {
            max_pages_per_batch: 3,
            ..PipelineConfig::default()
        };
        let worker = ExtractionWorker::new(&config, Arc::new(PageIdAllocator::new()));
        let events = collect(&worker, &request(vec![pdf("A", 2), pdf("B", 2)]));

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], WorkerEvent::Error { message } if message.contains("limit")));
    }

    #[test]
    fn cancel_before_start_yields_no_pages() {
        let req = request(vec![pdf("A", 3)]);
        let mut events = Vec::new();
        worker().run(&req, &AtomicBool::new(true), |event| {
            events.push(event);
            true
        });
        assert_eq!(events, vec![WorkerEvent::Cancelled { descriptors: vec![] }]);
    }

    #[test]
    fn ids_are_unique_across_batches() {
        let worker = worker();
        let req = request(vec![pdf("A", 2)]);
        let ids = |events: Vec<WorkerEvent>| -> Vec<PageId> {
            match events.into_iter().last() {
                Some(WorkerEvent::Done { descriptors, .. }) => {
                    descriptors.iter().map(|d| d.id).collect()
                }
                other => panic!("expected done, got {other:?}"),
            }
        };
        let first = ids(collect(&worker, &req));
        let second = ids(collect(&worker, &req));
        assert!(first.iter().all(|id| !second.contains(id)));
    }

    #[tokio::test]
    async fn spawned_batch_streams_to_handle() {
        let req = request(vec![pdf("A", 2)]);
        let mut handle = worker().spawn(req);
        assert_eq!(handle.batch(), BatchId(1));

        let mut kinds = Vec::new();
        while let Some(BatchEvent { batch, event }) = handle.recv().await {
            assert_eq!(batch, BatchId(1));
            let terminal = event.is_terminal();
            kinds.push(event);
            if terminal {
                break;
            }
        }
        assert_eq!(kinds.len(), 5);
        assert!(matches!(kinds.last(), Some(WorkerEvent::Done { .. })));
        assert_eq!(SourceIndex(0), match &kinds[0] {
            WorkerEvent::PageReady { descriptor } => descriptor.source_index,
            other => panic!("unexpected {other:?}"),
        });
    }
}
