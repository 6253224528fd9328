// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline session — one editing session: the loaded sources, at most one
// running extraction batch, the page model and export.
//
// The session is owned by a single task, which makes it the only writer of
// the page order and page rotations. Adding or removing sources discards the
// order together with the descriptor pool and starts a new batch over all
// sources; events of the superseded batch are dropped.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use folio_core::PipelineConfig;
use folio_core::error::{FolioError, Result};
use folio_core::types::{BatchId, PageIdAllocator, SessionId, SourceIndex, UploadedFile};
use folio_document::source::load_sources;
use folio_document::{AssembledDocument, Assembler, AssemblyOptions, RejectedFile, SourceDocument};
use tracing::{debug, info, instrument, warn};

use crate::observer::PipelineObserver;
use crate::page_model::PageModel;
use crate::protocol::{BatchEvent, ExtractionRequest, ExtractionSummary, WorkerEvent};
use crate::sink::ExportSink;
use crate::worker::{ExtractionHandle, ExtractionWorker};

/// Where extraction currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionState {
    /// Nothing loaded, or the last batch could not start.
    Idle,
    Running(BatchId),
    Finished(ExtractionSummary),
    Failed { batch: BatchId, message: String },
    Cancelled(BatchId),
}

pub struct PipelineSession {
    id: SessionId,
    config: PipelineConfig,
    observer: Arc<dyn PipelineObserver>,
    worker: ExtractionWorker,
    sources: BTreeMap<SourceIndex, Arc<SourceDocument>>,
    next_source_index: u32,
    next_batch: u64,
    /// Dropping the handle cancels the batch, so a dropped session never
    /// leaves a worker running.
    active: Option<ExtractionHandle>,
    state: ExtractionState,
    model: PageModel,
    export_cancel: Arc<AtomicBool>,
}

impl PipelineSession {
    pub fn new(config: PipelineConfig, observer: Arc<dyn PipelineObserver>) -> Self {
        let worker = ExtractionWorker::new(&config, Arc::new(PageIdAllocator::new()));
        Self::with_worker(config, observer, worker)
    }

    /// Use a custom worker (e.g. one with a different page renderer).
    pub fn with_worker(
        config: PipelineConfig,
        observer: Arc<dyn PipelineObserver>,
        worker: ExtractionWorker,
    ) -> Self {
        let id = SessionId::new();
        debug!(session = %id, "session created");
        Self {
            id,
            config,
            observer,
            worker,
            sources: BTreeMap::new(),
            next_source_index: 0,
            next_batch: 0,
            active: None,
            state: ExtractionState::Idle,
            model: PageModel::new(),
            export_cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    // -- Sources --------------------------------------------------------------

    /// Replace every source with `files` and start extracting them.
    ///
    /// Files that cannot be opened are returned (and reported to the
    /// observer); they only block themselves.
    #[instrument(skip_all, fields(session = %self.id, files = files.len()))]
    pub fn load_files(&mut self, files: &[UploadedFile]) -> Result<Vec<RejectedFile>> {
        self.sources.clear();
        self.next_source_index = 0;
        self.add_files(files)
    }

    /// Append `files` to the upload list and re-extract all sources.
    #[instrument(skip_all, fields(session = %self.id, files = files.len()))]
    pub fn add_files(&mut self, files: &[UploadedFile]) -> Result<Vec<RejectedFile>> {
        let report = load_sources(files, self.next_source_index, &self.config);
        self.next_source_index += files.len() as u32;
        for source in report.sources {
            self.sources.insert(source.source_index, source);
        }
        if !report.rejected.is_empty() {
            self.observer.on_sources_rejected(&report.rejected);
        }
        self.restart_extraction()?;
        Ok(report.rejected)
    }

    /// Drop one source and re-extract the rest. Returns `false` if no
    /// source has that index.
    #[instrument(skip(self), fields(session = %self.id))]
    pub fn remove_source(&mut self, index: SourceIndex) -> Result<bool> {
        if self.sources.remove(&index).is_none() {
            return Ok(false);
        }
        if self.sources.is_empty() {
            self.stop_extraction();
            return Ok(true);
        }
        self.restart_extraction()?;
        Ok(true)
    }

    pub fn sources(&self) -> impl Iterator<Item = &Arc<SourceDocument>> {
        self.sources.values()
    }

    pub fn source(&self, index: SourceIndex) -> Option<&Arc<SourceDocument>> {
        self.sources.get(&index)
    }

    fn stop_extraction(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.cancel();
            debug!(batch = %handle.batch(), "batch superseded");
        }
        self.model.reset(None);
        self.state = ExtractionState::Idle;
    }

    fn restart_extraction(&mut self) -> Result<()> {
        self.stop_extraction();
        if self.sources.is_empty() {
            return Err(FolioError::NoSources);
        }

        let request = ExtractionRequest {
            batch: BatchId(self.next_batch),
            sources: self.sources.values().cloned().collect(),
        };
        self.next_batch += 1;

        let total = request.total_pages();
        if total > self.config.max_pages_per_batch {
            return Err(FolioError::BatchTooLarge {
                pages: total,
                limit: self.config.max_pages_per_batch,
            });
        }

        info!(batch = %request.batch, sources = request.sources.len(), total, "extraction started");
        self.model.reset(Some(request.batch));
        self.state = ExtractionState::Running(request.batch);
        self.active = Some(self.worker.spawn(request));
        Ok(())
    }

    // -- Extraction events ----------------------------------------------------

    /// Wait for the next event of the running batch and apply it.
    ///
    /// Returns `None` when no batch is running.
    pub async fn next_event(&mut self) -> Option<WorkerEvent> {
        loop {
            let handle = self.active.as_mut()?;
            let expected = handle.batch();
            let Some(BatchEvent { batch, event }) = handle.recv().await else {
                self.active = None;
                let message = "extraction worker stopped without finishing".to_string();
                self.observer
                    .on_extraction_failed(expected, &FolioError::Worker(message.clone()));
                self.state = ExtractionState::Failed {
                    batch: expected,
                    message: message.clone(),
                };
                return Some(WorkerEvent::Error { message });
            };
            if batch != expected {
                debug!(%batch, %expected, "dropping event of superseded batch");
                continue;
            }
            self.apply(batch, &event);
            return Some(event);
        }
    }

    fn apply(&mut self, batch: BatchId, event: &WorkerEvent) {
        match event {
            WorkerEvent::Progress { fraction } => self.observer.on_progress(batch, *fraction),
            WorkerEvent::PageReady { descriptor } => self.observer.on_page_ready(batch, descriptor),
            WorkerEvent::Done {
                descriptors,
                failed,
            } => {
                self.active = None;
                let summary = ExtractionSummary::from_done(batch, descriptors, failed);
                if let Err(err) = self.model.seed(batch, descriptors.clone()) {
                    warn!(%batch, error = %err, "completion not applied");
                }
                self.state = ExtractionState::Finished(summary);
                self.observer.on_extraction_finished(&summary);
            }
            WorkerEvent::Error { message } => {
                self.active = None;
                self.state = ExtractionState::Failed {
                    batch,
                    message: message.clone(),
                };
                self.observer
                    .on_extraction_failed(batch, &FolioError::Worker(message.clone()));
            }
            WorkerEvent::Cancelled { descriptors } => {
                self.active = None;
                self.state = ExtractionState::Cancelled(batch);
                self.observer.on_extraction_cancelled(batch, descriptors.len());
            }
        }
    }

    /// Drive the running batch to its end.
    pub async fn wait_for_extraction(&mut self) -> Result<ExtractionSummary> {
        while self.next_event().await.is_some() {}
        match &self.state {
            ExtractionState::Finished(summary) => Ok(*summary),
            ExtractionState::Failed { message, .. } => Err(FolioError::Worker(message.clone())),
            ExtractionState::Cancelled(_) => Err(FolioError::Cancelled),
            ExtractionState::Idle | ExtractionState::Running(_) => Err(FolioError::NoSources),
        }
    }

    /// Ask the running batch to stop. The batch still reports a final
    /// `Cancelled` event. Returns `false` if nothing was running.
    pub fn cancel_extraction(&self) -> bool {
        match &self.active {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    pub fn state(&self) -> &ExtractionState {
        &self.state
    }

    pub fn is_extracting(&self) -> bool {
        self.active.is_some()
    }

    // -- Page model -----------------------------------------------------------

    pub fn model(&self) -> &PageModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut PageModel {
        &mut self.model
    }

    // -- Export ---------------------------------------------------------------

    /// Build the output PDF from the current order.
    pub async fn export(&self) -> Result<AssembledDocument> {
        let result = self.assemble().await;
        match &result {
            Ok(document) => self.observer.on_export_finished(document, None),
            Err(err) => self.observer.on_export_failed(err),
        }
        result
    }

    /// Build the output PDF and hand it to `sink`.
    pub async fn export_to(&self, sink: &dyn ExportSink) -> Result<PathBuf> {
        let result = match self.assemble().await {
            Ok(document) => sink.deliver(&document).map(|path| (document, path)),
            Err(err) => Err(err),
        };
        match result {
            Ok((document, path)) => {
                self.observer.on_export_finished(&document, Some(&path));
                Ok(path)
            }
            Err(err) => {
                self.observer.on_export_failed(&err);
                Err(err)
            }
        }
    }

    /// Stop a running export before its next page. Sources are untouched.
    pub fn cancel_export(&self) {
        self.export_cancel.store(true, Ordering::Relaxed);
    }

    #[instrument(skip_all, fields(session = %self.id))]
    async fn assemble(&self) -> Result<AssembledDocument> {
        if self.is_extracting() {
            return Err(FolioError::ExtractionInProgress);
        }
        self.model.check_invariants()?;

        let snapshot = self.model.snapshot();
        let sources = self.sources.clone();
        let options = AssemblyOptions::from(&self.config);
        self.export_cancel.store(false, Ordering::Relaxed);
        let cancel = Arc::clone(&self.export_cancel);

        info!(pages = snapshot.len(), "export started");
        tokio::task::spawn_blocking(move || {
            Assembler::new(&sources, options)
                .with_cancel(cancel)
                .assemble(&snapshot.pages)
        })
        .await
        .map_err(|err| FolioError::Reassembly(format!("export task failed: {err}")))?
    }
}

impl std::fmt::Debug for PipelineSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineSession")
            .field("id", &self.id)
            .field("sources", &self.sources.len())
            .field("state", &self.state)
            .field("pages", &self.model.len())
            .finish()
    }
}
