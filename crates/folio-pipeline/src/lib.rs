// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// folio-pipeline — Extraction, ordering, and export for the Folio page
// editor.
//
// A `PipelineSession` owns the loaded sources, runs extraction batches on a
// background worker, keeps the working page order, and exports the result
// through the reassembly engine.

pub mod observer;
pub mod page_model;
pub mod protocol;
pub mod session;
pub mod sink;
pub mod worker;

pub use observer::{NoopObserver, PipelineObserver, TracingObserver};
pub use page_model::{DragState, OrderSnapshot, PageModel};
pub use protocol::{BatchEvent, ExtractionRequest, ExtractionSummary, WorkerEvent};
pub use session::{ExtractionState, PipelineSession};
pub use sink::{DirectorySink, ExportSink};
pub use worker::{ExtractionHandle, ExtractionWorker};
