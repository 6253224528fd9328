// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for reassembly in the folio-document crate.
// Interleaves the pages of two synthetic PDFs and a PNG, which exercises the
// memoised object copy and the image page path in one run.

use std::collections::BTreeMap;
use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use folio_core::PipelineConfig;
use folio_core::types::{
    Dimensions, PageDescriptor, PageId, PageStatus, Rotation, SourceIndex, UploadedFile,
};
use folio_document::fixtures::{PdfFixture, build_pdf, png_bytes};
use folio_document::source::open;
use folio_document::{Assembler, AssemblyOptions, SourceDocument};

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Benchmark a 41-page export: two 20-page PDFs interleaved page by page,
/// with a 256x256 PNG at the front.
fn bench_interleaved_assembly(c: &mut Criterion) {
    let config = PipelineConfig::default();
    let files = [
        UploadedFile::new("A.pdf", "application/pdf", build_pdf(&PdfFixture::new("A", 20))),
        UploadedFile::new("B.pdf", "application/pdf", build_pdf(&PdfFixture::new("B", 20))),
        UploadedFile::new("C.png", "image/png", png_bytes(256, 256, 3)),
    ];

    let mut sources: BTreeMap<SourceIndex, Arc<SourceDocument>> = BTreeMap::new();
    for (i, file) in files.iter().enumerate() {
        let index = SourceIndex(i as u32);
        let source = open(index, file, &config).expect("open bench source");
        sources.insert(index, Arc::new(source));
    }

    let mut next_id = 0;
    let mut descriptor = |source: u32, page: u32| {
        next_id += 1;
        PageDescriptor {
            id: PageId(next_id),
            source_index: SourceIndex(source),
            original_page_index: page,
            thumbnail: None,
            dimensions: Dimensions::default(),
            rotation: Rotation::Deg0,
            status: PageStatus::Ready,
            error: None,
        }
    };
    let mut order = vec![descriptor(2, 0)];
    for page in 0..20 {
        order.push(descriptor(0, page));
        order.push(descriptor(1, 19 - page));
    }

    c.bench_function("assemble interleaved (41 pages)", |b| {
        b.iter(|| {
            let assembler = Assembler::new(&sources, AssemblyOptions::default());
            let output = assembler.assemble(black_box(&order)).expect("assemble");
            black_box(output.bytes.len());
        });
    });
}

criterion_group!(benches, bench_interleaved_assembly);
criterion_main!(benches);
