// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Export sinks — where a finished document goes.

use std::path::{Path, PathBuf};

use folio_core::error::Result;
use folio_document::AssembledDocument;
use tracing::{info, instrument};

/// Hands a finished document to the outside world (a download, a file).
pub trait ExportSink: Send + Sync {
    /// Deliver the document, returning where it ended up.
    fn deliver(&self, document: &AssembledDocument) -> Result<PathBuf>;
}

/// Writes `<dir>/<filename>`, creating the directory if needed.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ExportSink for DirectorySink {
    #[instrument(skip_all, fields(dir = %self.dir.display(), filename = %document.filename))]
    fn deliver(&self, document: &AssembledDocument) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&document.filename);
        // Write next to the target first so a failed write never leaves a
        // truncated PDF under the final name.
        let partial = path.with_extension("pdf.part");
        std::fs::write(&partial, &document.bytes)?;
        std::fs::rename(&partial, &path)?;
        info!(bytes = document.bytes.len(), "document written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> AssembledDocument {
        AssembledDocument {
            bytes: b"%PDF-1.7\n%%EOF".to_vec(),
            page_count: 2,
            filename: "combined_2_pages.pdf".into(),
        }
    }

    #[test]
    fn writes_into_nested_directory() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let sink = DirectorySink::new(tmp.path().join("out").join("pdfs"));

        let path = sink.deliver(&document()).expect("deliver");
        assert_eq!(path.file_name().unwrap(), "combined_2_pages.pdf");
        assert_eq!(std::fs::read(&path).unwrap(), document().bytes);
        assert!(!path.with_extension("pdf.part").exists());
    }

    #[test]
    fn overwrites_previous_export() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let sink = DirectorySink::new(tmp.path());
        sink.deliver(&document()).expect("first");

        let mut second = document();
        second.bytes = b"%PDF-1.7\nsecond".to_vec();
        let path = sink.deliver(&second).expect("second");
        assert_eq!(std::fs::read(path).unwrap(), second.bytes);
    }
}
