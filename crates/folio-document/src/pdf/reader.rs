// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader — open an uploaded PDF and inspect its pages (page tree lookup,
// inherited attributes, content stream validation) using the `lopdf` crate.

use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId, Stream};
use folio_core::error::FolioError;
use tracing::{debug, instrument};

/// Page attributes that a page may inherit from its ancestors in the page
/// tree (ISO 32000-1, table 30).
pub const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against malformed page trees whose `/Parent` chain loops.
const MAX_TREE_DEPTH: usize = 64;

/// US Letter, used when neither the page nor its ancestors carry a MediaBox.
const DEFAULT_MEDIA_BOX: (f32, f32) = (612.0, 792.0);

/// Read-only view over a parsed PDF.
///
/// Wraps `lopdf::Document` and caches the page order so pages can be
/// addressed by their 0-based index.
#[derive(Debug)]
pub struct PdfReader {
    /// The underlying lopdf document.
    document: Document,
    /// Page object ids in page order.
    page_ids: Vec<ObjectId>,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Parse PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, FolioError> {
        let document = Document::load_mem(data).map_err(|err| {
            FolioError::PdfError(format!("failed to load PDF from memory: {err}"))
        })?;
        Ok(Self::from_document(document))
    }

    /// Wrap an already-parsed document.
    pub fn from_document(document: Document) -> Self {
        // `get_pages` is keyed by 1-based page number, so values come out in
        // page order.
        let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();
        debug!(pages = page_ids.len(), "PDF page tree read");
        Self { document, page_ids }
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Object id of the page at `page_index` (0-based).
    pub fn page_id(&self, page_index: u32) -> Result<ObjectId, FolioError> {
        self.page_ids
            .get(page_index as usize)
            .copied()
            .ok_or_else(|| {
                FolioError::PdfError(format!(
                    "page {} out of range (document has {} pages)",
                    page_index,
                    self.page_ids.len()
                ))
            })
    }

    /// Look up `key` on the page or, failing that, on its ancestors.
    ///
    /// References are resolved, so the returned object is never an
    /// `Object::Reference`.
    pub fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        self.inherited_entry(page_id, key).and_then(|value| self.resolve(value))
    }

    /// Like [`inherited`](Self::inherited) but returns the entry as written,
    /// so an indirect reference stays a reference.
    pub fn inherited_entry(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = page_id;
        for _ in 0..MAX_TREE_DEPTH {
            let dict = self.document.get_dictionary(current).ok()?;
            if let Ok(value) = dict.get(key) {
                return Some(value);
            }
            current = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
        }
        None
    }

    /// Width and height of the page in PDF points, taken from its (possibly
    /// inherited) MediaBox.
    pub fn media_size(&self, page_index: u32) -> Result<(f32, f32), FolioError> {
        let [x0, y0, x1, y1] = self.media_box(page_index)?;
        Ok((x1 - x0, y1 - y0))
    }

    /// The page's MediaBox as `[left, bottom, right, top]` in user space.
    pub fn media_box(&self, page_index: u32) -> Result<[f32; 4], FolioError> {
        let page_id = self.page_id(page_index)?;
        let Some(media_box) = self.inherited(page_id, b"MediaBox") else {
            return Ok([0.0, 0.0, DEFAULT_MEDIA_BOX.0, DEFAULT_MEDIA_BOX.1]);
        };

        let values = media_box
            .as_array()
            .map_err(|err| FolioError::PdfError(format!("MediaBox is not an array: {err}")))?;
        if values.len() != 4 {
            return Err(FolioError::PdfError(format!(
                "MediaBox has {} entries, expected 4",
                values.len()
            )));
        }

        let mut coords = [0f32; 4];
        for (slot, value) in coords.iter_mut().zip(values) {
            *slot = self
                .resolve(value)
                .and_then(number)
                .ok_or_else(|| FolioError::PdfError("MediaBox entry is not a number".into()))?;
        }

        let (left, right) = (coords[0].min(coords[2]), coords[0].max(coords[2]));
        let (bottom, top) = (coords[1].min(coords[3]), coords[1].max(coords[3]));
        let (width, height) = (right - left, top - bottom);
        if width < 1.0 || height < 1.0 || !width.is_finite() || !height.is_finite() {
            return Err(FolioError::PdfError(format!(
                "degenerate MediaBox {width}x{height}"
            )));
        }
        Ok([left, bottom, right, top])
    }

    /// The page's own (possibly inherited) `/Rotate`, normalised to 0..360.
    pub fn page_rotation(&self, page_index: u32) -> Result<i64, FolioError> {
        let page_id = self.page_id(page_index)?;
        let rotate = self
            .inherited(page_id, b"Rotate")
            .and_then(|obj| obj.as_i64().ok())
            .unwrap_or(0);
        Ok(rotate.rem_euclid(360))
    }

    /// Check that every content stream of the page resolves and parses.
    ///
    /// A page without `/Contents` is a valid blank page.
    #[instrument(skip(self))]
    pub fn validate_page(&self, page_index: u32) -> Result<(), FolioError> {
        let page_id = self.page_id(page_index)?;
        let page = self
            .document
            .get_dictionary(page_id)
            .map_err(|err| FolioError::PdfError(format!("page object unreadable: {err}")))?;

        let contents = match page.get(b"Contents") {
            Ok(contents) => contents,
            Err(_) => return Ok(()),
        };

        for stream in self.content_streams(contents)? {
            Content::decode(&decoded(stream)?).map_err(|err| {
                FolioError::PdfError(format!("content stream cannot be parsed: {err}"))
            })?;
        }
        Ok(())
    }

    /// Decoded content of the page, streams joined by line breaks. A page
    /// without `/Contents` has empty content.
    pub fn page_content(&self, page_index: u32) -> Result<Vec<u8>, FolioError> {
        let page_id = self.page_id(page_index)?;
        let page = self
            .document
            .get_dictionary(page_id)
            .map_err(|err| FolioError::PdfError(format!("page object unreadable: {err}")))?;
        let Ok(contents) = page.get(b"Contents") else {
            return Ok(Vec::new());
        };

        let mut content = Vec::new();
        for stream in self.content_streams(contents)? {
            content.extend(decoded(stream)?);
            content.push(b'\n');
        }
        Ok(content)
    }

    // -- Helpers --------------------------------------------------------------

    /// Follow an indirect reference; direct objects come back unchanged.
    pub fn resolve<'a>(&'a self, object: &'a Object) -> Option<&'a Object> {
        match object {
            Object::Reference(id) => self.document.get_object(*id).ok(),
            other => Some(other),
        }
    }

    /// Resolve `/Contents` (a stream reference or an array of them).
    fn content_streams<'a>(&'a self, contents: &'a Object) -> Result<Vec<&'a Stream>, FolioError> {
        let resolve_stream = |object: &'a Object| -> Result<&'a Stream, FolioError> {
            let id = object.as_reference().map_err(|_| {
                FolioError::PdfError("content entry is not an indirect reference".into())
            })?;
            self.document
                .get_object(id)
                .and_then(Object::as_stream)
                .map_err(|err| {
                    FolioError::PdfError(format!("content stream {id:?} missing: {err}"))
                })
        };

        match contents {
            Object::Reference(id) => match self.document.get_object(*id) {
                Ok(Object::Array(items)) => items.iter().map(resolve_stream).collect(),
                Ok(Object::Stream(stream)) => Ok(vec![stream]),
                Ok(_) => Err(FolioError::PdfError(format!(
                    "content object {id:?} is not a stream"
                ))),
                Err(err) => Err(FolioError::PdfError(format!(
                    "content stream {id:?} missing: {err}"
                ))),
            },
            Object::Array(items) => items.iter().map(resolve_stream).collect(),
            _ => Err(FolioError::PdfError("/Contents has an invalid type".into())),
        }
    }
}

fn decoded(stream: &Stream) -> Result<Vec<u8>, FolioError> {
    if !stream.dict.has(b"Filter") {
        return Ok(stream.content.clone());
    }
    stream
        .decompressed_content()
        .map_err(|err| FolioError::PdfError(format!("content stream cannot be decoded: {err}")))
}

/// Convert a lopdf numeric object (Integer or Real) to f32.
pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}
