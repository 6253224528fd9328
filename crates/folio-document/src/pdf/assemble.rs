// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reassembly — build one new PDF from an ordered list of pages taken from any
// number of source documents.
//
// Source pages are deep-copied with every object they reference. Copies are
// memoised per source, so objects shared between pages (fonts, images,
// resource dictionaries) land in the output once and reference cycles
// terminate. Sources are never mutated.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ::image::{GenericImageView, ImageFormat};
use chrono::Utc;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use folio_core::PipelineConfig;
use folio_core::error::{FolioError, Result};
use folio_core::types::{PageDescriptor, Rotation, SourceIndex};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, instrument};

use super::reader::{INHERITABLE_KEYS, PdfReader};
use crate::image::ImageProcessor;
use crate::source::{ImageSource, SourceDocument, SourceHandle};

/// Output settings for reassembly.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyOptions {
    pub pdf_version: String,
    /// Flate-compress streams that are stored uncompressed.
    pub compress: bool,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            pdf_version: "1.7".into(),
            compress: true,
        }
    }
}

impl From<&PipelineConfig> for AssemblyOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            pdf_version: config.output_pdf_version.clone(),
            compress: config.compress_output,
        }
    }
}

/// The finished output, ready to hand to an export sink.
#[derive(Debug, Clone)]
pub struct AssembledDocument {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    /// Suggested download name, `combined_<n>_pages.pdf`.
    pub filename: String,
}

/// Maps an ordered page list back onto the source documents.
pub struct Assembler<'a> {
    sources: &'a BTreeMap<SourceIndex, Arc<SourceDocument>>,
    options: AssemblyOptions,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> Assembler<'a> {
    pub fn new(
        sources: &'a BTreeMap<SourceIndex, Arc<SourceDocument>>,
        options: AssemblyOptions,
    ) -> Self {
        Self {
            sources,
            options,
            cancel: None,
        }
    }

    /// Abort with [`FolioError::Cancelled`] once `flag` is set. Checked
    /// before each page is copied.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Build the output document. Either every page is copied or nothing is
    /// produced.
    #[instrument(skip_all, fields(pages = order.len()))]
    pub fn assemble(&self, order: &[PageDescriptor]) -> Result<AssembledDocument> {
        if order.is_empty() {
            return Err(FolioError::Reassembly("nothing to export".into()));
        }

        let mut output = Document::with_version(self.options.pdf_version.as_str());
        let pages_id = output.new_object_id();
        let mut copiers: HashMap<SourceIndex, PageCopier<'_>> = HashMap::new();
        let mut kids = Vec::with_capacity(order.len());

        for (position, page) in order.iter().enumerate() {
            if self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Err(FolioError::Cancelled);
            }

            let source = self.sources.get(&page.source_index).ok_or_else(|| {
                FolioError::Reassembly(format!(
                    "page {} refers to source {} which is no longer loaded",
                    page.id, page.source_index
                ))
            })?;

            let page_id = match &source.handle {
                SourceHandle::Pdf(reader) => {
                    let copier = copiers
                        .entry(page.source_index)
                        .or_insert_with(|| PageCopier::new(reader.document()));
                    copier.copy_page(&mut output, reader, page, pages_id)?
                }
                SourceHandle::Image(image) => {
                    if page.original_page_index != 0 {
                        return Err(FolioError::Reassembly(format!(
                            "image source {} has no page {}",
                            page.source_index, page.original_page_index
                        )));
                    }
                    add_image_page(&mut output, image, page.rotation, pages_id)?
                }
            };
            debug!(position, page = %page.id, source = %page.source_index, "page copied");
            kids.push(Object::Reference(page_id));
        }

        let page_count = kids.len();
        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Kids", Object::Array(kids));
        pages.set("Count", Object::Integer(page_count as i64));
        output.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = output.add_object(Object::Dictionary(catalog));
        output.trailer.set("Root", Object::Reference(catalog_id));

        let mut info_dict = Dictionary::new();
        info_dict.set("Producer", Object::string_literal("Folio"));
        info_dict.set(
            "CreationDate",
            Object::string_literal(Utc::now().format("D:%Y%m%d%H%M%SZ").to_string()),
        );
        let info_id = output.add_object(Object::Dictionary(info_dict));
        output.trailer.set("Info", Object::Reference(info_id));

        if self.options.compress {
            output.compress();
        }

        let mut bytes = Vec::new();
        output
            .save_to(&mut bytes)
            .map_err(|err| FolioError::Reassembly(format!("failed to write output PDF: {err}")))?;

        info!(page_count, bytes = bytes.len(), "output assembled");
        Ok(AssembledDocument {
            bytes,
            page_count,
            filename: format!("combined_{page_count}_pages.pdf"),
        })
    }
}

/// Deep-copies pages of one source into the output document.
struct PageCopier<'s> {
    source: &'s Document,
    /// Source object id -> output object id.
    copied: HashMap<ObjectId, ObjectId>,
}

impl<'s> PageCopier<'s> {
    fn new(source: &'s Document) -> Self {
        Self {
            source,
            copied: HashMap::new(),
        }
    }

    fn copy_page(
        &mut self,
        target: &mut Document,
        reader: &PdfReader,
        page: &PageDescriptor,
        pages_id: ObjectId,
    ) -> Result<ObjectId> {
        let missing = |err: FolioError| {
            FolioError::Reassembly(format!(
                "source {} page {}: {err}",
                page.source_index, page.original_page_index
            ))
        };
        let source = self.source;
        let source_page_id = reader.page_id(page.original_page_index).map_err(missing)?;
        let source_page = source.get_dictionary(source_page_id).map_err(|err| {
            FolioError::Reassembly(format!("page object {source_page_id:?} unreadable: {err}"))
        })?;

        // Registered first so annotations pointing back at their page resolve
        // to the copy.
        let page_id = target.new_object_id();
        self.copied.insert(source_page_id, page_id);

        let mut copy = Dictionary::new();
        for (key, value) in source_page.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            copy.set(key.clone(), self.copy_object(target, value)?);
        }
        for key in INHERITABLE_KEYS {
            if !source_page.has(key)
                && let Some(value) = reader.inherited_entry(source_page_id, key)
            {
                copy.set(key.to_vec(), self.copy_object(target, value)?);
            }
        }

        let inherent = reader.page_rotation(page.original_page_index).map_err(missing)?;
        let rotate = (inherent + i64::from(page.rotation.degrees())) % 360;
        copy.set("Rotate", Object::Integer(rotate));
        copy.set("Parent", Object::Reference(pages_id));

        target.objects.insert(page_id, Object::Dictionary(copy));
        Ok(page_id)
    }

    fn copy_object(&mut self, target: &mut Document, object: &Object) -> Result<Object> {
        match object {
            Object::Reference(id) => self.copy_reference(target, *id),
            Object::Dictionary(dict) => Ok(Object::Dictionary(self.copy_dictionary(target, dict)?)),
            Object::Array(items) => items
                .iter()
                .map(|item| self.copy_object(target, item))
                .collect::<Result<Vec<_>>>()
                .map(Object::Array),
            Object::Stream(stream) => {
                let dict = self.copy_dictionary(target, &stream.dict)?;
                let content = stream.content.clone();
                Ok(Object::Stream(
                    Stream::new(dict, content).with_compression(stream.allows_compression),
                ))
            }
            other => Ok(other.clone()),
        }
    }

    fn copy_dictionary(&mut self, target: &mut Document, dict: &Dictionary) -> Result<Dictionary> {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            copy.set(key.clone(), self.copy_object(target, value)?);
        }
        Ok(copy)
    }

    fn copy_reference(&mut self, target: &mut Document, id: ObjectId) -> Result<Object> {
        if let Some(mapped) = self.copied.get(&id) {
            return Ok(Object::Reference(*mapped));
        }
        let source = self.source;
        let object = source
            .get_object(id)
            .map_err(|err| FolioError::Reassembly(format!("object {id:?} unresolved: {err}")))?;

        // Pages outside the copied set (link targets, the old page tree) are
        // not pulled into the output.
        if is_page_tree_node(object) {
            return Ok(Object::Null);
        }

        let new_id = target.new_object_id();
        self.copied.insert(id, new_id);
        let copy = self.copy_object(target, object)?;
        target.objects.insert(new_id, copy);
        Ok(Object::Reference(new_id))
    }
}

fn is_page_tree_node(object: &Object) -> bool {
    let Object::Dictionary(dict) = object else {
        return false;
    };
    dict.get(b"Type")
        .and_then(Object::as_name)
        .is_ok_and(|name| name == b"Page" || name == b"Pages")
}

/// Add a page that shows `image` at one point per pixel.
fn add_image_page(
    target: &mut Document,
    image: &ImageSource,
    rotation: Rotation,
    pages_id: ObjectId,
) -> Result<ObjectId> {
    let xobject_id = add_image_xobject(target, image)?;
    let (width, height) = (image.width, image.height);

    let content = format!("q {width} 0 0 {height} 0 0 cm /Im0 Do Q");
    let content_id = target.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

    let mut xobjects = Dictionary::new();
    xobjects.set("Im0", Object::Reference(xobject_id));
    let mut resources = Dictionary::new();
    resources.set("XObject", Object::Dictionary(xobjects));

    let mut page = Dictionary::new();
    page.set("Type", Object::Name(b"Page".to_vec()));
    page.set("Parent", Object::Reference(pages_id));
    page.set(
        "MediaBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(i64::from(width)),
            Object::Integer(i64::from(height)),
        ]),
    );
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Reference(content_id));
    page.set("Rotate", Object::Integer(i64::from(rotation.degrees())));
    Ok(target.add_object(Object::Dictionary(page)))
}

/// Embed the original image. JPEG data whose components map onto a PDF
/// device space is stored untouched; every other image is decoded and stored
/// as Flate-compressed RGB with an optional soft mask for alpha.
fn add_image_xobject(target: &mut Document, image: &ImageSource) -> Result<ObjectId> {
    let decoded = ImageProcessor::from_bytes(&image.bytes)?.into_dynamic();
    let (width, height) = decoded.dimensions();

    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(i64::from(width)));
    dict.set("Height", Object::Integer(i64::from(height)));
    dict.set("BitsPerComponent", Object::Integer(8));

    let passthrough = match image.format {
        ImageFormat::Jpeg => jpeg_layout(&image.bytes).and_then(JpegLayout::device_space),
        _ => None,
    };

    let content = if let Some((space, inverted)) = passthrough {
        dict.set("ColorSpace", Object::Name(space.to_vec()));
        if inverted {
            // Adobe writes CMYK JPEGs with inverted samples.
            let decode = [1, 0, 1, 0, 1, 0, 1, 0].map(Object::Integer);
            dict.set("Decode", Object::Array(decode.to_vec()));
        }
        dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
        image.bytes.to_vec()
    } else {
        if decoded.color().has_alpha() {
            let alpha: Vec<u8> = decoded.to_rgba8().pixels().map(|px| px[3]).collect();
            let mut mask = Dictionary::new();
            mask.set("Type", Object::Name(b"XObject".to_vec()));
            mask.set("Subtype", Object::Name(b"Image".to_vec()));
            mask.set("Width", Object::Integer(i64::from(width)));
            mask.set("Height", Object::Integer(i64::from(height)));
            mask.set("ColorSpace", Object::Name(b"DeviceGray".to_vec()));
            mask.set("BitsPerComponent", Object::Integer(8));
            mask.set("Filter", Object::Name(b"FlateDecode".to_vec()));
            let mask_stream = Stream::new(mask, deflate(&alpha)?).with_compression(false);
            let mask_id = target.add_object(mask_stream);
            dict.set("SMask", Object::Reference(mask_id));
        }
        dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
        dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
        deflate(decoded.to_rgb8().as_raw())?
    };

    Ok(target.add_object(Stream::new(dict, content).with_compression(false)))
}

/// Frame facts of a JPEG stream, read from its markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegLayout {
    components: u8,
    /// An APP14 "Adobe" segment precedes the frame.
    adobe: bool,
}

impl JpegLayout {
    /// PDF colour space for DCTDecode passthrough, and whether the samples
    /// need an inverting `/Decode`.
    fn device_space(self) -> Option<(&'static [u8], bool)> {
        match (self.components, self.adobe) {
            (1, _) => Some((b"DeviceGray".as_slice(), false)),
            (3, _) => Some((b"DeviceRGB".as_slice(), false)),
            (4, true) => Some((b"DeviceCMYK".as_slice(), true)),
            _ => None,
        }
    }
}

/// Walk the marker segments up to the first start-of-frame.
fn jpeg_layout(data: &[u8]) -> Option<JpegLayout> {
    if data.get(..2)? != [0xFF, 0xD8] {
        return None;
    }
    let mut adobe = false;
    let mut pos = 2;
    loop {
        if *data.get(pos)? != 0xFF {
            return None;
        }
        let marker = *data.get(pos + 1)?;
        pos += 2;
        match marker {
            // Fill byte.
            0xFF => {
                pos -= 1;
                continue;
            }
            0x01 | 0xD0..=0xD8 => continue,
            // Scan or end of image before any frame header.
            0xD9 | 0xDA => return None,
            _ => {}
        }

        let length = usize::from(u16::from_be_bytes([*data.get(pos)?, *data.get(pos + 1)?]));
        let segment = data.get(pos + 2..pos + length.max(2))?;
        match marker {
            // SOF0..SOF15 minus DHT, JPG and DAC.
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                return Some(JpegLayout {
                    components: *segment.get(5)?,
                    adobe,
                });
            }
            0xEE if segment.starts_with(b"Adobe") => adobe = true,
            _ => {}
        }
        pos += length;
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{
        PdfFixture, build_pdf, gradient_rgb, jpeg_bytes, png_bytes, png_rgba_bytes,
    };
    use crate::integrity::hash_bytes;
    use crate::source::open;
    use folio_core::types::{Dimensions, PageId, PageStatus, UploadedFile};

    fn load(files: Vec<UploadedFile>) -> BTreeMap<SourceIndex, Arc<SourceDocument>> {
        files
            .iter()
            .enumerate()
            .map(|(i, file)| {
                let index = SourceIndex(i as u32);
                let source = open(index, file, &PipelineConfig::default()).expect("open source");
                (index, Arc::new(source))
            })
            .collect()
    }

    fn page(id: u64, source: u32, index: u32) -> PageDescriptor {
        PageDescriptor {
            id: PageId(id),
            source_index: SourceIndex(source),
            original_page_index: index,
            thumbnail: None,
            dimensions: Dimensions::default(),
            rotation: Rotation::Deg0,
            status: PageStatus::Ready,
            error: None,
        }
    }

    fn pdf_file(label: &str, pages: u32) -> UploadedFile {
        UploadedFile::new(
            format!("{label}.pdf"),
            "application/pdf",
            build_pdf(&PdfFixture::new(label, pages)),
        )
    }

    fn uncompressed() -> AssemblyOptions {
        AssemblyOptions {
            compress: false,
            ..AssemblyOptions::default()
        }
    }

    fn page_text(reader: &PdfReader, index: u32) -> String {
        String::from_utf8(reader.page_content(index).expect("page content")).expect("utf8")
    }

    fn image_streams(doc: &Document) -> Vec<&Stream> {
        doc.objects
            .values()
            .filter_map(|obj| obj.as_stream().ok())
            .filter(|stream| {
                stream
                    .dict
                    .get(b"Subtype")
                    .and_then(Object::as_name)
                    .is_ok_and(|name| name == b"Image")
            })
            .collect()
    }

    #[test]
    fn interleaves_pages_from_two_sources() {
        let sources = load(vec![pdf_file("A", 3), pdf_file("C", 2)]);
        let order = vec![page(0, 1, 1), page(1, 0, 0), page(2, 0, 2), page(3, 1, 0)];

        let output = Assembler::new(&sources, uncompressed()).assemble(&order).unwrap();
        assert_eq!(output.page_count, 4);
        assert_eq!(output.filename, "combined_4_pages.pdf");

        let reader = PdfReader::from_bytes(&output.bytes).unwrap();
        assert_eq!(reader.page_count(), 4);
        assert!(page_text(&reader, 0).contains("C-Page-2"));
        assert!(page_text(&reader, 1).contains("A-Page-1"));
        assert!(page_text(&reader, 2).contains("A-Page-3"));
        assert!(page_text(&reader, 3).contains("C-Page-1"));
    }

    #[test]
    fn copied_content_matches_source_exactly() {
        let sources = load(vec![pdf_file("A", 2)]);
        let output = Assembler::new(&sources, uncompressed())
            .assemble(&[page(0, 0, 1)])
            .unwrap();

        let out = PdfReader::from_bytes(&output.bytes).unwrap();
        let src = sources[&SourceIndex(0)].pdf().unwrap();
        assert_eq!(
            hash_bytes(&out.page_content(0).unwrap()),
            hash_bytes(&src.page_content(1).unwrap())
        );
    }

    #[test]
    fn shared_font_is_copied_once() {
        let sources = load(vec![pdf_file("A", 3)]);
        let order = vec![page(0, 0, 0), page(1, 0, 1), page(2, 0, 2)];
        let output = Assembler::new(&sources, uncompressed()).assemble(&order).unwrap();

        let doc = Document::load_mem(&output.bytes).unwrap();
        let fonts = doc
            .objects
            .values()
            .filter_map(|obj| obj.as_dict().ok())
            .filter(|dict| dict.get(b"BaseFont").is_ok())
            .count();
        assert_eq!(fonts, 1);
    }

    #[test]
    fn materialises_inherited_media_box_and_adds_rotation() {
        let fixture = PdfFixture {
            media_box_on_parent: true,
            rotate: Some(90),
            ..PdfFixture::new("I", 1)
        };
        let file = UploadedFile::new("I.pdf", "application/pdf", build_pdf(&fixture));
        let sources = load(vec![file]);

        let mut rotated = page(0, 0, 0);
        rotated.rotation = Rotation::Deg270;
        let output = Assembler::new(&sources, AssemblyOptions::default())
            .assemble(&[rotated])
            .unwrap();

        let reader = PdfReader::from_bytes(&output.bytes).unwrap();
        assert_eq!(reader.media_size(0).unwrap(), (595.0, 842.0));
        assert_eq!(reader.page_rotation(0).unwrap(), 0);

        let page_dict = reader.document().get_dictionary(reader.page_id(0).unwrap()).unwrap();
        assert!(page_dict.has(b"MediaBox"));
        assert!(page_dict.has(b"Resources"));
    }

    #[test]
    fn png_becomes_page_of_its_pixel_size() {
        let sources = load(vec![UploadedFile::new("B.png", "image/png", png_bytes(64, 32, 7))]);
        let output = Assembler::new(&sources, AssemblyOptions::default())
            .assemble(&[page(0, 0, 0)])
            .unwrap();

        let reader = PdfReader::from_bytes(&output.bytes).unwrap();
        assert_eq!(reader.media_size(0).unwrap(), (64.0, 32.0));

        let images = image_streams(reader.document());
        assert_eq!(images.len(), 1);
        let pixels = images[0].decompressed_content().unwrap();
        assert_eq!(pixels, gradient_rgb(64, 32, 7).into_raw());
    }

    #[test]
    fn jpeg_is_embedded_untouched() {
        let jpeg = jpeg_bytes(40, 30, 1);
        let sources = load(vec![UploadedFile::new("photo.jpg", "image/jpeg", jpeg.clone())]);
        let output = Assembler::new(&sources, AssemblyOptions::default())
            .assemble(&[page(0, 0, 0)])
            .unwrap();

        let doc = Document::load_mem(&output.bytes).unwrap();
        let images = image_streams(&doc);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].dict.get(b"Filter").and_then(Object::as_name).unwrap(), b"DCTDecode");
        assert_eq!(images[0].content, jpeg);
        assert_eq!(
            images[0].dict.get(b"ColorSpace").and_then(Object::as_name).unwrap(),
            b"DeviceRGB"
        );
    }

    #[test]
    fn grayscale_jpeg_is_embedded_as_device_gray() {
        let gray = ::image::GrayImage::from_fn(20, 10, |x, _| ::image::Luma([(x * 12) as u8]));
        let mut jpeg = Vec::new();
        ::image::DynamicImage::ImageLuma8(gray)
            .write_to(&mut std::io::Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .unwrap();
        let sources = load(vec![UploadedFile::new("g.jpg", "image/jpeg", jpeg.clone())]);
        let output = Assembler::new(&sources, AssemblyOptions::default())
            .assemble(&[page(0, 0, 0)])
            .unwrap();

        let doc = Document::load_mem(&output.bytes).unwrap();
        let images = image_streams(&doc);
        assert_eq!(images[0].content, jpeg);
        assert_eq!(
            images[0].dict.get(b"ColorSpace").and_then(Object::as_name).unwrap(),
            b"DeviceGray"
        );
    }

    /// SOI, optional APP14 "Adobe", a baseline frame header with
    /// `components` components, EOI.
    fn jpeg_markers(components: u8, adobe: bool) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8];
        if adobe {
            data.extend([0xFF, 0xEE, 0x00, 0x0E]);
            data.extend(b"Adobe");
            data.extend([0x00, 0x64, 0x00, 0x00, 0x00, 0x00, 0x02]);
        }
        // A Huffman table segment ahead of the frame must be skipped.
        data.extend([0xFF, 0xC4, 0x00, 0x03, 0x00]);
        let length = 8 + 3 * u16::from(components);
        data.extend([0xFF, 0xC0]);
        data.extend(length.to_be_bytes());
        data.extend([0x08, 0x00, 0x10, 0x00, 0x10, components]);
        for id in 1..=components {
            data.extend([id, 0x11, 0x00]);
        }
        data.extend([0xFF, 0xD9]);
        data
    }

    #[test]
    fn jpeg_layout_reads_frame_components() {
        let gray = jpeg_layout(&jpeg_markers(1, false)).unwrap();
        assert_eq!(gray.device_space(), Some((b"DeviceGray".as_slice(), false)));

        let rgb = jpeg_layout(&jpeg_markers(3, false)).unwrap();
        assert_eq!(rgb.device_space(), Some((b"DeviceRGB".as_slice(), false)));

        assert_eq!(jpeg_layout(&jpeg_bytes(8, 8, 0)).map(|l| l.components), Some(3));
        assert_eq!(jpeg_layout(b"not a jpeg"), None);
    }

    #[test]
    fn adobe_cmyk_jpeg_maps_to_inverted_device_cmyk() {
        let layout = jpeg_layout(&jpeg_markers(4, true)).unwrap();
        assert_eq!(
            layout,
            JpegLayout {
                components: 4,
                adobe: true
            }
        );
        assert_eq!(layout.device_space(), Some((b"DeviceCMYK".as_slice(), true)));
    }

    #[test]
    fn unmarked_four_component_jpeg_is_not_passed_through() {
        let layout = jpeg_layout(&jpeg_markers(4, false)).unwrap();
        assert_eq!(layout.device_space(), None);
        assert_eq!(jpeg_layout(&jpeg_markers(2, true)).unwrap().device_space(), None);
    }

    #[test]
    fn alpha_gets_a_soft_mask() {
        let sources = load(vec![UploadedFile::new("a.png", "image/png", png_rgba_bytes(16, 4))]);
        let output = Assembler::new(&sources, AssemblyOptions::default())
            .assemble(&[page(0, 0, 0)])
            .unwrap();

        let doc = Document::load_mem(&output.bytes).unwrap();
        let images = image_streams(&doc);
        assert_eq!(images.len(), 2);
        assert!(images.iter().any(|stream| stream.dict.has(b"SMask")));
    }

    #[test]
    fn empty_order_is_rejected() {
        let sources = load(vec![pdf_file("A", 1)]);
        let err = Assembler::new(&sources, AssemblyOptions::default())
            .assemble(&[])
            .unwrap_err();
        assert!(matches!(err, FolioError::Reassembly(msg) if msg == "nothing to export"));
    }

    #[test]
    fn missing_source_or_page_aborts() {
        let sources = load(vec![pdf_file("A", 2)]);
        let assembler = Assembler::new(&sources, AssemblyOptions::default());

        assert!(matches!(
            assembler.assemble(&[page(0, 0, 0), page(1, 5, 0)]),
            Err(FolioError::Reassembly(_))
        ));
        assert!(matches!(
            assembler.assemble(&[page(0, 0, 7)]),
            Err(FolioError::Reassembly(_))
        ));
    }

    #[test]
    fn cancelled_before_copy() {
        let sources = load(vec![pdf_file("A", 2)]);
        let flag = Arc::new(AtomicBool::new(true));
        let result = Assembler::new(&sources, AssemblyOptions::default())
            .with_cancel(flag)
            .assemble(&[page(0, 0, 0)]);
        assert!(matches!(result, Err(FolioError::Cancelled)));
    }
}
