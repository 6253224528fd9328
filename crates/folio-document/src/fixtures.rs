// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic documents for tests and benchmarks.

use std::io::Cursor;

use ::image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use lopdf::{Dictionary, Document, Object, Stream};

/// Shape of a generated test PDF.
#[derive(Debug, Clone)]
pub struct PdfFixture {
    /// Text prefix written into every page (`<label>-Page-<n>`).
    pub label: String,
    pub pages: u32,
    /// Put the MediaBox (A4) on the /Pages node instead of each page.
    pub media_box_on_parent: bool,
    /// `/Rotate` on the /Pages node.
    pub rotate: Option<i64>,
    /// 0-based pages whose `/Contents` points at a missing object.
    pub corrupt_pages: Vec<u32>,
}

impl PdfFixture {
    pub fn new(label: &str, pages: u32) -> Self {
        Self {
            label: label.to_string(),
            pages,
            media_box_on_parent: false,
            rotate: None,
            corrupt_pages: Vec::new(),
        }
    }
}

/// Build a PDF with one identifiable text line per page and a font shared by
/// all pages.
pub fn build_pdf(fixture: &PdfFixture) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let catalog_id = doc.new_object_id();

    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    let font_id = doc.add_object(Object::Dictionary(font));

    let mut fonts = Dictionary::new();
    fonts.set("F1", Object::Reference(font_id));
    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));
    let resources_id = doc.add_object(Object::Dictionary(resources));

    let mut kids = Vec::new();
    for page_num in 0..fixture.pages {
        let contents = if fixture.corrupt_pages.contains(&page_num) {
            Object::Reference((9_999, 0))
        } else {
            let content = format!(
                "BT /F1 12 Tf 50 700 Td ({}-Page-{}) Tj ET",
                fixture.label,
                page_num + 1
            );
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
            Object::Reference(content_id)
        };

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set("Contents", contents);
        page.set("Resources", Object::Reference(resources_id));
        if !fixture.media_box_on_parent {
            page.set("MediaBox", media_box(612, 792));
        }
        kids.push(Object::Reference(doc.add_object(Object::Dictionary(page))));
    }

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(i64::from(fixture.pages)));
    pages.set("Kids", Object::Array(kids));
    if fixture.media_box_on_parent {
        pages.set("MediaBox", media_box(595, 842));
    }
    if let Some(rotate) = fixture.rotate {
        pages.set("Rotate", Object::Integer(rotate));
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    doc.objects.insert(catalog_id, Object::Dictionary(catalog));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("save fixture PDF");
    buffer
}

/// One US Letter page drawn by `content`, no resources.
pub fn single_page_pdf(content: &str, rotate: Option<i64>) -> Vec<u8> {
    single_page(content, rotate, |_| Dictionary::new())
}

/// One US Letter page whose resources hold `/Im1`, an 8-bit RGB image of
/// `width` x `height` built from `rgb`.
pub fn single_page_pdf_with_image(
    content: &str,
    width: u32,
    height: u32,
    rgb: Vec<u8>,
) -> Vec<u8> {
    let mut image = Dictionary::new();
    image.set("Type", Object::Name(b"XObject".to_vec()));
    image.set("Subtype", Object::Name(b"Image".to_vec()));
    image.set("Width", Object::Integer(i64::from(width)));
    image.set("Height", Object::Integer(i64::from(height)));
    image.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
    image.set("BitsPerComponent", Object::Integer(8));

    single_page(content, None, |doc| {
        let image_id = doc.add_object(Stream::new(image, rgb));
        let mut xobjects = Dictionary::new();
        xobjects.set("Im1", Object::Reference(image_id));
        let mut resources = Dictionary::new();
        resources.set("XObject", Object::Dictionary(xobjects));
        resources
    })
}

fn single_page(
    content: &str,
    rotate: Option<i64>,
    resources: impl FnOnce(&mut Document) -> Dictionary,
) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let resources = resources(&mut doc);
    let pages_id = doc.new_object_id();
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.as_bytes().to_vec()));

    let mut page = Dictionary::new();
    page.set("Type", Object::Name(b"Page".to_vec()));
    page.set("Parent", Object::Reference(pages_id));
    page.set("Contents", Object::Reference(content_id));
    page.set("Resources", Object::Dictionary(resources));
    page.set("MediaBox", media_box(612, 792));
    if let Some(rotate) = rotate {
        page.set("Rotate", Object::Integer(rotate));
    }
    let page_id = doc.add_object(Object::Dictionary(page));

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(1));
    pages.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(Object::Dictionary(catalog));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("save fixture PDF");
    buffer
}

fn media_box(width: i64, height: i64) -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(width),
        Object::Integer(height),
    ])
}

/// An RGB gradient image whose pixels depend on position, so two different
/// sizes or seeds never compare equal.
pub fn gradient_rgb(width: u32, height: u32, seed: u8) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            seed,
        ])
    })
}

pub fn png_bytes(width: u32, height: u32, seed: u8) -> Vec<u8> {
    encode(&DynamicImage::ImageRgb8(gradient_rgb(width, height, seed)), ImageFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32, seed: u8) -> Vec<u8> {
    encode(&DynamicImage::ImageRgb8(gradient_rgb(width, height, seed)), ImageFormat::Jpeg)
}

/// PNG with a left-to-right alpha ramp.
pub fn png_rgba_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, _| {
        Rgba([10, 20, 30, (x * 255 / width.max(1)) as u8])
    });
    encode(&DynamicImage::ImageRgba8(image), ImageFormat::Png)
}

fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), format)
        .expect("encode fixture image");
    buffer
}
