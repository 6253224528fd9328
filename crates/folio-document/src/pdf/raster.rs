// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rasteriser — paint a PDF page's content stream onto a `tiny-skia`
// pixmap at a fixed scale.
//
// Covers what page previews need: paths (fill, stroke, clip), device, ICC,
// indexed and tint colour spaces, text through embedded TrueType/OpenType
// outlines or a dot-matrix fallback, image XObjects (DCT and raw samples
// with soft masks) and form XObjects. Shadings, patterns and Type3 glyph
// procedures are skipped.

use std::collections::HashMap;
use std::rc::Rc;

use ::image::{ImageFormat, Rgb, RgbImage};
use folio_core::error::FolioError;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tiny_skia::{
    Color, FillRule, FilterQuality, IntSize, LineCap, LineJoin, Mask, Paint, Path, PathBuilder,
    Pixmap, PixmapPaint, Stroke, StrokeDash, Transform,
};
use tracing::{debug, instrument};
use ttf_parser::Face;

use super::glyphs;
use super::reader::{PdfReader, number};
use crate::image::processor::scaled_size;

/// Nesting limit for form XObjects drawing other forms.
const MAX_FORM_DEPTH: usize = 8;

/// Colour space lookups through named resources.
const MAX_SPACE_DEPTH: u8 = 4;

/// Images above this many pixels are not decoded for previews.
const MAX_IMAGE_PIXELS: u64 = 40_000_000;

/// Rasterise page `page_index` with both axes scaled by `scale`, the longer
/// side capped at `max_side`. The page's own `/Rotate` is applied, so the
/// result is upright as a viewer would show it.
#[instrument(skip(reader))]
pub fn rasterize_page(
    reader: &PdfReader,
    page_index: u32,
    scale: f32,
    max_side: u32,
) -> Result<RgbImage, FolioError> {
    let [left, bottom, right, top] = reader.media_box(page_index)?;
    let (width, height) = (right - left, top - bottom);
    let rotation = reader.page_rotation(page_index)?;
    let (view_w, view_h) = if rotation % 180 == 90 {
        (height, width)
    } else {
        (width, height)
    };

    let (px_w, px_h) = scaled_size(view_w, view_h, scale, max_side);
    let (kx, ky) = (px_w as f32 / view_w, px_h as f32 / view_h);

    // Clockwise page rotation in y-up space, then flip into pixel rows.
    let turn = match rotation {
        90 => Matrix::new(0.0, -1.0, 1.0, 0.0, 0.0, width),
        180 => Matrix::new(-1.0, 0.0, 0.0, -1.0, width, height),
        270 => Matrix::new(0.0, 1.0, -1.0, 0.0, height, 0.0),
        _ => Matrix::IDENTITY,
    };
    let base = Matrix::translate(-left, -bottom)
        .then(turn)
        .then(Matrix::new(kx, 0.0, 0.0, -ky, 0.0, ky * view_h));

    let mut canvas = Pixmap::new(px_w, px_h)
        .ok_or_else(|| FolioError::PdfError(format!("cannot allocate a {px_w}x{px_h} canvas")))?;
    canvas.fill(Color::WHITE);

    let page_id = reader.page_id(page_index)?;
    let data = reader.page_content(page_index)?;
    let content = Content::decode(&data)
        .map_err(|err| FolioError::PdfError(format!("content stream cannot be parsed: {err}")))?;
    let resources = reader
        .inherited(page_id, b"Resources")
        .and_then(|object| object.as_dict().ok());

    let mut painter = Painter::new(reader.document(), &mut canvas, base);
    painter.execute(&content.operations, resources, 0);

    Ok(into_rgb(&canvas))
}

// -- Geometry -----------------------------------------------------------------

/// Affine matrix in PDF order `[a b c d e f]`: x' = ax + cy + e,
/// y' = bx + dy + f.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    const fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    const fn translate(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    const fn scale(sx: f32, sy: f32) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    fn from_values(values: &[f32]) -> Option<Self> {
        match values {
            &[a, b, c, d, e, f, ..] => Some(Self::new(a, b, c, d, e, f)),
            _ => None,
        }
    }

    /// `self` applied first, then `next`.
    fn then(self, next: Self) -> Self {
        Self {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
            e: self.e * next.a + self.f * next.c + next.e,
            f: self.e * next.b + self.f * next.d + next.f,
        }
    }

    fn to_transform(self) -> Transform {
        Transform::from_row(self.a, self.b, self.c, self.d, self.e, self.f)
    }
}

// -- Colour -------------------------------------------------------------------

#[derive(Debug, Clone)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    Indexed {
        base: Box<ColorSpace>,
        high: usize,
        lookup: Rc<[u8]>,
    },
    /// Separation and DeviceN, shown as the darkness of the tints.
    Tint(usize),
    Pattern,
}

impl ColorSpace {
    fn components(&self) -> usize {
        match self {
            Self::Gray | Self::Indexed { .. } => 1,
            Self::Rgb => 3,
            Self::Cmyk => 4,
            Self::Tint(n) => *n,
            Self::Pattern => 0,
        }
    }

    fn initial(&self) -> Option<[f32; 3]> {
        match self {
            Self::Pattern => None,
            Self::Tint(_) => Some([0.0; 3]),
            Self::Indexed { .. } => self.to_rgb(&[0.0]),
            _ => Some([0.0; 3]),
        }
    }

    /// Colour for component `values`; indexed spaces take the raw index.
    fn to_rgb(&self, values: &[f32]) -> Option<[f32; 3]> {
        let at = |i: usize| values.get(i).copied().unwrap_or(0.0);
        match self {
            Self::Gray => Some([at(0); 3]),
            Self::Rgb => Some([at(0), at(1), at(2)]),
            Self::Cmyk => {
                let k = 1.0 - at(3);
                Some([(1.0 - at(0)) * k, (1.0 - at(1)) * k, (1.0 - at(2)) * k])
            }
            Self::Indexed { base, high, lookup } => {
                let index = (at(0).round().max(0.0) as usize).min(*high);
                let n = base.components();
                let entry = lookup.get(index * n..index * n + n)?;
                let mut components = [0f32; 4];
                for (slot, byte) in components.iter_mut().zip(entry) {
                    *slot = f32::from(*byte) / 255.0;
                }
                base.to_rgb(&components[..n.min(4)])
            }
            Self::Tint(n) => {
                let ink = (0..*n).map(at).fold(0.0f32, f32::max);
                Some([1.0 - ink; 3])
            }
            Self::Pattern => None,
        }
    }
}

// -- Fonts --------------------------------------------------------------------

#[derive(Debug, Default)]
struct PdfFont {
    /// Type0 fonts read two-byte codes (Identity encodings).
    two_byte: bool,
    first_char: u32,
    widths: Vec<f32>,
    cid_widths: HashMap<u32, f32>,
    default_width: f32,
    /// Embedded TrueType or OpenType program that `ttf-parser` accepts.
    program: Option<Vec<u8>>,
    /// CIDToGIDMap stream, big-endian glyph ids indexed by CID.
    cid_to_gid: Option<Vec<u8>>,
}

impl PdfFont {
    fn fallback() -> Self {
        Self {
            default_width: glyphs::FALLBACK_ADVANCE,
            ..Self::default()
        }
    }

    /// Advance of `code` in 1/1000 text space units.
    fn width(&self, code: u32) -> f32 {
        if self.two_byte {
            return self.cid_widths.get(&code).copied().unwrap_or(self.default_width);
        }
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .unwrap_or(self.default_width)
    }

    fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| match pair {
                    [hi, lo] => u32::from(*hi) << 8 | u32::from(*lo),
                    [single] => u32::from(*single),
                    _ => 0,
                })
                .collect()
        } else {
            bytes.iter().map(|b| u32::from(*b)).collect()
        }
    }

    fn glyph(&self, face: &Face<'_>, code: u32) -> Option<ttf_parser::GlyphId> {
        if !self.two_byte {
            return glyphs::simple_glyph(face, code);
        }
        let gid = match &self.cid_to_gid {
            Some(map) => {
                let at = code as usize * 2;
                u16::from_be_bytes([*map.get(at)?, *map.get(at + 1)?])
            }
            None => u16::try_from(code).ok()?,
        };
        Some(ttf_parser::GlyphId(gid))
    }
}

// -- Graphics state -------------------------------------------------------------

#[derive(Debug, Clone)]
struct TextState {
    font: Option<Rc<PdfFont>>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    h_scale: f32,
    leading: f32,
    rise: f32,
    render_mode: i64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            render_mode: 0,
        }
    }
}

#[derive(Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill_space: ColorSpace,
    fill: Option<[f32; 3]>,
    stroke_space: ColorSpace,
    stroke: Option<[f32; 3]>,
    fill_alpha: f32,
    stroke_alpha: f32,
    line_width: f32,
    line_cap: LineCap,
    line_join: LineJoin,
    miter_limit: f32,
    dash: Option<(Vec<f32>, f32)>,
    clip: Option<Rc<Mask>>,
    text: TextState,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            fill_space: ColorSpace::Gray,
            fill: Some([0.0; 3]),
            stroke_space: ColorSpace::Gray,
            stroke: Some([0.0; 3]),
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miter_limit: 10.0,
            dash: None,
            clip: None,
            text: TextState::default(),
        }
    }
}

impl GraphicsState {
    fn stroke_style(&self) -> Stroke {
        Stroke {
            width: self.line_width.max(0.0),
            miter_limit: self.miter_limit.max(1.0),
            line_cap: self.line_cap,
            line_join: self.line_join,
            dash: self.dash.as_ref().and_then(|(array, phase)| {
                let mut array = array.clone();
                if array.len() % 2 == 1 {
                    array.extend_from_within(..);
                }
                StrokeDash::new(array, *phase)
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TextObject {
    matrix: Matrix,
    line: Matrix,
}

impl Default for TextObject {
    fn default() -> Self {
        Self {
            matrix: Matrix::IDENTITY,
            line: Matrix::IDENTITY,
        }
    }
}

// -- Interpreter --------------------------------------------------------------

struct Painter<'a> {
    doc: &'a Document,
    canvas: &'a mut Pixmap,
    /// User space of the page to canvas pixels.
    base: Matrix,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    path: PathBuilder,
    current: (f32, f32),
    subpath_start: (f32, f32),
    pending_clip: Option<FillRule>,
    text: TextObject,
    fonts: HashMap<ObjectId, Rc<PdfFont>>,
}

impl<'a> Painter<'a> {
    fn new(doc: &'a Document, canvas: &'a mut Pixmap, base: Matrix) -> Self {
        Self {
            doc,
            canvas,
            base,
            state: GraphicsState::default(),
            stack: Vec::new(),
            path: PathBuilder::new(),
            current: (0.0, 0.0),
            subpath_start: (0.0, 0.0),
            pending_clip: None,
            text: TextObject::default(),
            fonts: HashMap::new(),
        }
    }

    fn execute(
        &mut self,
        operations: &[Operation],
        resources: Option<&'a Dictionary>,
        depth: usize,
    ) {
        for op in operations {
            let operands = op.operands.as_slice();
            let nums = numbers(operands);
            match op.operator.as_str() {
                // Graphics state
                "q" => self.stack.push(self.state.clone()),
                "Q" => {
                    if let Some(saved) = self.stack.pop() {
                        self.state = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_values(&nums) {
                        self.state.ctm = m.then(self.state.ctm);
                    }
                }
                "w" => {
                    if let Some(&width) = nums.first() {
                        self.state.line_width = width;
                    }
                }
                "J" => {
                    self.state.line_cap = match nums.first().map(|v| *v as i64) {
                        Some(1) => LineCap::Round,
                        Some(2) => LineCap::Square,
                        _ => LineCap::Butt,
                    };
                }
                "j" => {
                    self.state.line_join = match nums.first().map(|v| *v as i64) {
                        Some(1) => LineJoin::Round,
                        Some(2) => LineJoin::Bevel,
                        _ => LineJoin::Miter,
                    };
                }
                "M" => {
                    if let Some(&limit) = nums.first() {
                        self.state.miter_limit = limit;
                    }
                }
                "d" => {
                    let array = operands
                        .first()
                        .and_then(|o| o.as_array().ok())
                        .map(|items| numbers(items))
                        .unwrap_or_default();
                    let phase = operands.get(1).and_then(number).unwrap_or(0.0);
                    self.state.dash = (!array.is_empty()).then_some((array, phase));
                }
                "gs" => self.apply_ext_state(resources, operands),

                // Path construction
                "m" => {
                    if let &[x, y, ..] = nums.as_slice() {
                        self.path.move_to(x, y);
                        self.current = (x, y);
                        self.subpath_start = (x, y);
                    }
                }
                "l" => {
                    if let &[x, y, ..] = nums.as_slice() {
                        self.path.line_to(x, y);
                        self.current = (x, y);
                    }
                }
                "c" => {
                    if let &[x1, y1, x2, y2, x3, y3, ..] = nums.as_slice() {
                        self.path.cubic_to(x1, y1, x2, y2, x3, y3);
                        self.current = (x3, y3);
                    }
                }
                "v" => {
                    if let &[x2, y2, x3, y3, ..] = nums.as_slice() {
                        let (x1, y1) = self.current;
                        self.path.cubic_to(x1, y1, x2, y2, x3, y3);
                        self.current = (x3, y3);
                    }
                }
                "y" => {
                    if let &[x1, y1, x3, y3, ..] = nums.as_slice() {
                        self.path.cubic_to(x1, y1, x3, y3, x3, y3);
                        self.current = (x3, y3);
                    }
                }
                "h" => {
                    self.path.close();
                    self.current = self.subpath_start;
                }
                "re" => {
                    if let &[x, y, w, h, ..] = nums.as_slice() {
                        self.path.move_to(x, y);
                        self.path.line_to(x + w, y);
                        self.path.line_to(x + w, y + h);
                        self.path.line_to(x, y + h);
                        self.path.close();
                        self.current = (x, y);
                        self.subpath_start = (x, y);
                    }
                }

                // Painting
                "S" => self.paint(None, true, false),
                "s" => self.paint(None, true, true),
                "f" | "F" => self.paint(Some(FillRule::Winding), false, false),
                "f*" => self.paint(Some(FillRule::EvenOdd), false, false),
                "B" => self.paint(Some(FillRule::Winding), true, false),
                "B*" => self.paint(Some(FillRule::EvenOdd), true, false),
                "b" => self.paint(Some(FillRule::Winding), true, true),
                "b*" => self.paint(Some(FillRule::EvenOdd), true, true),
                "n" => self.paint(None, false, false),
                "W" => self.pending_clip = Some(FillRule::Winding),
                "W*" => self.pending_clip = Some(FillRule::EvenOdd),

                // Colour
                "g" => self.set_fill(ColorSpace::Gray, &nums),
                "G" => self.set_stroke(ColorSpace::Gray, &nums),
                "rg" => self.set_fill(ColorSpace::Rgb, &nums),
                "RG" => self.set_stroke(ColorSpace::Rgb, &nums),
                "k" => self.set_fill(ColorSpace::Cmyk, &nums),
                "K" => self.set_stroke(ColorSpace::Cmyk, &nums),
                "cs" => {
                    if let Some(space) = operands.first() {
                        self.state.fill_space = self.color_space(resources, space, 0);
                        self.state.fill = self.state.fill_space.initial();
                    }
                }
                "CS" => {
                    if let Some(space) = operands.first() {
                        self.state.stroke_space = self.color_space(resources, space, 0);
                        self.state.stroke = self.state.stroke_space.initial();
                    }
                }
                "sc" | "scn" => self.state.fill = self.state.fill_space.to_rgb(&nums),
                "SC" | "SCN" => self.state.stroke = self.state.stroke_space.to_rgb(&nums),

                // Text
                "BT" => self.text = TextObject::default(),
                "Tc" => {
                    if let Some(&v) = nums.first() {
                        self.state.text.char_spacing = v;
                    }
                }
                "Tw" => {
                    if let Some(&v) = nums.first() {
                        self.state.text.word_spacing = v;
                    }
                }
                "Tz" => {
                    if let Some(&v) = nums.first() {
                        self.state.text.h_scale = v / 100.0;
                    }
                }
                "TL" => {
                    if let Some(&v) = nums.first() {
                        self.state.text.leading = v;
                    }
                }
                "Ts" => {
                    if let Some(&v) = nums.first() {
                        self.state.text.rise = v;
                    }
                }
                "Tr" => {
                    if let Some(&v) = nums.first() {
                        self.state.text.render_mode = v as i64;
                    }
                }
                "Tf" => self.set_font(resources, operands),
                "Td" => {
                    if let &[tx, ty, ..] = nums.as_slice() {
                        self.move_line(tx, ty);
                    }
                }
                "TD" => {
                    if let &[tx, ty, ..] = nums.as_slice() {
                        self.state.text.leading = -ty;
                        self.move_line(tx, ty);
                    }
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_values(&nums) {
                        self.text = TextObject {
                            matrix: m,
                            line: m,
                        };
                    }
                }
                "T*" => self.next_line(),
                "Tj" => {
                    if let Some(bytes) = operands.first().and_then(string_bytes) {
                        self.show_text(bytes);
                    }
                }
                "'" => {
                    self.next_line();
                    if let Some(bytes) = operands.first().and_then(string_bytes) {
                        self.show_text(bytes);
                    }
                }
                "\"" => {
                    if let &[aw, ac, ..] = nums.as_slice() {
                        self.state.text.word_spacing = aw;
                        self.state.text.char_spacing = ac;
                    }
                    self.next_line();
                    if let Some(bytes) = operands.get(2).and_then(string_bytes) {
                        self.show_text(bytes);
                    }
                }
                "TJ" => {
                    let items = operands.first().and_then(|o| o.as_array().ok());
                    for item in items.into_iter().flatten() {
                        match string_bytes(item) {
                            Some(bytes) => self.show_text(bytes),
                            None => {
                                if let Some(adjust) = number(item) {
                                    let text = &self.state.text;
                                    let tx = -adjust / 1000.0 * text.size * text.h_scale;
                                    self.advance(tx);
                                }
                            }
                        }
                    }
                }

                // External objects
                "Do" => {
                    if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                        self.draw_xobject(resources, name, depth);
                    }
                }
                _ => {}
            }
        }
    }

    fn device(&self, matrix: Matrix) -> Transform {
        matrix.then(self.base).to_transform()
    }

    // -- Paths ----------------------------------------------------------------

    fn paint(&mut self, fill: Option<FillRule>, stroke: bool, close: bool) {
        if close {
            self.path.close();
        }
        let path = std::mem::replace(&mut self.path, PathBuilder::new()).finish();
        let transform = self.device(self.state.ctm);

        if let Some(path) = &path {
            if let (Some(rule), Some(rgb)) = (fill, self.state.fill) {
                let paint = solid(rgb, self.state.fill_alpha);
                let clip = self.state.clip.as_deref();
                self.canvas.fill_path(path, &paint, rule, transform, clip);
            }
            if stroke && let Some(rgb) = self.state.stroke {
                let paint = solid(rgb, self.state.stroke_alpha);
                let style = self.state.stroke_style();
                let clip = self.state.clip.as_deref();
                self.canvas.stroke_path(path, &paint, &style, transform, clip);
            }
        }

        if let Some(rule) = self.pending_clip.take() {
            self.clip(path.as_ref(), rule, transform);
        }
    }

    /// Intersect the clip with `path`; no path clips everything away.
    fn clip(&mut self, path: Option<&Path>, rule: FillRule, transform: Transform) {
        let Some(mut mask) = Mask::new(self.canvas.width(), self.canvas.height()) else {
            return;
        };
        if let Some(path) = path {
            mask.fill_path(path, rule, true, transform);
        }
        if let Some(outer) = &self.state.clip {
            for (value, limit) in mask.data_mut().iter_mut().zip(outer.data()) {
                *value = ((u16::from(*value) * u16::from(*limit)) / 255) as u8;
            }
        }
        self.state.clip = Some(Rc::new(mask));
    }

    // -- Colour ---------------------------------------------------------------

    fn set_fill(&mut self, space: ColorSpace, values: &[f32]) {
        self.state.fill = space.to_rgb(values);
        self.state.fill_space = space;
    }

    fn set_stroke(&mut self, space: ColorSpace, values: &[f32]) {
        self.state.stroke = space.to_rgb(values);
        self.state.stroke_space = space;
    }

    fn color_space(
        &self,
        resources: Option<&'a Dictionary>,
        object: &Object,
        depth: u8,
    ) -> ColorSpace {
        match resolve(self.doc, object) {
            Object::Name(name) => match name.as_slice() {
                b"DeviceGray" | b"G" | b"CalGray" => ColorSpace::Gray,
                b"DeviceRGB" | b"RGB" | b"CalRGB" => ColorSpace::Rgb,
                b"DeviceCMYK" | b"CMYK" => ColorSpace::Cmyk,
                b"Pattern" => ColorSpace::Pattern,
                other if depth < MAX_SPACE_DEPTH => {
                    match lookup(self.doc, resources, b"ColorSpace", other) {
                        Some(found) => self.color_space(resources, found, depth + 1),
                        None => ColorSpace::Gray,
                    }
                }
                _ => ColorSpace::Gray,
            },
            Object::Array(items) => self.color_space_family(resources, items, depth),
            _ => ColorSpace::Gray,
        }
    }

    fn color_space_family(
        &self,
        resources: Option<&'a Dictionary>,
        items: &[Object],
        depth: u8,
    ) -> ColorSpace {
        let family = items
            .first()
            .and_then(|o| resolve(self.doc, o).as_name().ok())
            .unwrap_or_default();
        match family {
            b"ICCBased" => {
                let n = items
                    .get(1)
                    .and_then(|o| resolve(self.doc, o).as_stream().ok())
                    .and_then(|s| s.dict.get(b"N").ok())
                    .and_then(|n| n.as_i64().ok());
                match n {
                    Some(1) => ColorSpace::Gray,
                    Some(4) => ColorSpace::Cmyk,
                    _ => ColorSpace::Rgb,
                }
            }
            b"CalGray" => ColorSpace::Gray,
            b"CalRGB" | b"Lab" => ColorSpace::Rgb,
            b"Indexed" | b"I" if depth < MAX_SPACE_DEPTH => {
                let base = items
                    .get(1)
                    .map(|o| self.color_space(resources, o, depth + 1))
                    .unwrap_or(ColorSpace::Rgb);
                let high = items
                    .get(2)
                    .and_then(|o| resolve(self.doc, o).as_i64().ok())
                    .unwrap_or(0)
                    .clamp(0, 255) as usize;
                let lookup: Vec<u8> = match items.get(3).map(|o| resolve(self.doc, o)) {
                    Some(Object::String(bytes, _)) => bytes.clone(),
                    Some(Object::Stream(stream)) => stream_bytes(stream).unwrap_or_default(),
                    _ => Vec::new(),
                };
                ColorSpace::Indexed {
                    base: Box::new(base),
                    high,
                    lookup: Rc::from(lookup),
                }
            }
            b"Separation" => ColorSpace::Tint(1),
            b"DeviceN" => {
                let n = items
                    .get(1)
                    .and_then(|o| resolve(self.doc, o).as_array().ok())
                    .map_or(1, |names| names.len().max(1));
                ColorSpace::Tint(n)
            }
            b"Pattern" => ColorSpace::Pattern,
            _ => ColorSpace::Gray,
        }
    }

    fn apply_ext_state(&mut self, resources: Option<&'a Dictionary>, operands: &[Object]) {
        let Some(name) = operands.first().and_then(|o| o.as_name().ok()) else {
            return;
        };
        let Some(dict) =
            lookup(self.doc, resources, b"ExtGState", name).and_then(|o| o.as_dict().ok())
        else {
            return;
        };
        if let Some(alpha) = dict.get(b"ca").ok().and_then(number) {
            self.state.fill_alpha = alpha;
        }
        if let Some(alpha) = dict.get(b"CA").ok().and_then(number) {
            self.state.stroke_alpha = alpha;
        }
        if let Some(width) = dict.get(b"LW").ok().and_then(number) {
            self.state.line_width = width;
        }
    }

    // -- Text -----------------------------------------------------------------

    fn set_font(&mut self, resources: Option<&'a Dictionary>, operands: &[Object]) {
        if let Some(size) = operands.get(1).and_then(number) {
            self.state.text.size = size;
        }
        let Some(name) = operands.first().and_then(|o| o.as_name().ok()) else {
            return;
        };
        let Some(entry) = lookup_entry(self.doc, resources, b"Font", name) else {
            self.state.text.font = None;
            return;
        };

        let font = match entry {
            Object::Reference(id) => match self.fonts.get(id) {
                Some(font) => Rc::clone(font),
                None => {
                    let font = Rc::new(self.load_font(resolve(self.doc, entry)));
                    self.fonts.insert(*id, Rc::clone(&font));
                    font
                }
            },
            direct => Rc::new(self.load_font(direct)),
        };
        self.state.text.font = Some(font);
    }

    fn load_font(&self, object: &'a Object) -> PdfFont {
        let Ok(dict) = object.as_dict() else {
            return PdfFont::fallback();
        };

        if dict.get(b"Subtype").and_then(Object::as_name).ok() == Some(b"Type0".as_slice()) {
            let descendant = dict
                .get(b"DescendantFonts")
                .ok()
                .map(|o| resolve(self.doc, o))
                .and_then(|o| o.as_array().ok())
                .and_then(|items| items.first())
                .and_then(|o| resolve(self.doc, o).as_dict().ok());
            let Some(descendant) = descendant else {
                return PdfFont {
                    two_byte: true,
                    ..PdfFont::fallback()
                };
            };
            return PdfFont {
                two_byte: true,
                cid_widths: self.cid_widths(descendant),
                default_width: descendant
                    .get(b"DW")
                    .ok()
                    .and_then(number)
                    .unwrap_or(1000.0),
                program: self.font_program(descendant),
                cid_to_gid: descendant
                    .get(b"CIDToGIDMap")
                    .ok()
                    .and_then(|o| resolve(self.doc, o).as_stream().ok())
                    .and_then(stream_bytes),
                ..PdfFont::default()
            };
        }

        let widths = dict
            .get(b"Widths")
            .ok()
            .and_then(|o| resolve(self.doc, o).as_array().ok())
            .map(|items| {
                items
                    .iter()
                    .map(|o| number(resolve(self.doc, o)).unwrap_or(0.0))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let missing = self
            .descriptor(dict)
            .and_then(|d| d.get(b"MissingWidth").ok())
            .and_then(number);
        let default_width = match missing {
            Some(width) => width,
            None if widths.is_empty() => glyphs::FALLBACK_ADVANCE,
            None => 0.0,
        };

        PdfFont {
            two_byte: false,
            first_char: dict
                .get(b"FirstChar")
                .ok()
                .and_then(|o| o.as_i64().ok())
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(0),
            widths,
            default_width,
            program: self.font_program(dict),
            ..PdfFont::default()
        }
    }

    fn descriptor(&self, font: &'a Dictionary) -> Option<&'a Dictionary> {
        font.get(b"FontDescriptor")
            .ok()
            .and_then(|o| resolve(self.doc, o).as_dict().ok())
    }

    /// Embedded program usable for outlines: FontFile2 (TrueType) or an
    /// OpenType FontFile3.
    fn font_program(&self, font: &'a Dictionary) -> Option<Vec<u8>> {
        let descriptor = self.descriptor(font)?;
        let stream = match descriptor.get(b"FontFile2") {
            Ok(object) => resolve(self.doc, object).as_stream().ok()?,
            Err(_) => {
                let stream = resolve(self.doc, descriptor.get(b"FontFile3").ok()?)
                    .as_stream()
                    .ok()?;
                let subtype = stream.dict.get(b"Subtype").and_then(Object::as_name).ok()?;
                if subtype != b"OpenType" {
                    return None;
                }
                stream
            }
        };
        let data = stream_bytes(stream)?;
        if Face::parse(&data, 0).is_err() {
            debug!("embedded font program not parseable");
            return None;
        }
        Some(data)
    }

    /// `/W` of a CID font: `c [w1 w2 ...]` and `c_first c_last w` runs.
    fn cid_widths(&self, descendant: &Dictionary) -> HashMap<u32, f32> {
        let mut widths = HashMap::new();
        let Some(items) = descendant
            .get(b"W")
            .ok()
            .and_then(|o| resolve(self.doc, o).as_array().ok())
        else {
            return widths;
        };

        let mut i = 0;
        while i < items.len() {
            let Some(first) = number(resolve(self.doc, &items[i])) else {
                break;
            };
            let first = first as u32;
            match items.get(i + 1).map(|o| resolve(self.doc, o)) {
                Some(Object::Array(run)) => {
                    for (offset, w) in run.iter().enumerate() {
                        if let Some(w) = number(resolve(self.doc, w)) {
                            widths.insert(first + offset as u32, w);
                        }
                    }
                    i += 2;
                }
                Some(last) => {
                    let (Some(last), Some(w)) = (
                        number(last),
                        items.get(i + 2).and_then(|o| number(resolve(self.doc, o))),
                    ) else {
                        break;
                    };
                    for cid in first..=(last as u32).min(first.saturating_add(0xFFFF)) {
                        widths.insert(cid, w);
                    }
                    i += 3;
                }
                None => break,
            }
        }
        widths
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.text.line = Matrix::translate(tx, ty).then(self.text.line);
        self.text.matrix = self.text.line;
    }

    fn next_line(&mut self) {
        let leading = self.state.text.leading;
        self.move_line(0.0, -leading);
    }

    fn advance(&mut self, tx: f32) {
        self.text.matrix = Matrix::translate(tx, 0.0).then(self.text.matrix);
    }

    fn show_text(&mut self, bytes: &[u8]) {
        let font = self
            .state
            .text
            .font
            .clone()
            .unwrap_or_else(|| Rc::new(PdfFont::fallback()));
        let face = font.program.as_deref().and_then(|data| Face::parse(data, 0).ok());
        let text = self.state.text.clone();

        let visible = !matches!(text.render_mode, 3 | 7) && text.size != 0.0;
        let (rgb, alpha) = if matches!(text.render_mode, 1 | 5) {
            (self.state.stroke, self.state.stroke_alpha)
        } else {
            (self.state.fill, self.state.fill_alpha)
        };
        let paint = rgb.map(|rgb| solid(rgb, alpha));

        for code in font.codes(bytes) {
            if let (true, Some(paint)) = (visible, &paint) {
                let (width, height) = (text.size * text.h_scale, text.size);
                let size = Matrix::new(width, 0.0, 0.0, height, 0.0, text.rise);
                let glyph_space = size
                    .then(self.text.matrix)
                    .then(self.state.ctm);
                let outline = match &face {
                    Some(face) => font
                        .glyph(face, code)
                        .and_then(|glyph| glyphs::program_outline(face, glyph))
                        .map(|(path, units)| (path, Matrix::scale(1.0 / units, 1.0 / units))),
                    None => glyphs::fallback_outline(code).map(|path| (path, Matrix::IDENTITY)),
                };
                if let Some((path, units)) = outline {
                    let transform = self.device(units.then(glyph_space));
                    let clip = self.state.clip.as_deref();
                    self.canvas.fill_path(&path, paint, FillRule::Winding, transform, clip);
                }
            }

            let word = if !font.two_byte && code == 32 {
                text.word_spacing
            } else {
                0.0
            };
            let advance = font.width(code) / 1000.0 * text.size;
            let tx = (advance + text.char_spacing + word) * text.h_scale;
            self.advance(tx);
        }
    }

    // -- XObjects -------------------------------------------------------------

    fn draw_xobject(&mut self, resources: Option<&'a Dictionary>, name: &[u8], depth: usize) {
        let Some(stream) =
            lookup(self.doc, resources, b"XObject", name).and_then(|o| o.as_stream().ok())
        else {
            debug!(name = %String::from_utf8_lossy(name), "XObject not found");
            return;
        };
        match stream.dict.get(b"Subtype").and_then(Object::as_name) {
            Ok(b"Image") => self.draw_image(stream, resources),
            Ok(b"Form") if depth < MAX_FORM_DEPTH => self.draw_form(stream, resources, depth),
            _ => {}
        }
    }

    fn draw_form(&mut self, stream: &'a Stream, resources: Option<&'a Dictionary>, depth: usize) {
        let Some(content) = stream_bytes(stream).and_then(|data| Content::decode(&data).ok()) else {
            debug!("form XObject skipped");
            return;
        };
        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|o| resolve(self.doc, o).as_array().ok())
            .and_then(|items| Matrix::from_values(&numbers(items)))
            .unwrap_or(Matrix::IDENTITY);
        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|o| resolve(self.doc, o).as_dict().ok())
            .or(resources);

        self.stack.push(self.state.clone());
        let outer_path = std::mem::replace(&mut self.path, PathBuilder::new());
        self.state.ctm = matrix.then(self.state.ctm);

        let bbox = stream
            .dict
            .get(b"BBox")
            .ok()
            .and_then(|o| resolve(self.doc, o).as_array().ok())
            .map(|items| numbers(items));
        if let Some(&[x0, y0, x1, y1]) = bbox.as_deref() {
            let mut builder = PathBuilder::new();
            builder.move_to(x0, y0);
            builder.line_to(x1, y0);
            builder.line_to(x1, y1);
            builder.line_to(x0, y1);
            builder.close();
            let transform = self.device(self.state.ctm);
            self.clip(builder.finish().as_ref(), FillRule::Winding, transform);
        }

        self.execute(&content.operations, form_resources, depth + 1);

        self.path = outer_path;
        if let Some(saved) = self.stack.pop() {
            self.state = saved;
        }
    }

    fn draw_image(&mut self, stream: &'a Stream, resources: Option<&'a Dictionary>) {
        let Some(image) = self.decode_image(stream, resources) else {
            debug!("image XObject skipped");
            return;
        };
        // Image space is the unit square, first row at the top.
        let placement = Matrix::new(
            1.0 / image.width() as f32,
            0.0,
            0.0,
            -1.0 / image.height() as f32,
            0.0,
            1.0,
        )
        .then(self.state.ctm);
        let paint = PixmapPaint {
            opacity: self.state.fill_alpha.clamp(0.0, 1.0),
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        let transform = self.device(placement);
        let clip = self.state.clip.as_deref();
        self.canvas
            .draw_pixmap(0, 0, image.as_ref(), &paint, transform, clip);
    }

    fn decode_image(
        &self,
        stream: &'a Stream,
        resources: Option<&'a Dictionary>,
    ) -> Option<Pixmap> {
        let dict = &stream.dict;
        let filters = filter_names(dict);

        if filters.last().is_some_and(|f| f.as_slice() == b"DCTDecode") {
            let decoded = ::image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
                .ok()?
                .to_rgba8();
            let (width, height) = decoded.dimensions();
            let mut rgba = decoded.into_raw();
            self.apply_soft_mask(dict, width, height, &mut rgba);
            return premultiplied(width, height, rgba);
        }
        if filters
            .iter()
            .any(|f| matches!(f.as_slice(), b"JPXDecode" | b"JBIG2Decode" | b"CCITTFaxDecode"))
        {
            return None;
        }

        let width = u32::try_from(dict.get(b"Width").ok()?.as_i64().ok()?).ok()?;
        let height = u32::try_from(dict.get(b"Height").ok()?.as_i64().ok()?).ok()?;
        if width == 0 || height == 0 || u64::from(width) * u64::from(height) > MAX_IMAGE_PIXELS {
            return None;
        }
        let data = stream_bytes(stream)?;
        let is_mask = dict
            .get(b"ImageMask")
            .and_then(Object::as_bool)
            .unwrap_or(false);

        let mut rgba = vec![0u8; width as usize * height as usize * 4];
        if is_mask {
            let rgb = self.state.fill?;
            let inverted = dict
                .get(b"Decode")
                .ok()
                .and_then(|o| o.as_array().ok())
                .and_then(|items| items.first())
                .and_then(number)
                .is_some_and(|first| first >= 1.0);
            let samples = Samples::new(&data, width, 1, 1);
            let color = rgb.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
            for (i, px) in rgba.chunks_exact_mut(4).enumerate() {
                let (row, col) = (i / width as usize, i % width as usize);
                let painted = (samples.get(row, col) == 0) != inverted;
                if painted {
                    px.copy_from_slice(&[color[0], color[1], color[2], 255]);
                }
            }
        } else {
            let bpc = dict
                .get(b"BitsPerComponent")
                .ok()
                .and_then(|o| o.as_i64().ok())
                .unwrap_or(8);
            let bpc = u32::try_from(bpc).ok().filter(|b| matches!(b, 1 | 2 | 4 | 8 | 16))?;
            let space = match dict.get(b"ColorSpace") {
                Ok(object) => self.color_space(resources, object, 0),
                Err(_) => ColorSpace::Gray,
            };
            let n = space.components();
            if n == 0 || n > 8 {
                return None;
            }
            let indexed = matches!(space, ColorSpace::Indexed { .. });
            let max = ((1u32 << bpc) - 1) as f32;
            let samples = Samples::new(&data, width, n, bpc);
            let mut values = [0f32; 8];
            for (i, px) in rgba.chunks_exact_mut(4).enumerate() {
                let (row, col) = (i / width as usize, i % width as usize);
                for (c, slot) in values.iter_mut().take(n).enumerate() {
                    let raw = samples.get(row, col * n + c) as f32;
                    *slot = if indexed { raw } else { raw / max };
                }
                let rgb = space.to_rgb(&values[..n]).unwrap_or([0.0; 3]);
                for (dst, c) in px.iter_mut().zip(rgb) {
                    *dst = (c.clamp(0.0, 1.0) * 255.0).round() as u8;
                }
                px[3] = 255;
            }
        }

        self.apply_soft_mask(dict, width, height, &mut rgba);
        premultiplied(width, height, rgba)
    }

    /// Replace alpha with an 8-bit `/SMask` of the same size, when present.
    fn apply_soft_mask(&self, dict: &Dictionary, width: u32, height: u32, rgba: &mut [u8]) {
        let Some(mask) = dict
            .get(b"SMask")
            .ok()
            .and_then(|o| resolve(self.doc, o).as_stream().ok())
        else {
            return;
        };
        let dimension = |key: &[u8]| mask.dict.get(key).and_then(Object::as_i64).ok();
        let same_size = dimension(b"Width") == Some(i64::from(width))
            && dimension(b"Height") == Some(i64::from(height));
        let Some(data) = same_size.then(|| stream_bytes(mask)).flatten() else {
            return;
        };
        let samples = Samples::new(&data, width, 1, 8);
        for (i, px) in rgba.chunks_exact_mut(4).enumerate() {
            let (row, col) = (i / width as usize, i % width as usize);
            px[3] = samples.get(row, col) as u8;
        }
    }
}

// -- Helpers ------------------------------------------------------------------

/// Packed image samples; every row starts on a byte boundary.
struct Samples<'d> {
    data: &'d [u8],
    bpc: u32,
    row_bytes: usize,
}

impl<'d> Samples<'d> {
    fn new(data: &'d [u8], width: u32, components: usize, bpc: u32) -> Self {
        let row_bits = width as usize * components * bpc as usize;
        Self {
            data,
            bpc,
            row_bytes: row_bits.div_ceil(8),
        }
    }

    /// Sample `index` of row `row`; missing data reads as zero.
    fn get(&self, row: usize, index: usize) -> u32 {
        let start = row * self.row_bytes;
        let byte_at = |i: usize| u32::from(self.data.get(start + i).copied().unwrap_or(0));
        match self.bpc {
            8 => byte_at(index),
            16 => byte_at(index * 2) << 8 | byte_at(index * 2 + 1),
            bpc => {
                let bit = index * bpc as usize;
                let shift = 8 - bpc as usize - bit % 8;
                (byte_at(bit / 8) >> shift) & ((1 << bpc) - 1)
            }
        }
    }
}

fn premultiplied(width: u32, height: u32, mut rgba: Vec<u8>) -> Option<Pixmap> {
    for px in rgba.chunks_exact_mut(4) {
        let alpha = u16::from(px[3]);
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * alpha + 127) / 255) as u8;
        }
    }
    Pixmap::from_vec(rgba, IntSize::from_wh(width, height)?)
}

fn into_rgb(canvas: &Pixmap) -> RgbImage {
    let mut image = RgbImage::new(canvas.width(), canvas.height());
    for (dst, src) in image.pixels_mut().zip(canvas.pixels()) {
        let color = src.demultiply();
        *dst = Rgb([color.red(), color.green(), color.blue()]);
    }
    image
}

fn solid(rgb: [f32; 3], alpha: f32) -> Paint<'static> {
    let mut paint = Paint::default();
    let color = Color::from_rgba(
        rgb[0].clamp(0.0, 1.0),
        rgb[1].clamp(0.0, 1.0),
        rgb[2].clamp(0.0, 1.0),
        alpha.clamp(0.0, 1.0),
    );
    paint.set_color(color.unwrap_or(Color::BLACK));
    paint.anti_alias = true;
    paint
}

fn resolve<'o>(doc: &'o Document, object: &'o Object) -> &'o Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        other => other,
    }
}

/// Raw resource entry `/category /name`, possibly an indirect reference.
fn lookup_entry<'a>(
    doc: &'a Document,
    resources: Option<&'a Dictionary>,
    category: &[u8],
    name: &[u8],
) -> Option<&'a Object> {
    let group = resolve(doc, resources?.get(category).ok()?).as_dict().ok()?;
    group.get(name).ok()
}

fn lookup<'a>(
    doc: &'a Document,
    resources: Option<&'a Dictionary>,
    category: &[u8],
    name: &[u8],
) -> Option<&'a Object> {
    lookup_entry(doc, resources, category, name).map(|entry| resolve(doc, entry))
}

fn numbers(objects: &[Object]) -> Vec<f32> {
    objects.iter().filter_map(number).collect()
}

fn string_bytes(object: &Object) -> Option<&[u8]> {
    match object {
        Object::String(bytes, _) => Some(bytes),
        _ => None,
    }
}

fn filter_names(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|o| o.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

fn stream_bytes(stream: &Stream) -> Option<Vec<u8>> {
    if stream.dict.has(b"Filter") {
        stream.decompressed_content().ok()
    } else {
        Some(stream.content.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{PdfFixture, build_pdf, single_page_pdf};

    fn render(bytes: &[u8], scale: f32) -> RgbImage {
        let reader = PdfReader::from_bytes(bytes).unwrap();
        rasterize_page(&reader, 0, scale, 4096).unwrap()
    }

    fn is_red(px: &Rgb<u8>) -> bool {
        px[0] > 200 && px[1] < 60 && px[2] < 60
    }

    fn dark_pixels(image: &RgbImage) -> usize {
        image
            .pixels()
            .filter(|px| u32::from(px[0]) + u32::from(px[1]) + u32::from(px[2]) < 3 * 128)
            .count()
    }

    #[test]
    fn matrix_then_applies_left_first() {
        let m = Matrix::translate(10.0, 0.0).then(Matrix::scale(2.0, 2.0));
        assert_eq!(m, Matrix::new(2.0, 0.0, 0.0, 2.0, 20.0, 0.0));
    }

    #[test]
    fn filled_rectangle_lands_bottom_left() {
        let pdf = single_page_pdf("1 0 0 rg 0 0 100 100 re f", None);
        let image = render(&pdf, 0.5);

        assert_eq!(image.dimensions(), (306, 396));
        assert!(is_red(image.get_pixel(10, 390)));
        assert!(is_red(image.get_pixel(45, 350)));
        assert_eq!(image.get_pixel(10, 10), &Rgb([255, 255, 255]));
        assert_eq!(image.get_pixel(60, 390), &Rgb([255, 255, 255]));
    }

    #[test]
    fn page_rotation_turns_content_clockwise() {
        // Bottom-left of the page ends up top-left after a quarter turn.
        let pdf = single_page_pdf("1 0 0 rg 0 0 100 100 re f", Some(90));
        let image = render(&pdf, 0.5);

        assert_eq!(image.dimensions(), (396, 306));
        assert!(is_red(image.get_pixel(10, 10)));
        assert_eq!(image.get_pixel(10, 300), &Rgb([255, 255, 255]));
    }

    #[test]
    fn graphics_state_is_restored() {
        let pdf = single_page_pdf(
            "q 2 0 0 2 0 0 cm 0 1 0 rg Q 1 0 0 rg 300 300 50 50 re f",
            None,
        );
        let image = render(&pdf, 1.0);
        // Unscaled square at x 300..350, pixel rows 442..492.
        assert!(is_red(image.get_pixel(325, 467)));
        // Where the doubled square would have landed.
        assert_eq!(image.get_pixel(605, 150), &Rgb([255, 255, 255]));
    }

    #[test]
    fn clip_limits_painting() {
        let pdf = single_page_pdf(
            "q 0 0 50 50 re W n 1 0 0 rg 0 0 200 200 re f Q",
            None,
        );
        let image = render(&pdf, 1.0);
        assert!(is_red(image.get_pixel(25, 767)));
        assert_eq!(image.get_pixel(100, 692), &Rgb([255, 255, 255]));
    }

    #[test]
    fn stroked_line_is_drawn() {
        let pdf = single_page_pdf("0 0 1 RG 4 w 0 396 m 612 396 l S", None);
        let image = render(&pdf, 1.0);
        let px = image.get_pixel(306, 396);
        assert!(px[2] > 200 && px[0] < 60);
    }

    #[test]
    fn text_is_visible() {
        let image = render(&build_pdf(&PdfFixture::new("A", 1)), 2.0);
        assert!(dark_pixels(&image) > 50);
    }

    #[test]
    fn different_text_rasterises_differently() {
        let reader = PdfReader::from_bytes(&build_pdf(&PdfFixture::new("A", 2))).unwrap();
        let first = rasterize_page(&reader, 0, 1.0, 4096).unwrap();
        let second = rasterize_page(&reader, 1, 1.0, 4096).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn image_xobject_is_painted() {
        // 2x1 RGB image, red then blue, stretched over the page.
        let pdf = crate::fixtures::single_page_pdf_with_image(
            "q 612 0 0 792 0 0 cm /Im1 Do Q",
            2,
            1,
            vec![255, 0, 0, 0, 0, 255],
        );
        let image = render(&pdf, 0.5);
        assert!(is_red(image.get_pixel(40, 200)));
        let right = image.get_pixel(260, 200);
        assert!(right[2] > 200 && right[0] < 60);
    }

    #[test]
    fn indexed_colours_resolve_through_the_palette() {
        let space = ColorSpace::Indexed {
            base: Box::new(ColorSpace::Rgb),
            high: 1,
            lookup: Rc::from(vec![0u8, 0, 0, 255, 128, 0]),
        };
        let rgb = space.to_rgb(&[1.0]).unwrap();
        assert_eq!(rgb[0], 1.0);
        assert!((rgb[1] - 128.0 / 255.0).abs() < 1e-6);
        // Out-of-range indices clamp to the last entry.
        assert_eq!(space.to_rgb(&[7.0]), Some(rgb));
    }

    #[test]
    fn cmyk_black_is_black() {
        assert_eq!(ColorSpace::Cmyk.to_rgb(&[0.0, 0.0, 0.0, 1.0]), Some([0.0; 3]));
        assert_eq!(ColorSpace::Cmyk.to_rgb(&[0.0, 0.0, 0.0, 0.0]), Some([1.0; 3]));
    }

    #[test]
    fn packed_samples_read_msb_first() {
        let data = [0b1010_0000u8, 0xFF];
        let one_bit = Samples::new(&data, 4, 1, 1);
        assert_eq!(
            (0..4).map(|i| one_bit.get(0, i)).collect::<Vec<_>>(),
            vec![1, 0, 1, 0]
        );
        assert_eq!(one_bit.get(1, 0), 1);
    }
}
