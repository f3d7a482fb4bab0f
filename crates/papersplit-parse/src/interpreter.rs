//! Content stream interpreter producing positioned text spans.
//!
//! Walks the operators of a page (and of the Form XObjects it draws),
//! tracking the CTM and text state, and emits one [`TextSpan`] per
//! text-showing operator. Span boxes run from the descent to the ascent of
//! the current font size and cover the inked glyphs only.

use std::collections::HashMap;

use lopdf::content::Content;
use lopdf::{Dictionary, Object, ObjectId};
use papersplit_core::{Ctm, TextSpan};
use tracing::{trace, warn};

use crate::error::BackendError;
use crate::font::FontInfo;
use crate::lopdf_backend::{decode_content_stream, resolve_object};
use crate::page_geometry::PageGeometry;
use crate::text_state::{TextParams, TextState};

/// Maximum nesting depth for Form XObjects.
const MAX_FORM_DEPTH: usize = 8;

/// Glyph extent below the baseline, per unit font size.
const DESCENT: f64 = -0.2;
/// Glyph extent above the baseline, per unit font size.
const ASCENT: f64 = 0.8;

/// A `TJ` adjustment at or beyond this (in thousandths of an em, negative
/// meaning a move to the right) is read as a word break.
const WORD_GAP: f64 = 200.0;

enum ShowItem<'o> {
    Text(&'o [u8]),
    Adjust(f64),
}

/// Saved by `q`, restored by `Q`.
struct SavedState {
    ctm: Ctm,
    text: TextParams,
    font: Option<usize>,
}

/// Collects text spans for one page.
pub(crate) struct SpanCollector<'a> {
    doc: &'a lopdf::Document,
    geometry: PageGeometry,
    default_font: FontInfo,
    fonts: Vec<FontInfo>,
    font_ids: HashMap<ObjectId, usize>,
    spans: Vec<TextSpan>,
}

impl<'a> SpanCollector<'a> {
    pub(crate) fn new(doc: &'a lopdf::Document, geometry: PageGeometry) -> Self {
        Self {
            doc,
            geometry,
            default_font: FontInfo::default(),
            fonts: Vec::new(),
            font_ids: HashMap::new(),
            spans: Vec::new(),
        }
    }

    pub(crate) fn into_spans(self) -> Vec<TextSpan> {
        self.spans
    }

    /// Interpret a decoded content stream.
    pub(crate) fn run(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        base_ctm: Ctm,
        depth: usize,
    ) -> Result<(), BackendError> {
        let content = Content::decode(content)
            .map_err(|e| BackendError::Parse(format!("failed to decode content stream: {e}")))?;

        let mut ctm = base_ctm;
        let mut ts = TextState::new();
        let mut font: Option<usize> = None;
        let mut stack: Vec<SavedState> = Vec::new();

        for op in &content.operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                "q" => stack.push(SavedState {
                    ctm,
                    text: ts.params,
                    font,
                }),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        ctm = saved.ctm;
                        ts.params = saved.text;
                        font = saved.font;
                    }
                }
                "cm" => {
                    if let Some([a, b, c, d, e, f]) = six_numbers(operands) {
                        ctm = Ctm::new(a, b, c, d, e, f).concat(&ctm);
                    }
                }
                "BT" => ts.begin(),
                "ET" => ts.end(),
                "Tf" => {
                    font = operands
                        .first()
                        .and_then(|o| o.as_name().ok())
                        .and_then(|name| self.load_font(resources, name));
                    ts.params.font_size = get_f64(operands, 1).unwrap_or(ts.params.font_size);
                }
                "Tc" => ts.params.char_spacing = get_f64(operands, 0).unwrap_or(0.0),
                "Tw" => ts.params.word_spacing = get_f64(operands, 0).unwrap_or(0.0),
                "Tz" => ts.params.h_scaling = get_f64(operands, 0).unwrap_or(100.0),
                "TL" => ts.params.leading = get_f64(operands, 0).unwrap_or(0.0),
                "Ts" => ts.params.rise = get_f64(operands, 0).unwrap_or(0.0),
                "Td" => ts.next_line_at(
                    get_f64(operands, 0).unwrap_or(0.0),
                    get_f64(operands, 1).unwrap_or(0.0),
                ),
                "TD" => ts.next_line_with_leading(
                    get_f64(operands, 0).unwrap_or(0.0),
                    get_f64(operands, 1).unwrap_or(0.0),
                ),
                "Tm" => {
                    if let Some([a, b, c, d, e, f]) = six_numbers(operands) {
                        ts.set_matrix(Ctm::new(a, b, c, d, e, f));
                    }
                }
                "T*" => ts.next_line(),
                "Tj" => {
                    if let Some(bytes) = operands.first().and_then(string_bytes) {
                        self.show(&mut ts, &ctm, font, &[ShowItem::Text(bytes)]);
                    }
                }
                "'" => {
                    ts.next_line();
                    if let Some(bytes) = operands.first().and_then(string_bytes) {
                        self.show(&mut ts, &ctm, font, &[ShowItem::Text(bytes)]);
                    }
                }
                "\"" => {
                    ts.params.word_spacing = get_f64(operands, 0).unwrap_or(ts.params.word_spacing);
                    ts.params.char_spacing = get_f64(operands, 1).unwrap_or(ts.params.char_spacing);
                    ts.next_line();
                    if let Some(bytes) = operands.get(2).and_then(string_bytes) {
                        self.show(&mut ts, &ctm, font, &[ShowItem::Text(bytes)]);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(array)) = operands.first() {
                        let items: Vec<ShowItem<'_>> = array
                            .iter()
                            .filter_map(|o| match o {
                                Object::String(bytes, _) => Some(ShowItem::Text(bytes.as_slice())),
                                other => object_number(other).map(ShowItem::Adjust),
                            })
                            .collect();
                        self.show(&mut ts, &ctm, font, &items);
                    }
                }
                "Do" => {
                    if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                        self.draw_form(resources, name, &ctm, depth)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn load_font(&mut self, resources: Option<&'a Dictionary>, name: &[u8]) -> Option<usize> {
        let entry = resources?
            .get(b"Font")
            .ok()
            .map(|o| resolve_object(self.doc, o))
            .and_then(|o| o.as_dict().ok())?
            .get(name)
            .ok()?;
        if let Object::Reference(id) = entry {
            if let Some(&index) = self.font_ids.get(id) {
                return Some(index);
            }
        }
        let dict = resolve_object(self.doc, entry).as_dict().ok()?;
        self.fonts.push(FontInfo::from_dict(self.doc, dict));
        let index = self.fonts.len() - 1;
        if let Object::Reference(id) = entry {
            self.font_ids.insert(*id, index);
        }
        Some(index)
    }

    fn draw_form(
        &mut self,
        resources: Option<&'a Dictionary>,
        name: &[u8],
        ctm: &Ctm,
        depth: usize,
    ) -> Result<(), BackendError> {
        let doc = self.doc;
        let Some(stream) = resources
            .and_then(|r| r.get(b"XObject").ok())
            .map(|o| resolve_object(doc, o))
            .and_then(|o| o.as_dict().ok())
            .and_then(|d| d.get(name).ok())
            .map(|o| resolve_object(doc, o))
            .and_then(|o| o.as_stream().ok())
        else {
            return Ok(());
        };
        if !matches!(stream.dict.get(b"Subtype").and_then(|o| o.as_name()), Ok(b"Form")) {
            return Ok(());
        }
        if depth >= MAX_FORM_DEPTH {
            warn!(depth, "form XObject nesting too deep, skipping");
            return Ok(());
        }

        let matrix = match stream.dict.get(b"Matrix") {
            Ok(Object::Array(values)) => six_numbers(values)
                .map(|[a, b, c, d, e, f]| Ctm::new(a, b, c, d, e, f))
                .unwrap_or_else(Ctm::identity),
            _ => Ctm::identity(),
        };
        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .map(|o| resolve_object(doc, o))
            .and_then(|o| o.as_dict().ok())
            .or(resources);

        let content = decode_content_stream(stream)?;
        trace!(depth, bytes = content.len(), "entering form XObject");
        if let Err(e) = self.run(&content, form_resources, matrix.concat(ctm), depth + 1) {
            warn!(error = %e, "skipping unreadable form XObject");
        }
        Ok(())
    }

    fn show(&mut self, ts: &mut TextState, ctm: &Ctm, font: Option<usize>, items: &[ShowItem<'_>]) {
        let font = font
            .and_then(|i| self.fonts.get(i))
            .unwrap_or(&self.default_font);
        let params = ts.params;
        let size = params.font_size;
        let scale = params.h_scale();

        let mut text = String::new();
        let mut cursor = 0.0;
        let mut ink: Option<(f64, f64)> = None;
        for item in items {
            match item {
                ShowItem::Text(bytes) => {
                    for glyph in font.decode(bytes) {
                        let glyph_width = glyph.width * size * scale;
                        if !glyph.text.trim().is_empty() {
                            let start = ink.map_or(cursor, |(s, _)| s);
                            ink = Some((start, cursor + glyph_width));
                        }
                        let spacing = params.char_spacing
                            + if glyph.is_space_code() { params.word_spacing } else { 0.0 };
                        cursor += glyph_width + spacing * scale;
                        text.push_str(&glyph.text);
                    }
                }
                ShowItem::Adjust(amount) => {
                    if *amount <= -WORD_GAP && !text.is_empty() && !text.ends_with(' ') {
                        text.push(' ');
                    }
                    cursor -= amount / 1000.0 * size * scale;
                }
            }
        }

        if let Some((x0, x1)) = ink {
            let m = ts.matrix().concat(ctm);
            let low = params.rise + DESCENT * size;
            let high = params.rise + ASCENT * size;
            let corners = [
                m.transform_point(x0, low),
                m.transform_point(x1, low),
                m.transform_point(x0, high),
                m.transform_point(x1, high),
            ];
            let (min_x, max_x) = min_max(corners.iter().map(|p| p.0));
            let (min_y, max_y) = min_max(corners.iter().map(|p| p.1));
            let bbox = self.geometry.normalize_bbox(min_x, min_y, max_x, max_y);
            self.spans.push(TextSpan::new(text.trim(), bbox));
        }
        ts.advance(cursor);
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

// --- Operand extraction helpers ---

fn object_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(f64::from(*f)),
        _ => None,
    }
}

fn get_f64(operands: &[Object], index: usize) -> Option<f64> {
    operands.get(index).and_then(object_number)
}

fn six_numbers(operands: &[Object]) -> Option<[f64; 6]> {
    let mut out = [0.0; 6];
    if operands.len() < 6 {
        return None;
    }
    for (slot, obj) in out.iter_mut().zip(operands) {
        *slot = object_number(obj)?;
    }
    Some(out)
}

fn string_bytes(obj: &Object) -> Option<&[u8]> {
    match obj {
        Object::String(bytes, _) => Some(bytes.as_slice()),
        _ => None,
    }
}
