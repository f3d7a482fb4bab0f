//! Font decoding for text-showing operators.
//!
//! Only what label detection needs: split a string into character codes,
//! map each code to text (ToUnicode, else WinAnsi), and look up an advance
//! width from `/Widths` or `/DW`.

use encoding_rs::WINDOWS_1252;
use tracing::warn;

use crate::cmap::CMap;
use crate::lopdf_backend::{decode_content_stream, object_to_f64, resolve_object};

/// Glyph width used when a font has no width information, in text space
/// units per unit font size.
pub const DEFAULT_GLYPH_WIDTH: f64 = 0.5;

/// A decoded character code.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub code: u32,
    pub text: String,
    /// Advance width in text space units per unit font size.
    pub width: f64,
}

impl Glyph {
    /// Whether word spacing applies (single-byte code 32).
    pub fn is_space_code(&self) -> bool {
        self.code == 32
    }
}

/// Decoding information for one font resource.
#[derive(Debug, Clone)]
pub struct FontInfo {
    code_bytes: usize,
    first_char: u32,
    widths: Vec<f64>,
    default_width: f64,
    to_unicode: Option<CMap>,
}

impl Default for FontInfo {
    fn default() -> Self {
        Self {
            code_bytes: 1,
            first_char: 0,
            widths: Vec::new(),
            default_width: DEFAULT_GLYPH_WIDTH,
            to_unicode: None,
        }
    }
}

impl FontInfo {
    /// Read a font dictionary. Malformed entries fall back to defaults.
    pub fn from_dict(doc: &lopdf::Document, dict: &lopdf::Dictionary) -> Self {
        let mut info = FontInfo::default();
        let is_type0 = matches!(dict.get(b"Subtype").and_then(|o| o.as_name()), Ok(b"Type0"));

        if is_type0 {
            info.code_bytes = 2;
            let descendant = dict
                .get(b"DescendantFonts")
                .ok()
                .map(|o| resolve_object(doc, o))
                .and_then(|o| o.as_array().ok())
                .and_then(|arr| arr.first())
                .map(|o| resolve_object(doc, o))
                .and_then(|o| o.as_dict().ok());
            if let Some(dw) = descendant
                .and_then(|d| d.get(b"DW").ok())
                .and_then(|o| object_to_f64(o).ok())
            {
                info.default_width = dw / 1000.0;
            }
        } else {
            info.first_char = dict
                .get(b"FirstChar")
                .ok()
                .and_then(|o| object_to_f64(o).ok())
                .map_or(0, |v| v.max(0.0) as u32);
            if let Some(widths) = dict
                .get(b"Widths")
                .ok()
                .map(|o| resolve_object(doc, o))
                .and_then(|o| o.as_array().ok())
            {
                info.widths = widths
                    .iter()
                    .map(|w| object_to_f64(resolve_object(doc, w)).map_or(0.0, |v| v / 1000.0))
                    .collect();
            }
        }

        if let Some(stream) = dict
            .get(b"ToUnicode")
            .ok()
            .map(|o| resolve_object(doc, o))
            .and_then(|o| o.as_stream().ok())
        {
            match decode_content_stream(stream).and_then(|bytes| CMap::parse(&bytes)) {
                Ok(cmap) => {
                    if let Some(n) = cmap.code_bytes() {
                        info.code_bytes = n.clamp(1, 4);
                    }
                    info.to_unicode = Some(cmap);
                }
                Err(e) => warn!(error = %e, "ignoring unreadable /ToUnicode stream"),
            }
        }
        info
    }

    /// Split a shown string into glyphs.
    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        bytes
            .chunks(self.code_bytes)
            .map(|chunk| {
                let code = chunk.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
                Glyph {
                    code,
                    text: self.text_for(code),
                    width: self.width_for(code),
                }
            })
            .collect()
    }

    fn text_for(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|c| c.lookup(code)) {
            return text.to_string();
        }
        let decoded = match u8::try_from(code) {
            Ok(byte) if self.code_bytes == 1 => {
                let bytes = [byte];
                let (text, _) = WINDOWS_1252.decode_without_bom_handling(&bytes);
                text.chars().next()
            }
            _ => char::from_u32(code),
        };
        decoded
            .filter(|c| !c.is_control() || c.is_whitespace())
            .map_or_else(|| "\u{FFFD}".to_string(), |c| c.to_string())
    }

    fn width_for(&self, code: u32) -> f64 {
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(self.default_width)
    }
}
