//! ToUnicode CMap parser.
//!
//! Reads the `beginbfchar`/`beginbfrange` sections of a `/ToUnicode`
//! stream into a code → text table. Codespace ranges only contribute the
//! code width in bytes.

use std::collections::HashMap;

use crate::error::BackendError;

/// A parsed ToUnicode CMap.
#[derive(Debug, Clone, Default)]
pub struct CMap {
    mappings: HashMap<u32, String>,
    code_bytes: Option<usize>,
}

impl CMap {
    /// Parse a ToUnicode CMap from its decoded stream bytes.
    pub fn parse(data: &[u8]) -> Result<Self, BackendError> {
        let text = String::from_utf8_lossy(data);
        let mut cmap = CMap::default();

        for section in sections(&text, "begincodespacerange", "endcodespacerange") {
            if let Some(first) = hex_tokens(section).first() {
                cmap.code_bytes = Some(first.len().div_ceil(2).max(1));
            }
        }
        for section in sections(&text, "beginbfchar", "endbfchar") {
            for line in section.lines() {
                let tokens = hex_tokens(line);
                if let [src, dst, ..] = tokens.as_slice() {
                    cmap.note_width(src);
                    cmap.mappings.insert(parse_hex_code(src)?, decode_utf16be_hex(dst)?);
                }
            }
        }
        for section in sections(&text, "beginbfrange", "endbfrange") {
            for line in section.lines() {
                cmap.parse_range_line(line)?;
            }
        }
        Ok(cmap)
    }

    fn parse_range_line(&mut self, line: &str) -> Result<(), BackendError> {
        let (head, array) = match line.find('[') {
            Some(i) => (&line[..i], Some(&line[i + 1..])),
            None => (line, None),
        };
        let tokens = hex_tokens(head);
        let (low, high) = match tokens.as_slice() {
            [low, high, ..] => {
                self.note_width(low);
                (parse_hex_code(low)?, parse_hex_code(high)?)
            }
            _ => return Ok(()),
        };
        if high < low {
            return Ok(());
        }
        match array {
            Some(rest) => {
                let rest = rest.split(']').next().unwrap_or(rest);
                for (code, dst) in (low..=high).zip(hex_tokens(rest)) {
                    self.mappings.insert(code, decode_utf16be_hex(dst)?);
                }
            }
            None => {
                let Some(dst) = tokens.get(2) else {
                    return Ok(());
                };
                let start = parse_hex_code(dst)?;
                for offset in 0..=(high - low) {
                    if let Some(ch) = char::from_u32(start + offset) {
                        self.mappings.insert(low + offset, ch.to_string());
                    }
                }
            }
        }
        Ok(())
    }

    fn note_width(&mut self, src: &str) {
        if self.code_bytes.is_none() {
            self.code_bytes = Some(src.len().div_ceil(2).max(1));
        }
    }

    /// Look up the text for a character code.
    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.mappings.get(&code).map(String::as_str)
    }

    /// Width of a source code in bytes, when the CMap declares one.
    pub fn code_bytes(&self) -> Option<usize> {
        self.code_bytes
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

/// Bodies of every `begin ... end` section, in order.
fn sections<'t>(text: &'t str, begin: &str, end: &str) -> Vec<&'t str> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(begin) {
        let body = &rest[start + begin.len()..];
        let Some(stop) = body.find(end) else {
            break;
        };
        out.push(&body[..stop]);
        rest = &body[stop + end.len()..];
    }
    out
}

fn hex_tokens(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find('<') {
        let Some(len) = rest[start + 1..].find('>') else {
            break;
        };
        tokens.push(rest[start + 1..start + 1 + len].trim());
        rest = &rest[start + 2 + len..];
    }
    tokens
}

fn parse_hex_code(hex: &str) -> Result<u32, BackendError> {
    u32::from_str_radix(hex, 16)
        .map_err(|e| BackendError::Parse(format!("invalid hex code '{hex}': {e}")))
}

/// Decode UTF-16BE code units written as hex. Two-digit values are
/// treated as a single code unit.
fn decode_utf16be_hex(hex: &str) -> Result<String, BackendError> {
    if hex.len() == 2 {
        return decode_utf16be_hex(&format!("00{hex}"));
    }
    if hex.len() % 4 != 0 {
        return Err(BackendError::Parse(format!(
            "UTF-16BE hex string must have length divisible by 4, got '{hex}'"
        )));
    }
    let units = hex
        .as_bytes()
        .chunks(4)
        .map(|chunk| {
            std::str::from_utf8(chunk)
                .ok()
                .and_then(|s| u16::from_str_radix(s, 16).ok())
                .ok_or_else(|| BackendError::Parse(format!("invalid UTF-16BE hex '{hex}'")))
        })
        .collect::<Result<Vec<u16>, _>>()?;
    String::from_utf16(&units)
        .map_err(|e| BackendError::Parse(format!("invalid UTF-16BE sequence: {e}")))
}
