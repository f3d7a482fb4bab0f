//! Text state for the content stream interpreter.
//!
//! [`TextParams`] holds the parameters that belong to the graphics state
//! and are saved by `q`. The text and line matrices only live between
//! `BT` and `ET`, so they sit in a separate [`TextObject`].

use papersplit_core::Ctm;

/// Text parameters set by `Tc`, `Tw`, `Tz`, `TL`, `Ts` and `Tf`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextParams {
    pub char_spacing: f64,
    /// Applied after each single-byte space code.
    pub word_spacing: f64,
    /// Percentage; 100 is unscaled.
    pub h_scaling: f64,
    pub leading: f64,
    pub font_size: f64,
    pub rise: f64,
}

impl Default for TextParams {
    fn default() -> Self {
        Self {
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scaling: 100.0,
            leading: 0.0,
            font_size: 0.0,
            rise: 0.0,
        }
    }
}

impl TextParams {
    pub fn h_scale(&self) -> f64 {
        self.h_scaling / 100.0
    }
}

/// Matrices of an open `BT` ... `ET` block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextObject {
    /// Current glyph origin (Tm).
    pub matrix: Ctm,
    /// Start of the current line (Tlm).
    pub line_start: Ctm,
}

impl Default for TextObject {
    fn default() -> Self {
        Self {
            matrix: Ctm::identity(),
            line_start: Ctm::identity(),
        }
    }
}

/// Everything the text operators read or write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextState {
    pub params: TextParams,
    object: Option<TextObject>,
}

impl TextState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_text_object(&self) -> bool {
        self.object.is_some()
    }

    /// The text matrix, or identity outside a text object.
    pub fn matrix(&self) -> Ctm {
        self.object.map_or_else(Ctm::identity, |o| o.matrix)
    }

    /// `BT`.
    pub fn begin(&mut self) {
        self.object = Some(TextObject::default());
    }

    /// `ET`.
    pub fn end(&mut self) {
        self.object = None;
    }

    /// Positioning outside `BT` is malformed but common; treat it as
    /// opening an implicit text object.
    fn object_mut(&mut self) -> &mut TextObject {
        self.object.get_or_insert_with(TextObject::default)
    }

    /// `Tm`.
    pub fn set_matrix(&mut self, m: Ctm) {
        let object = self.object_mut();
        object.matrix = m;
        object.line_start = m;
    }

    /// `Td`: offset the start of the next line from the current one.
    pub fn next_line_at(&mut self, tx: f64, ty: f64) {
        let object = self.object_mut();
        let m = Ctm::new(1.0, 0.0, 0.0, 1.0, tx, ty).concat(&object.line_start);
        object.matrix = m;
        object.line_start = m;
    }

    /// `TD`: `Td` that also sets the leading to `-ty`.
    pub fn next_line_with_leading(&mut self, tx: f64, ty: f64) {
        self.params.leading = -ty;
        self.next_line_at(tx, ty);
    }

    /// `T*`.
    pub fn next_line(&mut self) {
        let leading = self.params.leading;
        self.next_line_at(0.0, -leading);
    }

    /// Move the glyph origin right by `tx` text-space units.
    pub fn advance(&mut self, tx: f64) {
        let object = self.object_mut();
        object.matrix = Ctm::new(1.0, 0.0, 0.0, 1.0, tx, 0.0).concat(&object.matrix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_resets_matrices() {
        let mut state = TextState::new();
        assert!(!state.in_text_object());
        state.begin();
        state.next_line_at(10.0, 20.0);
        state.begin();
        assert_eq!(state.matrix(), Ctm::identity());
        state.end();
        assert!(!state.in_text_object());
    }

    #[test]
    fn td_is_relative_to_line_start() {
        let mut state = TextState::new();
        state.begin();
        state.set_matrix(Ctm::new(1.0, 0.0, 0.0, 1.0, 72.0, 700.0));
        state.advance(30.0);
        assert_eq!(state.matrix().e, 102.0);
        state.next_line_at(0.0, -14.0);
        assert_eq!(state.matrix().e, 72.0);
        assert_eq!(state.matrix().f, 686.0);
    }

    #[test]
    fn t_star_uses_leading_from_td_upper() {
        let mut state = TextState::new();
        state.begin();
        state.next_line_with_leading(50.0, -12.0);
        state.next_line();
        assert_eq!(state.params.leading, 12.0);
        assert_eq!(state.matrix().e, 50.0);
        assert_eq!(state.matrix().f, -24.0);
    }

    #[test]
    fn positioning_outside_bt_opens_text_object() {
        let mut state = TextState::new();
        state.next_line_at(5.0, 5.0);
        assert!(state.in_text_object());
        assert_eq!(state.matrix().f, 5.0);
    }

    #[test]
    fn params_are_plain_values() {
        let mut state = TextState::new();
        state.params.font_size = 11.0;
        let saved = state.params;
        state.params.font_size = 20.0;
        state.params.h_scaling = 50.0;
        state.params = saved;
        assert_eq!(state.params.font_size, 11.0);
        assert_eq!(state.params.h_scale(), 1.0);
    }
}
