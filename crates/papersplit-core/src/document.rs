//! Document model consumed by the segmenter.
//!
//! A [`Document`] is an ordered list of [`Page`]s, each carrying positioned
//! [`TextSpan`]s produced by some text-extraction backend. The segmenter only
//! talks to documents through the [`PageSource`] trait so that other
//! backends can serve pages lazily.

use std::cmp::Ordering;

use crate::geometry::BBox;

/// A run of text with its bounding box on the page.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextSpan {
    /// The text content.
    pub text: String,
    /// Bounding box in top-left origin coordinates.
    pub bbox: BBox,
}

impl TextSpan {
    pub fn new(text: impl Into<String>, bbox: BBox) -> Self {
        Self {
            text: text.into(),
            bbox,
        }
    }
}

/// A single page: its size and the text spans found on it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Page {
    /// Page index (0-based).
    pub index: usize,
    /// Page width in page units.
    pub width: f64,
    /// Page height in page units.
    pub height: f64,
    /// Text spans in extraction order.
    #[cfg_attr(feature = "serde", serde(default))]
    pub spans: Vec<TextSpan>,
}

impl Page {
    pub fn new(index: usize, width: f64, height: f64) -> Self {
        Self {
            index,
            width,
            height,
            spans: Vec::new(),
        }
    }

    /// Builder-style helper that appends a span.
    pub fn with_span(mut self, text: impl Into<String>, bbox: BBox) -> Self {
        self.spans.push(TextSpan::new(text, bbox));
        self
    }

    /// The full page as a bounding box.
    pub fn bbox(&self) -> BBox {
        BBox::new(0.0, 0.0, self.width, self.height)
    }
}

/// An in-memory document.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Document {
    pub pages: Vec<Page>,
}

impl Document {
    pub fn new(pages: Vec<Page>) -> Self {
        Self { pages }
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// A line of text assembled from spans that share a baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    /// Span texts joined left to right with single spaces.
    pub text: String,
    /// Union of the member spans' boxes.
    pub bbox: BBox,
}

/// Read-only access to a decoded document's pages.
///
/// Implementations must return the same answers for the same arguments for
/// the lifetime of a segmentation run.
pub trait PageSource {
    /// Number of pages.
    fn page_count(&self) -> usize;

    /// `(width, height)` of page `index`.
    fn page_size(&self, index: usize) -> (f64, f64);

    /// Spans on page `index` anchored inside `region` (see [`BBox::anchors`]),
    /// sorted top-to-bottom then left-to-right.
    fn text_spans(&self, index: usize, region: &BBox) -> Vec<TextSpan>;

    /// All spans of page `index` grouped into lines, top to bottom.
    ///
    /// Spans whose tops differ by at most `y_tolerance` belong to one line.
    fn text_lines(&self, index: usize, y_tolerance: f64) -> Vec<TextLine> {
        // Spans can hang past the page edges, so query an unbounded region.
        let everything = BBox::new(
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
            f64::INFINITY,
            f64::INFINITY,
        );
        group_into_lines(self.text_spans(index, &everything), y_tolerance)
    }
}

impl PageSource for Document {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, index: usize) -> (f64, f64) {
        self.pages
            .get(index)
            .map(|p| (p.width, p.height))
            .unwrap_or((0.0, 0.0))
    }

    fn text_spans(&self, index: usize, region: &BBox) -> Vec<TextSpan> {
        let Some(page) = self.pages.get(index) else {
            return Vec::new();
        };
        let mut spans: Vec<TextSpan> = page
            .spans
            .iter()
            .filter(|s| region.anchors(&s.bbox))
            .cloned()
            .collect();
        spans.sort_by(reading_order);
        spans
    }
}

/// A [`PageSource`] view that hides spans containing any of a set of texts.
///
/// Matching is case-insensitive substring search, so a footer span reading
/// `9709/12/M/J/21 [Turn over` is hidden by either pattern. With no patterns
/// the view is transparent.
#[derive(Debug)]
pub struct IgnoreText<'a, S: ?Sized> {
    inner: &'a S,
    patterns: Vec<String>,
}

impl<'a, S: PageSource + ?Sized> IgnoreText<'a, S> {
    pub fn new(inner: &'a S, patterns: &[String]) -> Self {
        Self {
            inner,
            patterns: patterns.iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// Whether `text` is hidden.
    pub fn ignores(&self, text: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let text = text.to_lowercase();
        self.patterns.iter().any(|p| text.contains(p.as_str()))
    }
}

impl<S: PageSource + ?Sized> PageSource for IgnoreText<'_, S> {
    fn page_count(&self) -> usize {
        self.inner.page_count()
    }

    fn page_size(&self, index: usize) -> (f64, f64) {
        self.inner.page_size(index)
    }

    fn text_spans(&self, index: usize, region: &BBox) -> Vec<TextSpan> {
        let mut spans = self.inner.text_spans(index, region);
        spans.retain(|s| !self.ignores(&s.text));
        spans
    }
}

/// Top-to-bottom, then left-to-right ordering of spans.
pub fn reading_order(a: &TextSpan, b: &TextSpan) -> Ordering {
    a.bbox
        .top
        .total_cmp(&b.bbox.top)
        .then(a.bbox.x0.total_cmp(&b.bbox.x0))
}

/// Group spans (in any order) into lines by vertical proximity.
pub fn group_into_lines(mut spans: Vec<TextSpan>, y_tolerance: f64) -> Vec<TextLine> {
    spans.retain(|s| !s.text.trim().is_empty());
    spans.sort_by(reading_order);

    let mut lines: Vec<Vec<TextSpan>> = Vec::new();
    for span in spans {
        match lines.last_mut() {
            Some(line) if (span.bbox.top - line[0].bbox.top).abs() <= y_tolerance => {
                line.push(span)
            }
            _ => lines.push(vec![span]),
        }
    }

    lines
        .into_iter()
        .map(|mut members| {
            members.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
            let bbox = members
                .iter()
                .skip(1)
                .fold(members[0].bbox, |acc, s| acc.union(&s.bbox));
            let text = members
                .iter()
                .map(|s| s.text.trim())
                .collect::<Vec<_>>()
                .join(" ");
            TextLine { text, bbox }
        })
        .collect()
}
