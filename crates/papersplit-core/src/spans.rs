//! Turning accepted detections into per-label page spans.

use std::collections::BTreeMap;

use crate::document::PageSource;
use crate::geometry::BBox;
use crate::label::Label;
use crate::options::{SegmentOptions, SplitMode};
use crate::scanner::Detection;

/// Vertical crop range on a page, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Crop {
    pub top: f64,
    pub bottom: f64,
}

impl Crop {
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.top >= self.bottom
    }
}

/// One page of a span, optionally cropped.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageSlice {
    /// Page index (0-based).
    pub page: usize,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub crop: Option<Crop>,
}

/// The content belonging to one label.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    pub label: Label,
    /// Pages in ascending order. Never empty.
    pub pages: Vec<PageSlice>,
}

impl Span {
    pub fn first_page(&self) -> usize {
        self.pages.first().map_or(0, |p| p.page)
    }

    pub fn last_page(&self) -> usize {
        self.pages.last().map_or(0, |p| p.page)
    }

    pub fn contains_page(&self, page: usize) -> bool {
        self.pages.iter().any(|p| p.page == page)
    }
}

/// Build one span per detection.
///
/// `detections` must be sorted by label, which for accepted detections is
/// also reading order. Span `i` covers pages `page_i ..= max(page_i,
/// page_{i+1} - 1)`; the last span runs to the final page.
pub fn build_spans<S: PageSource + ?Sized>(
    source: &S,
    detections: &[Detection],
    opts: &SegmentOptions,
) -> BTreeMap<Label, Span> {
    let page_count = source.page_count();
    let mut spans = BTreeMap::new();
    if page_count == 0 {
        return spans;
    }

    for (i, det) in detections.iter().enumerate() {
        let prev = i.checked_sub(1).and_then(|j| detections.get(j));
        let next = detections.get(i + 1);
        let first = det.page.min(page_count - 1);
        let last = match next {
            Some(n) => first.max(n.page.saturating_sub(1)),
            None => page_count - 1,
        };

        let pages = match opts.mode {
            SplitMode::Pages => (first..=last).map(|page| PageSlice { page, crop: None }).collect(),
            SplitMode::Crop => crop_slices(source, det, prev, next, first, last, opts),
        };
        spans.insert(
            det.label.clone(),
            Span {
                label: det.label.clone(),
                pages,
            },
        );
    }
    spans
}

/// Shared edge between two labels printed on the same page.
fn boundary(upper: &Detection, lower: &Detection, margin: f64) -> f64 {
    upper.y.max(lower.y - margin)
}

fn crop_slices<S: PageSource + ?Sized>(
    source: &S,
    det: &Detection,
    prev: Option<&Detection>,
    next: Option<&Detection>,
    first: usize,
    last: usize,
    opts: &SegmentOptions,
) -> Vec<PageSlice> {
    let margin = opts.safety_margin;
    let mut slices = Vec::new();

    for page in first..=last {
        let (_, height) = source.page_size(page);
        let top = if page != first {
            0.0
        } else {
            match prev {
                Some(p) if p.page == page => boundary(p, det, margin),
                _ => (det.y - margin).max(0.0),
            }
        };
        let bottom = match next {
            Some(n) if page == last && n.page == page => boundary(det, n, margin),
            _ if opts.tighten_to_text => lowest_text_below(source, page, top).unwrap_or(height),
            _ => height,
        };

        let crop = Crop { top, bottom };
        if crop.is_empty() && page != first {
            continue;
        }
        slices.push(PageSlice {
            page,
            crop: Some(crop),
        });
    }
    slices
}

/// Bottom of the lowest span whose top is at or below `top`.
fn lowest_text_below<S: PageSource + ?Sized>(source: &S, page: usize, top: f64) -> Option<f64> {
    let (_, height) = source.page_size(page);
    let below = BBox::new(f64::NEG_INFINITY, top, f64::INFINITY, height);
    source
        .text_spans(page, &below)
        .iter()
        .filter(|s| !s.text.trim().is_empty())
        .map(|s| s.bbox.bottom.min(height))
        .reduce(f64::max)
}
