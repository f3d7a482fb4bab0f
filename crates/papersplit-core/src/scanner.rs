//! Margin-band scanning and the monotonic sequencing rule.
//!
//! The [`Sequencer`] decides which detections are kept; [`scan_window`]
//! feeds it candidates from the spans of a page range. The primary pass and
//! the gap recovery pass both go through here with different bands and
//! windows.

use std::fmt;

use tracing::{debug, trace};

use crate::document::{PageSource, TextSpan};
use crate::error::{SegmentWarning, WarningCode};
use crate::geometry::BBox;
use crate::label::{label_candidate, Label, SubLevelGrammar};
use crate::options::{Band, ScanRegion};

/// Which pass produced a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DetectionPass {
    Primary,
    Recovery,
    Fallback,
}

impl DetectionPass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionPass::Primary => "primary",
            DetectionPass::Recovery => "recovery",
            DetectionPass::Fallback => "fallback",
        }
    }
}

impl fmt::Display for DetectionPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A label found at a position in the document.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Detection {
    pub label: Label,
    /// Page index (0-based).
    pub page: usize,
    /// Top of the span the label was read from.
    pub y: f64,
    /// Left edge of that span.
    pub x: f64,
    pub pass: DetectionPass,
}

impl Detection {
    /// Whether `self` comes before the point `(page, y)` in reading order.
    pub fn precedes(&self, page: usize, y: f64) -> bool {
        self.page < page || (self.page == page && self.y < y)
    }

    /// Whether `self` comes after the point `(page, y)` in reading order.
    pub fn follows(&self, page: usize, y: f64) -> bool {
        self.page > page || (self.page == page && self.y > y)
    }
}

/// A forward jump in question numbers: `upper` was rejected because its
/// main number skipped past `lower`'s successor. The questions in between
/// may still be found by a wider re-scan of the region between the two.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Gap {
    /// Last accepted detection before the jump.
    pub lower: Detection,
    /// The rejected detection that jumped ahead.
    pub upper: Detection,
}

impl Gap {
    /// Main numbers strictly between the two anchors.
    pub fn missing(&self) -> std::ops::Range<u32> {
        self.lower.label.main().saturating_add(1)..self.upper.label.main()
    }
}

/// What the sequencer did with an offered detection.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Kept as a new detection.
    Accepted,
    /// Merged into the previous detection on the same line, whose label it
    /// extends (`1` followed by `(a)`).
    Refined { from: Label },
    /// Discarded.
    Rejected(SegmentWarning),
}

/// Applies the acceptance rule to detections offered in reading order.
///
/// A detection is accepted when it is the first one, when its main number is
/// the previous main plus one, or when it shares the previous main and its
/// label sorts strictly after the previous label. Everything else is a
/// sequence violation. The rule is lossy on purpose: a label read out of
/// order is dropped rather than allowed to reorder the document.
#[derive(Debug, Clone)]
pub struct Sequencer {
    max_questions: u32,
    line_tolerance: f64,
    previous: Option<Label>,
    accepted: Vec<Detection>,
    gaps: Vec<Gap>,
}

impl Sequencer {
    pub fn new(max_questions: u32, line_tolerance: f64) -> Self {
        Self {
            max_questions,
            line_tolerance,
            previous: None,
            accepted: Vec::new(),
            gaps: Vec::new(),
        }
    }

    /// A sequencer that continues after `previous` without owning it.
    pub fn seeded(max_questions: u32, line_tolerance: f64, previous: Label) -> Self {
        Self {
            previous: Some(previous),
            ..Self::new(max_questions, line_tolerance)
        }
    }

    /// The label bare sub-level tokens continue from.
    pub fn open_label(&self) -> Option<&Label> {
        self.previous.as_ref()
    }

    pub fn accepted(&self) -> &[Detection] {
        &self.accepted
    }

    pub fn into_accepted(self) -> Vec<Detection> {
        self.accepted
    }

    /// Forward jumps seen so far, at most one per lower anchor.
    pub fn gaps(&self) -> &[Gap] {
        &self.gaps
    }

    /// Offer the next detection in reading order.
    pub fn offer(&mut self, detection: Detection) -> Verdict {
        let label = &detection.label;
        if label.main() > self.max_questions {
            return Verdict::Rejected(SegmentWarning::new(
                WarningCode::OutOfRange,
                detection.page,
                label.to_string(),
                format!("question {} exceeds the maximum of {}", label.main(), self.max_questions),
            ));
        }

        if let Some(last) = self.accepted.last_mut() {
            if last.page == detection.page
                && (detection.y - last.y).abs() <= self.line_tolerance
                && label.is_descendant_of(&last.label)
            {
                let from = std::mem::replace(&mut last.label, detection.label.clone());
                self.previous = Some(detection.label);
                return Verdict::Refined { from };
            }
        }

        if self
            .accepted
            .iter()
            .rev()
            .take_while(|d| d.page == detection.page)
            .any(|d| d.label == *label)
        {
            return Verdict::Rejected(SegmentWarning::new(
                WarningCode::DuplicateLabel,
                detection.page,
                label.to_string(),
                "label already detected on this page",
            ));
        }

        let in_sequence = match &self.previous {
            None => true,
            Some(prev) => {
                prev.main().checked_add(1) == Some(label.main())
                    || (label.main() == prev.main() && label > prev)
            }
        };
        if !in_sequence {
            self.note_jump(&detection);
            let description = match &self.previous {
                Some(prev) => format!("out of order after {prev}"),
                None => "out of order".to_string(),
            };
            return Verdict::Rejected(SegmentWarning::new(
                WarningCode::SequenceViolation,
                detection.page,
                label.to_string(),
                description,
            ));
        }

        self.previous = Some(detection.label.clone());
        self.accepted.push(detection);
        Verdict::Accepted
    }

    fn note_jump(&mut self, detection: &Detection) {
        let Some(lower) = self.accepted.last() else {
            return;
        };
        if detection.label.main() <= lower.label.main().saturating_add(1) {
            return;
        }
        if self.gaps.last().is_some_and(|g| g.lower == *lower) {
            return;
        }
        self.gaps.push(Gap {
            lower: lower.clone(),
            upper: detection.clone(),
        });
    }
}

/// Counters for one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PassStats {
    pub pass: DetectionPass,
    /// Tokens that were looked at as possible labels.
    pub candidates: usize,
    /// Tokens that did not parse as a label.
    pub mismatches: usize,
    pub accepted: usize,
    pub refined: usize,
    pub rejected: usize,
}

impl PassStats {
    pub fn new(pass: DetectionPass) -> Self {
        Self {
            pass,
            candidates: 0,
            mismatches: 0,
            accepted: 0,
            refined: 0,
            rejected: 0,
        }
    }

    /// Add another run's counters to these.
    pub fn absorb(&mut self, other: &PassStats) {
        self.candidates += other.candidates;
        self.mismatches += other.mismatches;
        self.accepted += other.accepted;
        self.refined += other.refined;
        self.rejected += other.rejected;
    }
}

/// Part of the document a scan covers.
///
/// `after` and `before` are exclusive `(page, y)` bounds in reading order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanWindow {
    pub first_page: usize,
    pub last_page: usize,
    pub after: Option<(usize, f64)>,
    pub before: Option<(usize, f64)>,
}

impl ScanWindow {
    /// Every page of a document with `page_count` pages.
    pub fn whole(page_count: usize) -> Self {
        Self {
            first_page: 0,
            last_page: page_count.saturating_sub(1),
            after: None,
            before: None,
        }
    }

    /// Strictly between two detections.
    pub fn between(lower: &Detection, upper: &Detection) -> Self {
        Self {
            first_page: lower.page,
            last_page: upper.page,
            after: Some((lower.page, lower.y)),
            before: Some((upper.page, upper.y)),
        }
    }

    pub fn contains(&self, page: usize, y: f64) -> bool {
        if page < self.first_page || page > self.last_page {
            return false;
        }
        if let Some((p, top)) = self.after {
            if page == p && y <= top {
                return false;
            }
        }
        if let Some((p, bottom)) = self.before {
            if page == p && y >= bottom {
                return false;
            }
        }
        true
    }
}

/// Geometry and grammar shared by the band-based passes.
#[derive(Debug, Clone, Copy)]
pub struct BandScan<'a> {
    pub band: Band,
    pub region: ScanRegion,
    pub grammar: SubLevelGrammar,
    pub anchor_text: Option<&'a str>,
    pub pass: DetectionPass,
}

/// Scan `window` and offer every parsed label that passes `keep` to the
/// sequencer. Rejections are appended to `warnings`.
///
/// `injected` detections (reading order) found by an earlier pass are
/// offered at their position in the stream, so the sequence can continue
/// through them.
pub fn scan_window<S, F>(
    source: &S,
    scan: &BandScan<'_>,
    window: &ScanWindow,
    sequencer: &mut Sequencer,
    injected: &[Detection],
    keep: F,
    warnings: &mut Vec<SegmentWarning>,
) -> PassStats
where
    S: PageSource + ?Sized,
    F: Fn(&Label) -> bool,
{
    let mut stats = PassStats::new(scan.pass);
    let mut pending = injected.iter().peekable();
    let pages = match source.page_count() {
        0 => 1..=0,
        n => window.first_page..=window.last_page.min(n - 1),
    };

    for page in pages {
        for (token, bbox) in page_candidates(source, page, scan) {
            if !window.contains(page, bbox.top) {
                continue;
            }
            while let Some(earlier) = pending.next_if(|d| d.precedes(page, bbox.top)) {
                offer_injected(sequencer, earlier, warnings);
            }
            stats.candidates += 1;
            let Some(label) = Label::parse_in_context(&token, scan.grammar, sequencer.open_label())
            else {
                trace!(page, token = %token, "not a label");
                stats.mismatches += 1;
                continue;
            };
            if !keep(&label) {
                continue;
            }
            let detection = Detection {
                label,
                page,
                y: bbox.top,
                x: bbox.x0,
                pass: scan.pass,
            };
            match sequencer.offer(detection) {
                Verdict::Accepted => {
                    stats.accepted += 1;
                    if let Some(d) = sequencer.accepted().last() {
                        debug!(pass = %scan.pass, page, y = d.y, label = %d.label, "accepted");
                    }
                }
                Verdict::Refined { from } => {
                    stats.refined += 1;
                    debug!(pass = %scan.pass, page, from = %from, "refined on same line");
                }
                Verdict::Rejected(warning) => {
                    stats.rejected += 1;
                    debug!(pass = %scan.pass, "{warning}");
                    warnings.push(warning);
                }
            }
        }
    }
    for rest in pending {
        offer_injected(sequencer, rest, warnings);
    }
    stats
}

fn offer_injected(sequencer: &mut Sequencer, detection: &Detection, warnings: &mut Vec<SegmentWarning>) {
    if let Verdict::Rejected(warning) = sequencer.offer(detection.clone()) {
        debug!(pass = %detection.pass, "{warning}");
        warnings.push(warning);
    }
}

/// Label tokens on one page in reading order, with the box they came from.
fn page_candidates<S: PageSource + ?Sized>(
    source: &S,
    page: usize,
    scan: &BandScan<'_>,
) -> Vec<(String, BBox)> {
    let (_, height) = source.page_size(page);
    let band = scan.band.region(height, &scan.region);

    let Some(anchor) = scan.anchor_text else {
        return source
            .text_spans(page, &band)
            .into_iter()
            .filter_map(|span| label_candidate(&span.text).map(|token| (token, span.bbox)))
            .collect();
    };

    let (top, bottom) = scan.region.vertical_bounds(height);
    let full_width = BBox::new(f64::NEG_INFINITY, top, f64::INFINITY, bottom);
    anchored_candidates(&source.text_spans(page, &full_width), &band, anchor, scan.grammar)
}

/// After each occurrence of `anchor`, the first span that reads as a label.
/// Text following the anchor inside the same span is tried first.
fn anchored_candidates(
    spans: &[TextSpan],
    band: &BBox,
    anchor: &str,
    grammar: SubLevelGrammar,
) -> Vec<(String, BBox)> {
    let parses = |token: &str| Label::parse(token, grammar).is_some();
    let mut out = Vec::new();
    let mut armed = false;

    for span in spans {
        if let Some(pos) = span.text.find(anchor) {
            armed = true;
            let rest = &span.text[pos + anchor.len()..];
            if let Some(token) = label_candidate(rest).filter(|t| parses(t)) {
                out.push((token, span.bbox));
                armed = false;
            }
            continue;
        }
        if !armed || !band.anchors(&span.bbox) {
            continue;
        }
        if let Some(token) = label_candidate(&span.text).filter(|t| parses(t)) {
            out.push((token, span.bbox));
            armed = false;
        }
    }
    out
}
