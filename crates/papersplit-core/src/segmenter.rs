//! The multi-pass question segmenter.
//!
//! Runs the primary band scan, then the gap recovery and fallback passes
//! while questions are still missing, then builds spans:
//!
//! ```text
//! Init -> Scanning -> [Recovering] -> [Fallback] -> Building -> Done
//! ```
//!
//! Segmentation never fails. Rejected detections become warnings and
//! questions that were never found are listed in
//! [`SegmentationResult::missing`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{debug, info, warn};

use crate::document::{IgnoreText, PageSource};
use crate::error::{SegmentError, SegmentWarning};
use crate::fallback::fallback_scan;
use crate::label::Label;
use crate::options::SegmentOptions;
use crate::recovery::recover;
use crate::scanner::{
    scan_window, BandScan, Detection, DetectionPass, Gap, PassStats, ScanWindow, Sequencer,
};
use crate::spans::{build_spans, Span};

/// Stage of a segmentation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    Init,
    Scanning,
    Recovering,
    Fallback,
    Building,
    Done,
}

impl fmt::Display for SegmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SegmentState::Init => "init",
            SegmentState::Scanning => "scanning",
            SegmentState::Recovering => "recovering",
            SegmentState::Fallback => "fallback",
            SegmentState::Building => "building",
            SegmentState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Output of the primary pass alone.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanReport {
    /// Accepted detections in reading order.
    pub detections: Vec<Detection>,
    /// Rejected detections.
    pub warnings: Vec<SegmentWarning>,
    /// Forward jumps the recovery pass may search.
    pub gaps: Vec<Gap>,
    pub stats: PassStats,
}

/// Everything a segmentation run produces.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentationResult {
    /// One span per accepted label, in label order.
    pub spans: BTreeMap<Label, Span>,
    /// Expected main numbers that were never found.
    pub missing: Vec<u32>,
    /// Accepted detections in label order.
    pub detections: Vec<Detection>,
    pub warnings: Vec<SegmentWarning>,
    /// One entry per pass that ran.
    pub stats: Vec<PassStats>,
}

impl SegmentationResult {
    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.spans.keys()
    }

    pub fn span(&self, label: &Label) -> Option<&Span> {
        self.spans.get(label)
    }

    /// Whether every expected question was found.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Splits documents into per-question spans.
#[derive(Debug, Clone)]
pub struct Segmenter {
    opts: SegmentOptions,
}

impl Segmenter {
    /// Validate `opts` and build a segmenter.
    pub fn new(opts: SegmentOptions) -> Result<Self, SegmentError> {
        opts.validate()?;
        Ok(Self { opts })
    }

    pub fn options(&self) -> &SegmentOptions {
        &self.opts
    }

    /// Highest main number a label may carry.
    fn max_main(&self) -> u32 {
        match &self.opts.open_label {
            Some(open) => self.opts.max_questions.max(open.main()),
            None => self.opts.max_questions,
        }
    }

    fn band_scan(&self, pass: DetectionPass) -> BandScan<'_> {
        BandScan {
            band: match pass {
                DetectionPass::Recovery => self.opts.recovery_band,
                _ => self.opts.left_band,
            },
            region: self.opts.region,
            grammar: self.opts.grammar,
            anchor_text: self.opts.anchor_text.as_deref(),
            pass,
        }
    }

    /// Run only the primary band scan.
    pub fn scan<S: PageSource + ?Sized>(&self, source: &S) -> ScanReport {
        self.scan_with(&IgnoreText::new(source, &self.opts.ignore_text), &[])
    }

    /// Primary scan with detections from the recovery pass spliced in.
    fn scan_with<S: PageSource + ?Sized>(&self, source: &S, injected: &[Detection]) -> ScanReport {
        let mut sequencer = Sequencer::new(self.max_main(), self.opts.line_tolerance);
        if let Some(open) = &self.opts.open_label {
            sequencer.offer(Detection {
                label: open.clone(),
                page: 0,
                y: 0.0,
                x: 0.0,
                pass: DetectionPass::Primary,
            });
        }
        let mut warnings = Vec::new();
        let stats = scan_window(
            source,
            &self.band_scan(DetectionPass::Primary),
            &ScanWindow::whole(source.page_count()),
            &mut sequencer,
            injected,
            |_| true,
            &mut warnings,
        );
        let gaps = sequencer.gaps().to_vec();
        ScanReport {
            detections: sequencer.into_accepted(),
            warnings,
            gaps,
            stats,
        }
    }

    /// Main numbers expected but absent from `detections`.
    fn missing(&self, detections: &[Detection]) -> BTreeSet<u32> {
        if self.opts.open_label.is_some() {
            return BTreeSet::new();
        }
        let found: BTreeSet<u32> = detections.iter().map(|d| d.label.main()).collect();
        (1..=self.opts.max_questions)
            .filter(|n| !found.contains(n))
            .collect()
    }

    /// Segment a document.
    ///
    /// Every pass, and crop tightening, sees `source` through the
    /// `ignore_text` filter.
    pub fn segment<S: PageSource + ?Sized>(&self, source: &S) -> SegmentationResult {
        let source = &IgnoreText::new(source, &self.opts.ignore_text);
        let mut state = SegmentState::Init;
        if source.page_count() == 0 {
            warn!("document has no pages");
            advance(&mut state, SegmentState::Done);
            return SegmentationResult::default();
        }

        advance(&mut state, SegmentState::Scanning);
        let mut report = self.scan_with(source, &[]);
        let mut missing = self.missing(&report.detections);
        let mut recovery_warnings = Vec::new();
        let mut recovery_stats = None;

        if !missing.is_empty() && self.opts.recovery {
            advance(&mut state, SegmentState::Recovering);
            let scan = self.band_scan(DetectionPass::Recovery);
            let mut stats = PassStats::new(DetectionPass::Recovery);
            let mut injected: Vec<Detection> = Vec::new();
            let mut searched: Vec<Gap> = Vec::new();
            // Each round adds at least one new label or stops.
            loop {
                let fresh: Vec<Gap> = report
                    .gaps
                    .iter()
                    .filter(|g| !searched.contains(g))
                    .cloned()
                    .collect();
                if fresh.is_empty() || missing.is_empty() {
                    break;
                }
                let (mut found, round) = recover(
                    source,
                    &scan,
                    &fresh,
                    &missing,
                    self.max_main(),
                    self.opts.line_tolerance,
                    &mut recovery_warnings,
                );
                stats.absorb(&round);
                searched.extend(fresh);
                found.retain(|d| !injected.iter().any(|i| i.label == d.label));
                if found.is_empty() {
                    break;
                }
                injected.extend(found);
                injected.sort_by(|a, b| a.page.cmp(&b.page).then(a.y.total_cmp(&b.y)));
                report = self.scan_with(source, &injected);
                missing = self.missing(&report.detections);
            }
            recovery_stats = Some(stats);
        }

        let ScanReport {
            mut detections,
            mut warnings,
            stats,
            ..
        } = report;
        warnings.extend(recovery_warnings);
        let mut all_stats = vec![stats];
        all_stats.extend(recovery_stats);

        if !missing.is_empty() && self.opts.fallback {
            advance(&mut state, SegmentState::Fallback);
            let (found, stats) =
                fallback_scan(source, &detections, &missing, self.opts.line_tolerance);
            all_stats.push(stats);
            detections.extend(found);
            detections.sort_by(|a, b| a.label.cmp(&b.label));
            missing = self.missing(&detections);
        }

        advance(&mut state, SegmentState::Building);
        let spans = build_spans(source, &detections, &self.opts);
        advance(&mut state, SegmentState::Done);

        info!(
            labels = spans.len(),
            missing = missing.len(),
            warnings = warnings.len(),
            "segmentation finished"
        );
        SegmentationResult {
            spans,
            missing: missing.into_iter().collect(),
            detections,
            warnings,
            stats: all_stats,
        }
    }
}

fn advance(state: &mut SegmentState, next: SegmentState) {
    debug!(from = %state, to = %next, "segmenter state");
    *state = next;
}
