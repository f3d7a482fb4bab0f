//! Gap recovery: re-scan the region between a question and a number that
//! jumped past its successor, with a wider band.

use std::collections::BTreeSet;

use tracing::debug;

use crate::document::PageSource;
use crate::error::SegmentWarning;
use crate::scanner::{scan_window, BandScan, Detection, Gap, PassStats, ScanWindow, Sequencer};

/// Search each gap for its missing questions.
///
/// Each gap gets its own sequencer seeded with the lower anchor's label,
/// only sees the region strictly between the two anchors, and only keeps
/// labels whose main number lies between them and is still in `missing`.
/// Gaps with nothing missing are skipped. Returns the recovered detections
/// in reading order.
pub fn recover<S: PageSource + ?Sized>(
    source: &S,
    scan: &BandScan<'_>,
    gaps: &[Gap],
    missing: &BTreeSet<u32>,
    max_questions: u32,
    line_tolerance: f64,
    warnings: &mut Vec<SegmentWarning>,
) -> (Vec<Detection>, PassStats) {
    let mut stats = PassStats::new(scan.pass);
    let mut recovered = Vec::new();

    for gap in gaps {
        let wanted = gap.missing();
        if !wanted.clone().any(|n| missing.contains(&n)) {
            continue;
        }
        debug!(
            lower = %gap.lower.label,
            upper = %gap.upper.label,
            pages = ?(gap.lower.page, gap.upper.page),
            "searching gap"
        );
        let mut sequencer = Sequencer::seeded(max_questions, line_tolerance, gap.lower.label.clone());
        let gap_stats = scan_window(
            source,
            scan,
            &ScanWindow::between(&gap.lower, &gap.upper),
            &mut sequencer,
            &[],
            |label| wanted.contains(&label.main()) && missing.contains(&label.main()),
            warnings,
        );
        stats.absorb(&gap_stats);
        recovered.extend(sequencer.into_accepted());
    }
    recovered.sort_by(|a, b| a.page.cmp(&b.page).then(a.y.total_cmp(&b.y)));
    (recovered, stats)
}
