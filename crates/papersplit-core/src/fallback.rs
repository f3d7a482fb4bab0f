//! Fallback pass: whole-line matching without any geometric band.
//!
//! A line whose first word is a still-missing number `n` becomes a detection
//! of question `n` when it sits where `n` has to be: right after question
//! `n - 1` (or before any question when `n` is 1) and before anything
//! numbered `n` or lower.

use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::document::PageSource;
use crate::label::Label;
use crate::scanner::{Detection, DetectionPass, PassStats};

/// Scan every line of `source` for missing question numbers.
///
/// `accepted` must be in reading order. Returns new detections in reading
/// order; each missing number is taken at most once.
pub fn fallback_scan<S: PageSource + ?Sized>(
    source: &S,
    accepted: &[Detection],
    missing: &BTreeSet<u32>,
    line_tolerance: f64,
) -> (Vec<Detection>, PassStats) {
    let mut stats = PassStats::new(DetectionPass::Fallback);
    let mut known: Vec<Detection> = accepted.to_vec();
    let mut remaining = missing.clone();
    let mut found = Vec::new();

    for page in 0..source.page_count() {
        if remaining.is_empty() {
            break;
        }
        for line in source.text_lines(page, line_tolerance) {
            let Some(first) = line.text.split_whitespace().next() else {
                continue;
            };
            stats.candidates += 1;
            if !first.bytes().all(|b| b.is_ascii_digit()) {
                stats.mismatches += 1;
                continue;
            }
            let Ok(n) = first.parse::<u32>() else {
                stats.mismatches += 1;
                continue;
            };
            if !remaining.contains(&n) {
                continue;
            }

            let y = line.bbox.top;
            let prev_main = known
                .iter()
                .filter(|d| d.precedes(page, y))
                .map(|d| d.label.main())
                .max()
                .unwrap_or(0);
            let blocked = known
                .iter()
                .any(|d| d.follows(page, y) && d.label.main() <= n);
            if prev_main.checked_add(1) != Some(n) || blocked {
                trace!(page, line = %line.text, prev_main, "fallback line out of place");
                stats.rejected += 1;
                continue;
            }

            let detection = Detection {
                label: Label::new(n),
                page,
                y,
                x: line.bbox.x0,
                pass: DetectionPass::Fallback,
            };
            debug!(page, y, label = n, "accepted from line text");
            let at = known.partition_point(|d| d.precedes(page, y));
            known.insert(at, detection.clone());
            found.push(detection);
            remaining.remove(&n);
            stats.accepted += 1;
        }
    }
    (found, stats)
}
