use papersplit_core::ScanReport;

use crate::cli::{OutputFormat, SegmentArgs};
use crate::shared::{build_segmenter, csv_escape, load_document};

/// Print what the primary margin scan sees: accepted labels and the
/// candidates it rejected, without recovery or fallback.
pub fn run(input: &SegmentArgs, format: OutputFormat) -> Result<(), i32> {
    let segmenter = build_segmenter(input)?;
    let doc = load_document(&input.file)?;
    let report = segmenter.scan(&doc);

    match format {
        OutputFormat::Text => write_text(&report),
        OutputFormat::Json => write_json(&report)?,
        OutputFormat::Csv => write_csv(&report),
    }
    Ok(())
}

fn write_text(report: &ScanReport) {
    println!("status\tpage\ty\tx\ttext");
    for d in &report.detections {
        println!("accepted\t{}\t{:.2}\t{:.2}\t{}", d.page + 1, d.y, d.x, d.label);
    }
    for w in &report.warnings {
        println!("{}\t{}\t-\t-\t{}", w.code.as_str(), w.page + 1, w.text);
    }
    for gap in &report.gaps {
        let missing: Vec<String> = gap.missing().map(|n| n.to_string()).collect();
        println!(
            "gap\t{}\t{:.2}\t-\t{} -> {} (missing {})",
            gap.upper.page + 1,
            gap.upper.y,
            gap.lower.label,
            gap.upper.label,
            missing.join(", ")
        );
    }
    println!(
        "# {} candidates, {} accepted, {} refined, {} rejected, {} not labels",
        report.stats.candidates,
        report.stats.accepted,
        report.stats.refined,
        report.stats.rejected,
        report.stats.mismatches
    );
}

fn write_json(report: &ScanReport) -> Result<(), i32> {
    let json = serde_json::to_string_pretty(report).map_err(|e| {
        eprintln!("Error: failed to serialize scan report: {e}");
        1
    })?;
    println!("{json}");
    Ok(())
}

fn write_csv(report: &ScanReport) {
    println!("status,page,y,x,text");
    for d in &report.detections {
        println!(
            "accepted,{},{:.2},{:.2},{}",
            d.page + 1,
            d.y,
            d.x,
            csv_escape(&d.label.to_string())
        );
    }
    for w in &report.warnings {
        println!("{},{},,,{}", w.code.as_str(), w.page + 1, csv_escape(&w.text));
    }
}
