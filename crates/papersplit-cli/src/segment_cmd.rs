use papersplit_core::{PageSlice, SegmentationResult};

use crate::cli::{OutputFormat, SegmentArgs};
use crate::shared::{build_segmenter, csv_escape, load_document, report_missing};

pub fn run(input: &SegmentArgs, format: OutputFormat) -> Result<(), i32> {
    let segmenter = build_segmenter(input)?;
    let doc = load_document(&input.file)?;
    let result = segmenter.segment(&doc);

    match format {
        OutputFormat::Text => write_text(&result),
        OutputFormat::Json => write_json(&result)?,
        OutputFormat::Csv => write_csv(&result),
    }
    for warning in &result.warnings {
        eprintln!("Warning: {warning}");
    }
    report_missing(&result.missing);
    Ok(())
}

/// `(top, bottom)` formatted to two decimals, or `-` in page mode.
fn crop_cells(slice: &PageSlice) -> (String, String) {
    match slice.crop {
        Some(crop) => (format!("{:.2}", crop.top), format!("{:.2}", crop.bottom)),
        None => ("-".to_string(), "-".to_string()),
    }
}

fn write_text(result: &SegmentationResult) {
    println!("label\tpage\ttop\tbottom");
    for span in result.spans.values() {
        for slice in &span.pages {
            let (top, bottom) = crop_cells(slice);
            println!("{}\t{}\t{top}\t{bottom}", span.label, slice.page + 1);
        }
    }
}

fn write_json(result: &SegmentationResult) -> Result<(), i32> {
    let json = serde_json::to_string_pretty(result).map_err(|e| {
        eprintln!("Error: failed to serialize result: {e}");
        1
    })?;
    println!("{json}");
    Ok(())
}

fn write_csv(result: &SegmentationResult) {
    println!("label,page,top,bottom");
    for span in result.spans.values() {
        for slice in &span.pages {
            let (top, bottom) = match slice.crop {
                Some(crop) => (format!("{:.2}", crop.top), format!("{:.2}", crop.bottom)),
                None => (String::new(), String::new()),
            };
            println!(
                "{},{},{top},{bottom}",
                csv_escape(&span.label.to_string()),
                slice.page + 1
            );
        }
    }
}
