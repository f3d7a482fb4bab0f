use std::path::Path;

use tracing::info;

use crate::cli::SegmentArgs;
use crate::shared::{build_segmenter, has_extension, paper_id, report_missing};

pub fn run(input: &SegmentArgs, output_dir: &Path, flat: bool) -> Result<(), i32> {
    if has_extension(&input.file, "json") {
        eprintln!("Error: split needs the original PDF, not a JSON dump");
        return Err(1);
    }
    let segmenter = build_segmenter(input)?;
    if !input.file.exists() {
        eprintln!("Error: file not found: {}", input.file.display());
        return Err(1);
    }
    let bytes = std::fs::read(&input.file).map_err(|e| {
        eprintln!("Error: failed to read {}: {e}", input.file.display());
        1
    })?;
    let doc = papersplit_parse::extract_document(&bytes).map_err(|e| {
        eprintln!("Error: failed to open PDF: {e}");
        1
    })?;

    let result = segmenter.segment(&doc);
    if result.spans.is_empty() {
        eprintln!("Error: no questions found in {}", input.file.display());
        report_missing(&result.missing);
        return Err(1);
    }

    let target = match paper_id(&input.file) {
        Some(id) if !flat => {
            info!(paper = %id, "using paper layout");
            output_dir.join(id.output_dir())
        }
        _ => output_dir.to_path_buf(),
    };
    let written = papersplit_parse::split_to_files(&bytes, &result, &target).map_err(|e| {
        eprintln!("Error: {e}");
        1
    })?;

    for path in &written {
        println!("{}", path.display());
    }
    for warning in &result.warnings {
        eprintln!("Warning: {warning}");
    }
    report_missing(&result.missing);
    Ok(())
}
