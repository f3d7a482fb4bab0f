//! Margin trimming.
//!
//! Exam papers print the paper code, page number and copyright line in
//! strips along the top and bottom edge. [`trim_margins`] hides those strips
//! by giving every page a `/CropBox`, so neither a viewer nor the text
//! extractor sees them.

use std::path::Path;

use lopdf::Object;
use tracing::{debug, info};

use crate::error::BackendError;
use crate::lopdf_backend::LopdfDocument;

/// Strips removed from each page, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f64,
    pub bottom: f64,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: 50.0,
            bottom: 50.0,
        }
    }
}

impl Margins {
    fn check(&self) -> Result<(), BackendError> {
        for (name, value) in [("top", self.top), ("bottom", self.bottom)] {
            if !value.is_finite() || value < 0.0 {
                return Err(BackendError::Write(format!(
                    "invalid {name} margin: {value} (must be a finite, non-negative number)"
                )));
            }
        }
        Ok(())
    }
}

/// Return a copy of the PDF with `margins` cropped off every page.
///
/// Margins are measured from the currently visible box, so trimming twice
/// removes twice as much. A page too short to keep anything is an error.
pub fn trim_margins(bytes: &[u8], margins: Margins) -> Result<Vec<u8>, BackendError> {
    margins.check()?;
    let source = LopdfDocument::open(bytes)?;
    let mut doc = source.inner().clone();

    for index in 0..source.page_count() {
        let geometry = source.page_geometry(index)?;
        let bottom = geometry.height() - margins.bottom;
        if bottom <= margins.top {
            return Err(BackendError::Write(format!(
                "margins {} + {} leave nothing of page {index} ({} pt high)",
                margins.top,
                margins.bottom,
                geometry.height()
            )));
        }
        let rect = geometry.native_band(margins.top, bottom);
        let page_id = source.page_id(index)?;
        doc.get_object_mut(page_id)
            .and_then(|o| o.as_dict_mut())
            .map_err(|e| BackendError::Write(format!("failed to get page dictionary: {e}")))?
            .set("CropBox", rect.iter().map(|v| Object::from(*v)).collect::<Vec<_>>());
        debug!(page = index, ?rect, "trimmed margins");
    }

    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| BackendError::Write(format!("failed to save trimmed PDF: {e}")))?;
    Ok(buf)
}

/// Trim `input` and write the result to `output`, creating its directory.
pub fn clean_file(input: &Path, output: &Path, margins: Margins) -> Result<usize, BackendError> {
    let bytes = std::fs::read(input)?;
    let trimmed = trim_margins(&bytes, margins)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, &trimmed)?;
    let pages = LopdfDocument::open(&trimmed)?.page_count();
    info!(pages, output = %output.display(), "cleaned");
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lopdf_backend::extract_document;
    use lopdf::{ObjectId, Stream, dictionary};

    fn paper_pdf(pages: &[&[(i64, i64, &str)]]) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id: ObjectId = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let mut kids: Vec<Object> = Vec::new();
        for runs in pages {
            let body: String = runs
                .iter()
                .map(|(x, y, text)| format!("BT /F1 10 Tf {x} {y} Td ({text}) Tj ET\n"))
                .collect();
            let content_id = doc.add_object(Stream::new(dictionary! {}, body.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages.len() as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("failed to save test PDF");
        buf
    }

    #[test]
    fn header_and_footer_strips_are_hidden() {
        let pdf = paper_pdf(&[
            &[(280, 815, "2"), (50, 700, "1"), (50, 20, "9709/12/M/J/21")],
            &[(50, 600, "2")],
        ]);
        let trimmed = trim_margins(&pdf, Margins::default()).unwrap();
        let doc = extract_document(&trimmed).unwrap();
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.pages[0].height, 742.0);
        assert_eq!(doc.pages[0].width, 595.0);

        let texts: Vec<&str> = doc.pages[0].spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["1"]);
        // 842 - 50 is the new top edge
        assert!((doc.pages[0].spans[0].bbox.bottom - 94.0).abs() < 1e-6);
    }

    #[test]
    fn zero_margins_keep_the_page() {
        let pdf = paper_pdf(&[&[(50, 830, "top line")]]);
        let trimmed = trim_margins(&pdf, Margins { top: 0.0, bottom: 0.0 }).unwrap();
        let doc = extract_document(&trimmed).unwrap();
        assert_eq!(doc.pages[0].height, 842.0);
        assert_eq!(doc.pages[0].spans.len(), 1);
    }

    #[test]
    fn margins_covering_the_page_are_rejected() {
        let pdf = paper_pdf(&[&[]]);
        let err = trim_margins(&pdf, Margins { top: 500.0, bottom: 400.0 }).unwrap_err();
        assert!(err.to_string().contains("leave nothing of page 0"));
        let err = trim_margins(&pdf, Margins { top: -1.0, bottom: 0.0 }).unwrap_err();
        assert!(err.to_string().contains("invalid top margin"));
    }

    #[test]
    fn clean_file_writes_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("9709_s21_qp_12.pdf");
        std::fs::write(&input, paper_pdf(&[&[], &[]])).unwrap();
        let output = dir.path().join("cleaned/9709_s21_qp_12_cleaned.pdf");
        assert_eq!(clean_file(&input, &output, Margins::default()).unwrap(), 2);
        assert!(output.exists());
    }
}
