//! Per-label PDF writer.
//!
//! Each [`Span`] becomes its own PDF holding a copy of the span's pages in
//! document order. In crop mode every kept page gets a `/CropBox` covering
//! its slice of the page at full width.

use std::path::{Path, PathBuf};

use lopdf::Object;
use papersplit_core::{SegmentationResult, Span};
use tracing::{debug, info};

use crate::error::BackendError;
use crate::lopdf_backend::LopdfDocument;

/// Write one `<label>.pdf` per span of `result` into `out_dir`.
///
/// The directory is created when missing. Returns the written paths in
/// label order.
pub fn split_to_files(
    bytes: &[u8],
    result: &SegmentationResult,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, BackendError> {
    let source = LopdfDocument::open(bytes)?;
    std::fs::create_dir_all(out_dir)?;

    let mut written = Vec::with_capacity(result.spans.len());
    for span in result.spans.values() {
        let pdf = span_to_pdf(&source, span)?;
        let path = out_dir.join(format!("{}.pdf", span.label));
        std::fs::write(&path, pdf)?;
        debug!(label = %span.label, path = %path.display(), "wrote span");
        written.push(path);
    }
    info!(files = written.len(), dir = %out_dir.display(), "split complete");
    Ok(written)
}

/// Render a single span as PDF bytes.
pub fn span_to_pdf(source: &LopdfDocument, span: &Span) -> Result<Vec<u8>, BackendError> {
    let count = source.page_count();
    let mut doc = source.inner().clone();

    for slice in &span.pages {
        let page_id = source.page_id(slice.page)?;
        if let Some(crop) = slice.crop {
            let rect = source.page_geometry(slice.page)?.native_band(crop.top, crop.bottom);
            let dict = doc
                .get_object_mut(page_id)
                .and_then(|o| o.as_dict_mut())
                .map_err(|e| BackendError::Write(format!("failed to get page dictionary: {e}")))?;
            dict.set("CropBox", rect.iter().map(|v| Object::from(*v)).collect::<Vec<_>>());
        }
    }

    // lopdf page numbers are 1-based
    let drop: Vec<u32> = (0..count)
        .filter(|i| !span.contains_page(*i))
        .map(|i| i as u32 + 1)
        .collect();
    if drop.len() == count {
        return Err(BackendError::Write(format!("span {} has no pages", span.label)));
    }
    doc.delete_pages(&drop);
    doc.prune_objects();

    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| BackendError::Write(format!("failed to save {}: {e}", span.label)))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{ObjectId, Stream, dictionary};
    use papersplit_core::{Crop, Label, PageSlice};

    fn three_page_pdf() -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id: ObjectId = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::new();
        for i in 0..3 {
            let content = format!("BT /F1 10 Tf 50 742 Td ({}) Tj ET", i + 1);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => 3,
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

    fn span(label: u32, pages: Vec<PageSlice>) -> Span {
        Span {
            label: Label::new(label),
            pages,
        }
    }

    #[test]
    fn span_keeps_only_its_pages() {
        let source = LopdfDocument::open(&three_page_pdf()).unwrap();
        let s = span(
            2,
            vec![PageSlice { page: 1, crop: None }, PageSlice { page: 2, crop: None }],
        );
        let out = span_to_pdf(&source, &s).unwrap();
        let written = LopdfDocument::open(&out).unwrap();
        assert_eq!(written.page_count(), 2);
        let doc = written.to_document().unwrap();
        assert_eq!(doc.pages[0].spans[0].text, "2");
        assert_eq!(doc.pages[1].spans[0].text, "3");
    }

    #[test]
    fn crop_sets_crop_box_in_native_space() {
        let source = LopdfDocument::open(&three_page_pdf()).unwrap();
        let s = span(
            1,
            vec![PageSlice {
                page: 0,
                crop: Some(Crop { top: 95.0, bottom: 400.0 }),
            }],
        );
        let out = span_to_pdf(&source, &s).unwrap();
        let written = LopdfDocument::open(&out).unwrap();
        let geometry = written.page_geometry(0).unwrap();
        assert_eq!(geometry.height(), 305.0);
        assert_eq!(geometry.width(), 595.0);
    }

    #[test]
    fn page_outside_document_is_an_error() {
        let source = LopdfDocument::open(&three_page_pdf()).unwrap();
        let s = span(9, vec![PageSlice { page: 7, crop: None }]);
        assert!(matches!(
            span_to_pdf(&source, &s),
            Err(BackendError::InvalidPage { index: 7, count: 3 })
        ));
    }

    #[test]
    fn split_writes_one_file_per_label() {
        let dir = tempfile::tempdir().unwrap();
        let mut result = SegmentationResult::default();
        for (label, page) in [(1, 0), (2, 2)] {
            result
                .spans
                .insert(Label::new(label), span(label, vec![PageSlice { page, crop: None }]));
        }
        let out_dir = dir.path().join("nested/out");
        let paths = split_to_files(&three_page_pdf(), &result, &out_dir).unwrap();
        assert_eq!(paths, vec![out_dir.join("1.pdf"), out_dir.join("2.pdf")]);
        assert!(paths.iter().all(|p| p.exists()));
    }
}
