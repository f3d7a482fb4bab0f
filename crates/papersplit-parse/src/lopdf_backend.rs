//! lopdf-based document loading and text extraction.
//!
//! Turns PDF bytes into the core [`Document`] model: one [`Page`] per PDF
//! page, sized by its visible box, carrying the text spans found by the
//! content stream interpreter.

use std::path::Path;

use papersplit_core::{Ctm, Document, Page};
use tracing::{debug, warn};

use crate::error::BackendError;
use crate::interpreter::SpanCollector;
use crate::page_geometry::PageGeometry;

/// US Letter, used when neither the page nor its ancestors define a MediaBox.
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// A parsed PDF document backed by lopdf.
pub struct LopdfDocument {
    inner: lopdf::Document,
    /// Page object ids, indexed by 0-based page number.
    page_ids: Vec<lopdf::ObjectId>,
}

impl std::fmt::Debug for LopdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LopdfDocument")
            .field("page_count", &self.page_ids.len())
            .finish_non_exhaustive()
    }
}

impl LopdfDocument {
    /// Parse a PDF from memory.
    ///
    /// Documents encrypted with an empty user password are decrypted;
    /// anything else encrypted is rejected with [`BackendError::Encrypted`].
    pub fn open(bytes: &[u8]) -> Result<Self, BackendError> {
        let mut inner = lopdf::Document::load_mem(bytes)
            .map_err(|e| BackendError::Parse(format!("failed to parse PDF: {e}")))?;
        if inner.is_encrypted() && inner.decrypt("").is_err() {
            return Err(BackendError::Encrypted);
        }
        // get_pages returns a BTreeMap with 1-based keys
        let page_ids = inner.get_pages().values().copied().collect();
        Ok(Self { inner, page_ids })
    }

    /// Access the underlying lopdf document.
    pub fn inner(&self) -> &lopdf::Document {
        &self.inner
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub(crate) fn page_id(&self, index: usize) -> Result<lopdf::ObjectId, BackendError> {
        self.page_ids
            .get(index)
            .copied()
            .ok_or(BackendError::InvalidPage {
                index,
                count: self.page_ids.len(),
            })
    }

    /// Visible geometry of page `index` (MediaBox, clipped by the CropBox).
    pub fn page_geometry(&self, index: usize) -> Result<PageGeometry, BackendError> {
        let page_id = self.page_id(index)?;
        let media_box = match resolve_inherited(&self.inner, page_id, b"MediaBox")? {
            Some(obj) => extract_box_from_array(&self.inner, obj)?,
            None => {
                warn!(page = index, "no MediaBox, assuming US Letter");
                DEFAULT_MEDIA_BOX
            }
        };
        let crop_box = match resolve_inherited(&self.inner, page_id, b"CropBox")? {
            Some(obj) => Some(extract_box_from_array(&self.inner, obj)?),
            None => None,
        };
        Ok(PageGeometry::new(media_box, crop_box))
    }

    /// Extract the positioned text of page `index`.
    pub fn extract_page(&self, index: usize) -> Result<Page, BackendError> {
        let page_id = self.page_id(index)?;
        let geometry = self.page_geometry(index)?;
        let page_dict = self
            .inner
            .get_object(page_id)
            .and_then(|o| o.as_dict())
            .map_err(|e| BackendError::Parse(format!("failed to get page dictionary: {e}")))?;

        let content = get_page_content_bytes(&self.inner, page_dict)?;
        let resources = resolve_inherited(&self.inner, page_id, b"Resources")?
            .map(|obj| resolve_object(&self.inner, obj))
            .and_then(|obj| obj.as_dict().ok());

        let mut collector = SpanCollector::new(&self.inner, geometry);
        collector.run(&content, resources, Ctm::identity(), 0)?;

        let mut page = Page::new(index, geometry.width(), geometry.height());
        let visible = page.bbox();
        page.spans = collector
            .into_spans()
            .into_iter()
            .filter(|s| s.bbox.x1 > visible.x0 && s.bbox.x0 < visible.x1)
            .filter(|s| s.bbox.bottom > visible.top && s.bbox.top < visible.bottom)
            .collect();
        debug!(page = index, spans = page.spans.len(), "extracted page text");
        Ok(page)
    }

    /// Extract every page into a core [`Document`].
    pub fn to_document(&self) -> Result<Document, BackendError> {
        let pages = (0..self.page_count())
            .map(|i| self.extract_page(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Document::new(pages))
    }
}

/// Parse PDF bytes and extract positioned text from every page.
pub fn extract_document(bytes: &[u8]) -> Result<Document, BackendError> {
    LopdfDocument::open(bytes)?.to_document()
}

/// Read a PDF file and extract positioned text from every page.
pub fn open_file(path: impl AsRef<Path>) -> Result<Document, BackendError> {
    let bytes = std::fs::read(path.as_ref())?;
    extract_document(&bytes)
}

/// Read a 4-number box array `[x0, y0, x1, y1]`.
fn extract_box_from_array(
    doc: &lopdf::Document,
    obj: &lopdf::Object,
) -> Result<[f64; 4], BackendError> {
    let array = resolve_object(doc, obj)
        .as_array()
        .map_err(|e| BackendError::Parse(format!("page box is not an array: {e}")))?;
    if array.len() != 4 {
        return Err(BackendError::Parse(format!(
            "expected 4-element array for box, got {}",
            array.len()
        )));
    }
    let mut out = [0.0; 4];
    for (slot, value) in out.iter_mut().zip(array) {
        *slot = object_to_f64(resolve_object(doc, value))?;
    }
    Ok(out)
}

/// Convert a lopdf numeric object (Integer or Real) to f64.
pub(crate) fn object_to_f64(obj: &lopdf::Object) -> Result<f64, BackendError> {
    match obj {
        lopdf::Object::Integer(i) => Ok(*i as f64),
        lopdf::Object::Real(f) => Ok(*f as f64),
        _ => Err(BackendError::Parse(format!("expected number, got {obj:?}"))),
    }
}

/// Follow an indirect reference, or return the object itself.
pub(crate) fn resolve_object<'a>(
    doc: &'a lopdf::Document,
    obj: &'a lopdf::Object,
) -> &'a lopdf::Object {
    match obj {
        lopdf::Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Look up a key in the page dictionary, walking up the page tree
/// (via /Parent) if the key is not found on the page itself.
pub(crate) fn resolve_inherited<'a>(
    doc: &'a lopdf::Document,
    page_id: lopdf::ObjectId,
    key: &[u8],
) -> Result<Option<&'a lopdf::Object>, BackendError> {
    let mut current_id = page_id;
    // Bounded so a cyclic /Parent chain cannot loop forever.
    for _ in 0..64 {
        let dict = doc
            .get_object(current_id)
            .and_then(|o| o.as_dict())
            .map_err(|e| BackendError::Parse(format!("failed to get page dictionary: {e}")))?;

        if let Ok(value) = dict.get(key) {
            return Ok(Some(value));
        }
        match dict.get(b"Parent") {
            Ok(parent_obj) => {
                current_id = parent_obj
                    .as_reference()
                    .map_err(|e| BackendError::Parse(format!("invalid /Parent reference: {e}")))?;
            }
            Err(_) => return Ok(None),
        }
    }
    Err(BackendError::Parse("page tree /Parent chain too deep".to_string()))
}

/// Get the content stream bytes from a page dictionary.
///
/// Handles both single stream references and arrays of stream references.
fn get_page_content_bytes(
    doc: &lopdf::Document,
    page_dict: &lopdf::Dictionary,
) -> Result<Vec<u8>, BackendError> {
    let contents_obj = match page_dict.get(b"Contents") {
        Ok(obj) => obj,
        Err(_) => return Ok(Vec::new()),
    };

    match resolve_object(doc, contents_obj) {
        lopdf::Object::Stream(stream) => decode_content_stream(stream),
        lopdf::Object::Array(arr) => {
            let mut content = Vec::new();
            for item in arr {
                let stream = resolve_object(doc, item).as_stream().map_err(|e| {
                    BackendError::Parse(format!("/Contents array item is not a stream: {e}"))
                })?;
                let bytes = decode_content_stream(stream)?;
                if !content.is_empty() {
                    content.push(b' ');
                }
                content.extend_from_slice(&bytes);
            }
            Ok(content)
        }
        _ => Err(BackendError::Parse(
            "/Contents is not a stream or array".to_string(),
        )),
    }
}

/// Decode a content stream, decompressing if needed.
pub(crate) fn decode_content_stream(stream: &lopdf::Stream) -> Result<Vec<u8>, BackendError> {
    if stream.dict.get(b"Filter").is_ok() {
        stream
            .decompressed_content()
            .map_err(|e| BackendError::Parse(format!("failed to decompress content stream: {e}")))
    } else {
        Ok(stream.content.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Object, ObjectId, Stream, dictionary};

    /// Build a PDF whose pages each show the given `(x, y, text)` runs with
    /// Helvetica at 10pt.
    fn create_test_pdf(pages: &[&[(i64, i64, &str)]]) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id: ObjectId = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut page_ids: Vec<Object> = Vec::new();
        for runs in pages {
            let mut content = String::new();
            for (x, y, text) in runs.iter() {
                content.push_str(&format!("BT /F1 10 Tf {x} {y} Td ({text}) Tj ET\n"));
            }
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            page_ids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => page_ids,
                "Count" => pages.len() as i64,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
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
    fn extracts_spans_with_inherited_media_box_and_resources() {
        let pdf = create_test_pdf(&[&[(50, 742, "1"), (90, 742, "Describe")], &[(50, 800, "2(a)")]]);
        let doc = extract_document(&pdf).unwrap();
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.pages[0].width, 595.0);
        assert_eq!(doc.pages[0].height, 842.0);

        let texts: Vec<&str> = doc.pages[0].spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["1", "Describe"]);
        let first = &doc.pages[0].spans[0];
        assert!((first.bbox.x0 - 50.0).abs() < 1e-6);
        assert!(first.bbox.top < first.bbox.bottom);
        assert!((first.bbox.bottom - 102.0).abs() < 1e-6);

        assert_eq!(doc.pages[1].index, 1);
        assert_eq!(doc.pages[1].spans[0].text, "2(a)");
    }

    #[test]
    fn page_without_contents_is_empty() {
        let pdf = create_test_pdf(&[&[]]);
        let doc = extract_document(&pdf).unwrap();
        assert!(doc.pages[0].spans.is_empty());
    }

    #[test]
    fn invalid_bytes_are_a_parse_error() {
        let err = extract_document(b"not a pdf").unwrap_err();
        assert!(matches!(err, BackendError::Parse(_)));
    }

    #[test]
    fn page_index_out_of_range() {
        let pdf = create_test_pdf(&[&[]]);
        let doc = LopdfDocument::open(&pdf).unwrap();
        assert!(matches!(
            doc.extract_page(3),
            Err(BackendError::InvalidPage { index: 3, count: 1 })
        ));
    }

    #[test]
    fn crop_box_shrinks_the_visible_page() {
        let pdf = create_test_pdf(&[&[(50, 742, "1")]]);
        let mut inner = lopdf::Document::load_mem(&pdf).unwrap();
        let page_id = *inner.get_pages().values().next().unwrap();
        inner
            .get_object_mut(page_id)
            .and_then(|o| o.as_dict_mut())
            .unwrap()
            .set("CropBox", vec![0.into(), 0.into(), 595.into(), 792.into()]);
        let mut buf = Vec::new();
        inner.save_to(&mut buf).unwrap();

        let doc = extract_document(&buf).unwrap();
        assert_eq!(doc.pages[0].height, 792.0);
        assert!((doc.pages[0].spans[0].bbox.bottom - 52.0).abs() < 1e-6);
    }

    #[test]
    fn text_hidden_by_crop_box_is_dropped() {
        let pdf = create_test_pdf(&[&[(50, 820, "9709/12/M/J/21"), (50, 700, "1")]]);
        let mut inner = lopdf::Document::load_mem(&pdf).unwrap();
        let page_id = *inner.get_pages().values().next().unwrap();
        inner
            .get_object_mut(page_id)
            .and_then(|o| o.as_dict_mut())
            .unwrap()
            .set("CropBox", vec![0.into(), 50.into(), 595.into(), 792.into()]);
        let mut buf = Vec::new();
        inner.save_to(&mut buf).unwrap();

        let doc = extract_document(&buf).unwrap();
        let texts: Vec<&str> = doc.pages[0].spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["1"]);
    }

    #[test]
    fn open_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.pdf");
        std::fs::write(&path, create_test_pdf(&[&[(50, 742, "1")]])).unwrap();
        let doc = open_file(&path).unwrap();
        assert_eq!(doc.pages.len(), 1);
        assert!(matches!(
            open_file(dir.path().join("missing.pdf")),
            Err(BackendError::Io(_))
        ));
    }
}
