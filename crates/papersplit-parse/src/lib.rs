//! papersplit-parse: lopdf backend for papersplit.
//!
//! Extracts positioned text from PDF pages into the core
//! [`Document`](papersplit_core::Document) model, writes one PDF per
//! segmented label, and trims page margins.

pub mod clean;
pub mod cmap;
pub mod error;
pub mod font;
mod interpreter;
pub mod lopdf_backend;
pub mod page_geometry;
pub mod split;
pub mod text_state;

pub use clean::{Margins, clean_file, trim_margins};
pub use error::BackendError;
pub use lopdf_backend::{LopdfDocument, extract_document, open_file};
pub use page_geometry::PageGeometry;
pub use papersplit_core;
pub use split::{span_to_pdf, split_to_files};
