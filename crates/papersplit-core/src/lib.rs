//! papersplit-core: backend-independent question segmentation.
//!
//! This crate provides the document model consumed by the segmenter (pages
//! with positioned text spans), the question label grammar, and the
//! multi-pass segmenter that maps each question label to the pages (and,
//! in crop mode, page regions) that belong to it. It knows nothing about PDF
//! files; `papersplit-parse` turns PDFs into [`Document`]s.

pub mod document;
pub mod error;
pub mod fallback;
pub mod geometry;
pub mod label;
pub mod options;
pub mod paper;
pub mod recovery;
pub mod scanner;
pub mod segmenter;
pub mod spans;

pub use document::{Document, IgnoreText, Page, PageSource, TextLine, TextSpan};
pub use error::{SegmentError, SegmentWarning, WarningCode};
pub use geometry::{BBox, Ctm};
pub use label::{Label, ParseMismatch, SubLevel, SubLevelGrammar};
pub use options::{Band, DocumentFamily, MAX_QUESTIONS, ScanRegion, SegmentOptions, SplitMode};
pub use paper::{PAGE_FURNITURE, PaperId, PaperKind, Session};
pub use scanner::{Detection, DetectionPass, PassStats, Sequencer, Verdict};
pub use segmenter::{ScanReport, SegmentState, SegmentationResult, Segmenter};
pub use spans::{Crop, PageSlice, Span};
