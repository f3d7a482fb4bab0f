//! Segmentation options and document-family presets.

use crate::error::SegmentError;
use crate::geometry::BBox;
use crate::label::{Label, SubLevelGrammar};

/// Highest question number a paper may use.
pub const MAX_QUESTIONS: u32 = 999;

/// A horizontal window measured from the left page edge.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Band {
    pub x_min: f64,
    pub x_max: f64,
}

impl Band {
    pub fn new(x_min: f64, x_max: f64) -> Self {
        Self { x_min, x_max }
    }

    /// The search rectangle for this band on a page of the given size,
    /// restricted vertically by `region`.
    pub fn region(&self, page_height: f64, region: &ScanRegion) -> BBox {
        let (top, bottom) = region.vertical_bounds(page_height);
        BBox::new(self.x_min, top, self.x_max, bottom)
    }

    fn validate(&self, name: &'static str) -> Result<(), SegmentError> {
        if !self.x_min.is_finite() || !self.x_max.is_finite() || self.x_min > self.x_max {
            return Err(SegmentError::InvalidBand {
                name,
                x_min: self.x_min,
                x_max: self.x_max,
            });
        }
        Ok(())
    }
}

/// Vertical part of each page that is searched for labels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum ScanRegion {
    /// The whole page height.
    #[default]
    FullPage,
    /// A strip of `height` units at the top of the page.
    TopStrip { height: f64 },
    /// A strip of `height` units at the bottom of the page.
    BottomStrip { height: f64 },
}

impl ScanRegion {
    /// `(top, bottom)` of the region on a page of the given height.
    pub fn vertical_bounds(&self, page_height: f64) -> (f64, f64) {
        match *self {
            ScanRegion::FullPage => (0.0, page_height),
            ScanRegion::TopStrip { height } => (0.0, height.min(page_height)),
            ScanRegion::BottomStrip { height } => ((page_height - height).max(0.0), page_height),
        }
    }
}

/// How spans are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SplitMode {
    /// Whole pages per label.
    #[default]
    Pages,
    /// Whole pages plus a vertical crop range on the first and last page.
    Crop,
}

/// Configuration for one segmentation run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SegmentOptions {
    /// Margin band for the primary scan. Default: 0-75.
    pub left_band: Band,
    /// Wider band used when re-scanning bounded gaps. Default: 0-85.
    pub recovery_band: Band,
    /// Vertical region searched on each page. Default: whole page.
    pub region: ScanRegion,
    /// Questions are expected to be numbered `1..=max_questions`. Default: 12.
    pub max_questions: u32,
    /// Sub-level grammar. Default: nested.
    pub grammar: SubLevelGrammar,
    /// Distance kept above each label when cropping. Default: 5.
    pub safety_margin: f64,
    /// Page ranges only, or page ranges plus crop boxes. Default: pages.
    pub mode: SplitMode,
    /// In crop mode, pull a span's open bottom edge up to the lowest text
    /// on the page. Default: true.
    pub tighten_to_text: bool,
    /// Vertical distance within which spans count as one line. Default: 3.
    pub line_tolerance: f64,
    /// Only consider the first label after each occurrence of this text
    /// (mark-scheme tables headed "Guidance"). Default: none.
    pub anchor_text: Option<String>,
    /// Label considered open before the first page, for files that hold a
    /// single question and only print bare sub-part markers. Default: none.
    pub open_label: Option<Label>,
    /// Spans containing any of these texts (case-insensitive) are invisible
    /// to every pass, e.g. the paper code and copyright line printed on
    /// each page. Default: none.
    pub ignore_text: Vec<String>,
    /// Run the gap recovery pass. Default: true.
    pub recovery: bool,
    /// Run the fallback line pass. Default: true.
    pub fallback: bool,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            left_band: Band::new(0.0, 75.0),
            recovery_band: Band::new(0.0, 85.0),
            region: ScanRegion::FullPage,
            max_questions: 12,
            grammar: SubLevelGrammar::Nested,
            safety_margin: 5.0,
            mode: SplitMode::Pages,
            tighten_to_text: true,
            line_tolerance: 3.0,
            anchor_text: None,
            open_label: None,
            ignore_text: Vec::new(),
            recovery: true,
            fallback: true,
        }
    }
}

impl SegmentOptions {
    /// Preset options for a document family.
    pub fn for_family(family: DocumentFamily) -> Self {
        let base = Self::default();
        match family {
            DocumentFamily::QuestionPaper => base,
            DocumentFamily::MarkScheme => Self {
                left_band: Band::new(0.0, 80.0),
                recovery_band: Band::new(0.0, 100.0),
                mode: SplitMode::Crop,
                ..base
            },
            DocumentFamily::McqMarkScheme => Self {
                left_band: Band::new(0.0, 60.0),
                recovery_band: Band::new(0.0, 85.0),
                max_questions: 40,
                ..base
            },
            DocumentFamily::GuidanceMarkScheme => Self {
                left_band: Band::new(0.0, 120.0),
                recovery_band: Band::new(0.0, 160.0),
                anchor_text: Some("Guidance".to_string()),
                ..base
            },
            DocumentFamily::RomanSubparts => Self {
                left_band: Band::new(88.0, 107.0),
                recovery_band: Band::new(80.0, 120.0),
                grammar: SubLevelGrammar::Roman,
                mode: SplitMode::Crop,
                ..base
            },
        }
    }

    /// Check that every option is usable.
    pub fn validate(&self) -> Result<(), SegmentError> {
        self.left_band.validate("left_band")?;
        self.recovery_band.validate("recovery_band")?;
        check_length("safety_margin", self.safety_margin)?;
        check_length("line_tolerance", self.line_tolerance)?;
        match self.region {
            ScanRegion::FullPage => {}
            ScanRegion::TopStrip { height } => check_length("top_band_height", height)?,
            ScanRegion::BottomStrip { height } => check_length("bottom_band_height", height)?,
        }
        if self.max_questions == 0 {
            return Err(SegmentError::NoQuestions);
        }
        if self.max_questions > MAX_QUESTIONS {
            return Err(SegmentError::TooManyQuestions {
                name: "max_questions",
                value: self.max_questions,
            });
        }
        if let Some(open) = self.open_label.as_ref().filter(|l| l.main() > MAX_QUESTIONS) {
            return Err(SegmentError::TooManyQuestions {
                name: "open_label",
                value: open.main(),
            });
        }
        if self
            .anchor_text
            .as_deref()
            .is_some_and(|a| a.trim().is_empty())
        {
            return Err(SegmentError::EmptyAnchor);
        }
        if self.ignore_text.iter().any(|t| t.trim().is_empty()) {
            return Err(SegmentError::EmptyIgnoreText);
        }
        Ok(())
    }
}

fn check_length(name: &'static str, value: f64) -> Result<(), SegmentError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SegmentError::InvalidLength { name, value })
    }
}

/// Families of exam documents with their own layout conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum DocumentFamily {
    /// Question papers: numbers in a 75-unit margin.
    QuestionPaper,
    /// Structured mark schemes: labels within 80 units, cropped per label.
    MarkScheme,
    /// Multiple-choice answer keys: up to 40 numbers within 60 units.
    McqMarkScheme,
    /// Mark-scheme tables where the label follows a "Guidance" header.
    GuidanceMarkScheme,
    /// Single-question files split on `(i)`, `(ii)` in an inner column.
    RomanSubparts,
}

impl DocumentFamily {
    pub const ALL: [DocumentFamily; 5] = [
        DocumentFamily::QuestionPaper,
        DocumentFamily::MarkScheme,
        DocumentFamily::McqMarkScheme,
        DocumentFamily::GuidanceMarkScheme,
        DocumentFamily::RomanSubparts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFamily::QuestionPaper => "question-paper",
            DocumentFamily::MarkScheme => "mark-scheme",
            DocumentFamily::McqMarkScheme => "mcq-mark-scheme",
            DocumentFamily::GuidanceMarkScheme => "guidance-mark-scheme",
            DocumentFamily::RomanSubparts => "roman-subparts",
        }
    }
}
