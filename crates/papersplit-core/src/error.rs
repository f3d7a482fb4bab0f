//! Error and warning types for papersplit.
//!
//! Provides [`SegmentError`] for invalid configuration (the only thing that
//! can stop a run before it starts) and [`SegmentWarning`] for the non-fatal
//! issues recorded while scanning. Segmentation itself never fails: rejected
//! detections become warnings and unresolved labels are reported in the
//! result.

use std::fmt;

/// Fatal configuration errors.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentError {
    /// A band's `x_min` is greater than its `x_max`, or an edge is not finite.
    InvalidBand {
        /// Which band ("left_band", "recovery_band").
        name: &'static str,
        x_min: f64,
        x_max: f64,
    },
    /// A length option (margin, strip height, tolerance) is negative or not finite.
    InvalidLength {
        /// Option name.
        name: &'static str,
        value: f64,
    },
    /// `max_questions` must be at least 1.
    NoQuestions,
    /// A question number (`max_questions` or the open label's) is above
    /// [`MAX_QUESTIONS`](crate::options::MAX_QUESTIONS).
    TooManyQuestions {
        name: &'static str,
        value: u32,
    },
    /// Anchor text was configured but is blank.
    EmptyAnchor,
    /// An `ignore_text` entry is blank and would hide every span.
    EmptyIgnoreText,
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentError::InvalidBand { name, x_min, x_max } => {
                write!(f, "invalid {name}: x_min {x_min} must not exceed x_max {x_max}")
            }
            SegmentError::InvalidLength { name, value } => {
                write!(f, "invalid {name}: {value} (must be a finite, non-negative number)")
            }
            SegmentError::NoQuestions => write!(f, "max_questions must be at least 1"),
            SegmentError::TooManyQuestions { name, value } => write!(
                f,
                "invalid {name}: {value} exceeds the limit of {}",
                crate::options::MAX_QUESTIONS
            ),
            SegmentError::EmptyAnchor => write!(f, "anchor_text must not be blank"),
            SegmentError::EmptyIgnoreText => write!(f, "ignore_text entries must not be blank"),
        }
    }
}

impl std::error::Error for SegmentError {}

/// Machine-readable warning code for rejected detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum WarningCode {
    /// The label broke monotonic question order and was discarded.
    SequenceViolation,
    /// The label was already detected earlier on the same page.
    DuplicateLabel,
    /// The label's main number exceeds `max_questions`.
    OutOfRange,
}

impl WarningCode {
    /// Returns the string tag for this warning code.
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningCode::SequenceViolation => "SEQUENCE_VIOLATION",
            WarningCode::DuplicateLabel => "DUPLICATE_LABEL",
            WarningCode::OutOfRange => "OUT_OF_RANGE",
        }
    }
}

impl fmt::Display for WarningCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal issue encountered while scanning.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentWarning {
    /// Machine-readable warning code.
    pub code: WarningCode,
    /// Page where the rejected detection was found (0-indexed).
    pub page: usize,
    /// The label text that was rejected.
    pub text: String,
    /// Human-readable description.
    pub description: String,
}

impl SegmentWarning {
    pub fn new(
        code: WarningCode,
        page: usize,
        text: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            code,
            page,
            text: text.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for SegmentWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] page {}: '{}': {}",
            self.code,
            self.page + 1,
            self.text,
            self.description
        )
    }
}
