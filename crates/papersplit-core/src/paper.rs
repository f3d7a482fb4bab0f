//! Paper identification from conventional exam file names.
//!
//! Names look like `9709_s21_qp_12_cleaned.pdf`: subject code, session letter
//! with two-digit year, `qp` (question paper) or `ms` (mark scheme), and the
//! paper/variant number.
//!
//! A known paper also tells which printed text is boilerplate: the paper
//! code in the footer (`9709/12/M/J/21`), the copyright line, and page
//! furniture such as `[Turn over`.

use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

use crate::options::DocumentFamily;

static PAPER_NAME: OnceLock<Option<Regex>> = OnceLock::new();

fn paper_name_regex() -> Option<&'static Regex> {
    PAPER_NAME
        .get_or_init(|| {
            Regex::new(r"^(\d{4})_([msw])(\d{2})_(qp|ms)_(\d{1,2})(?:_cleaned)?(?:\.pdf)?$").ok()
        })
        .as_ref()
}

/// Printed on pages of every paper regardless of its code.
pub const PAGE_FURNITURE: &[&str] = &[
    "[Turn over",
    "BLANK PAGE",
    "ADDITIONAL PAGE",
    "PLEASE TURN OVER",
    "DO NOT WRITE IN THIS MARGIN",
    "Answer all the questions in the spaces provided.",
    "www.dynamicpapers.com",
];

/// Examination session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Session {
    FebMarch,
    MayJune,
    OctNov,
}

impl Session {
    fn from_code(code: &str) -> Option<Self> {
        match code {
            "m" => Some(Session::FebMarch),
            "s" => Some(Session::MayJune),
            "w" => Some(Session::OctNov),
            _ => None,
        }
    }

    /// Series code printed in paper footers: `F/M`, `M/J` or `O/N`.
    pub fn series(&self) -> &'static str {
        match self {
            Session::FebMarch => "F/M",
            Session::MayJune => "M/J",
            Session::OctNov => "O/N",
        }
    }

    /// Directory name used in the output layout.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Session::FebMarch => "Feb_March",
            Session::MayJune => "May_June",
            Session::OctNov => "Oct_Nov",
        }
    }
}

/// Question paper or mark scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PaperKind {
    QuestionPaper,
    MarkScheme,
}

impl PaperKind {
    pub fn code(&self) -> &'static str {
        match self {
            PaperKind::QuestionPaper => "qp",
            PaperKind::MarkScheme => "ms",
        }
    }
}

/// Identity of one exam paper.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PaperId {
    pub subject: String,
    pub session: Session,
    /// Four-digit year.
    pub year: u16,
    pub kind: PaperKind,
    /// Paper/variant number as written in the file name, so `02` keeps its
    /// leading zero.
    pub paper: String,
}

impl PaperId {
    /// Parse a file name (not a path). `None` when it does not follow the
    /// naming convention.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let caps = paper_name_regex()?.captures(name)?;
        let kind = match &caps[4] {
            "qp" => PaperKind::QuestionPaper,
            _ => PaperKind::MarkScheme,
        };
        Some(Self {
            subject: caps[1].to_string(),
            session: Session::from_code(&caps[2])?,
            year: 2000 + caps[3].parse::<u16>().ok()?,
            kind,
            paper: caps[5].to_string(),
        })
    }

    /// `<subject>/<year>/<session>/<qp|ms>/<paper>`.
    pub fn output_dir(&self) -> PathBuf {
        [
            self.subject.clone(),
            self.year.to_string(),
            self.session.dir_name().to_string(),
            self.kind.code().to_string(),
            self.paper.clone(),
        ]
        .iter()
        .collect()
    }

    /// Paper number padded to two digits, as printed in footers.
    pub fn paper_code(&self) -> String {
        format!("{:0>2}", self.paper)
    }

    /// Printed text that never belongs to a question: the spellings of this
    /// paper's code, its copyright line, and [`PAGE_FURNITURE`].
    pub fn boilerplate(&self) -> Vec<String> {
        let code = format!("{}/{}", self.subject, self.paper_code());
        let series = self.session.series();
        let yy = self.year % 100;
        let mut texts = vec![
            format!("{code}/{series}/{yy:02}"),
            format!("{code}/{series}{yy:02}"),
            format!("{}_{}_{series}{yy:02}", self.subject, self.paper_code()),
            format!("\u{a9} UCLES {}", self.year),
        ];
        texts.extend(PAGE_FURNITURE.iter().map(|t| t.to_string()));
        texts
    }

    /// The document family usually matching this paper.
    pub fn default_family(&self) -> DocumentFamily {
        match self.kind {
            PaperKind::QuestionPaper => DocumentFamily::QuestionPaper,
            PaperKind::MarkScheme => DocumentFamily::MarkScheme,
        }
    }
}

impl fmt::Display for PaperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} paper {}",
            self.subject,
            self.session.dir_name(),
            self.year,
            self.kind.code(),
            self.paper
        )
    }
}
