use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use papersplit_core::{Band, DocumentFamily};

/// Split exam-paper PDFs into one file per question.
#[derive(Debug, Parser)]
#[command(name = "papersplit", about, version)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Segment a paper and print the span of every question
    Segment {
        #[command(flatten)]
        input: SegmentArgs,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List the labels found by the primary margin scan, with rejections
    Detect {
        #[command(flatten)]
        input: SegmentArgs,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Write one PDF per question
    Split {
        #[command(flatten)]
        input: SegmentArgs,

        /// Directory receiving the output files
        #[arg(short, long, value_name = "DIR")]
        output_dir: PathBuf,

        /// Write directly into DIR instead of <subject>/<year>/<session>/<kind>/<paper>
        #[arg(long)]
        flat: bool,
    },

    /// Crop the header and footer strips off every page
    Clean {
        /// PDF file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output file. Default: <FILE stem>_cleaned.pdf next to FILE
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,

        /// Points removed from the top of each page
        #[arg(long, default_value_t = 50.0)]
        top: f64,

        /// Points removed from the bottom of each page
        #[arg(long, default_value_t = 50.0)]
        bottom: f64,
    },
}

/// Input file and segmentation settings shared by every subcommand.
///
/// Settings resolve in order: family preset, then `--config`, then flags.
#[derive(Debug, Args)]
pub struct SegmentArgs {
    /// PDF file, or a JSON document dump
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Document family preset. Default: guessed from the file name
    #[arg(long, value_parser = parse_family)]
    pub family: Option<DocumentFamily>,

    /// TOML file with segmentation options
    #[arg(long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Highest expected question number
    #[arg(long)]
    pub max_questions: Option<u32>,

    /// Margin band for the primary scan, as 'MIN,MAX'
    #[arg(long, value_parser = parse_band, allow_hyphen_values = true)]
    pub band: Option<Band>,

    /// Margin band for gap recovery, as 'MIN,MAX'
    #[arg(long, value_parser = parse_band, allow_hyphen_values = true)]
    pub recovery_band: Option<Band>,

    /// Crop each question to its own region of the page
    #[arg(long)]
    pub crop: bool,

    /// Label open before the first page (single-question files). Read
    /// under the family's sub-level grammar, so `3(i)` is roman one for
    /// roman-subparts
    #[arg(long, value_name = "LABEL")]
    pub open_label: Option<String>,

    /// Do not hide the paper code, copyright line and page furniture
    /// implied by the file name
    #[arg(long)]
    pub keep_boilerplate: bool,

    /// Skip the gap recovery pass
    #[arg(long)]
    pub no_recovery: bool,

    /// Skip the fallback line pass
    #[arg(long)]
    pub no_fallback: bool,
}

/// Output format for tabular subcommands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Tab-separated text
    Text,
    /// JSON
    Json,
    /// CSV
    Csv,
}

fn parse_family(s: &str) -> Result<DocumentFamily, String> {
    DocumentFamily::ALL
        .into_iter()
        .find(|f| f.as_str() == s)
        .ok_or_else(|| {
            let names: Vec<&str> = DocumentFamily::ALL.iter().map(|f| f.as_str()).collect();
            format!("unknown family '{s}' (expected one of: {})", names.join(", "))
        })
}

fn parse_band(s: &str) -> Result<Band, String> {
    let (min, max) = s
        .split_once(',')
        .ok_or_else(|| format!("expected 'MIN,MAX', got '{s}'"))?;
    let min: f64 = min.trim().parse().map_err(|e| format!("invalid band start: {e}"))?;
    let max: f64 = max.trim().parse().map_err(|e| format!("invalid band end: {e}"))?;
    Ok(Band::new(min, max))
}
