use std::path::Path;

use papersplit_core::{
    Document, DocumentFamily, Label, PaperId, SegmentOptions, Segmenter, SplitMode, SubLevelGrammar,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::cli::SegmentArgs;

/// Load the input document: a JSON dump when the extension is `.json`,
/// otherwise a PDF.
///
/// Returns `Err(1)` with a message printed to stderr if the file is not found
/// or cannot be read.
pub fn load_document(file: &Path) -> Result<Document, i32> {
    if !file.exists() {
        eprintln!("Error: file not found: {}", file.display());
        return Err(1);
    }
    if has_extension(file, "json") {
        let text = read_to_string(file)?;
        return serde_json::from_str(&text).map_err(|e| {
            eprintln!("Error: invalid document JSON: {e}");
            1
        });
    }
    papersplit_parse::open_file(file).map_err(|e| {
        eprintln!("Error: failed to open PDF: {e}");
        1
    })
}

pub fn has_extension(file: &Path, ext: &str) -> bool {
    file.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn read_to_string(file: &Path) -> Result<String, i32> {
    std::fs::read_to_string(file).map_err(|e| {
        eprintln!("Error: failed to read {}: {e}", file.display());
        1
    })
}

/// Paper metadata from the input's file name, when it follows the naming
/// convention.
pub fn paper_id(file: &Path) -> Option<PaperId> {
    file.file_name()
        .and_then(|n| n.to_str())
        .and_then(PaperId::from_file_name)
}

/// Resolve segmentation options: family preset, then the `--config` file,
/// then command-line flags.
pub fn resolve_options(args: &SegmentArgs) -> Result<SegmentOptions, i32> {
    let config = match &args.config {
        Some(path) => Some(load_config(path)?),
        None => None,
    };
    let config_family = match config.as_ref().and_then(|c| c.get("family")) {
        Some(value) => Some(family_from_value(value)?),
        None => None,
    };
    let family = args
        .family
        .or(config_family)
        .or_else(|| paper_id(&args.file).map(|id| id.default_family()))
        .unwrap_or(DocumentFamily::QuestionPaper);
    debug!(family = family.as_str(), "using family preset");

    let mut opts = SegmentOptions::for_family(family);
    let mut config_open_label = None;
    if let Some(mut config) = config {
        config_open_label = config.remove("open_label");
        opts = overlay(&opts, config)?;
    }

    if let Some(n) = args.max_questions {
        opts.max_questions = n;
    }
    if let Some(band) = args.band {
        opts.left_band = band;
    }
    if let Some(band) = args.recovery_band {
        opts.recovery_band = band;
    }
    if args.crop {
        opts.mode = SplitMode::Crop;
    }
    if args.no_recovery {
        opts.recovery = false;
    }
    if args.no_fallback {
        opts.fallback = false;
    }
    if !args.keep_boilerplate {
        if let Some(id) = paper_id(&args.file) {
            for text in id.boilerplate() {
                if !opts.ignore_text.contains(&text) {
                    opts.ignore_text.push(text);
                }
            }
        }
    }

    // Labels are read only once the grammar is settled: `3(i)` is a letter
    // under the nested grammar and roman one under the roman grammar.
    if let Some(text) = &args.open_label {
        opts.open_label = Some(parse_open_label(text, opts.grammar)?);
    } else if let Some(value) = config_open_label {
        let text = value.as_str().ok_or_else(|| {
            eprintln!("Error: invalid open_label in config: {value}");
            2
        })?;
        opts.open_label = Some(parse_open_label(text, opts.grammar)?);
    } else if family == DocumentFamily::RomanSubparts {
        // Single-question files are named after their question, e.g. `3.pdf`.
        opts.open_label = args
            .file
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| Label::parse(s, opts.grammar));
    }
    Ok(opts)
}

fn parse_open_label(text: &str, grammar: SubLevelGrammar) -> Result<Label, i32> {
    Label::parse(text, grammar).ok_or_else(|| {
        eprintln!("Error: invalid open label '{text}'");
        2
    })
}

/// Build a segmenter from the resolved options.
pub fn build_segmenter(args: &SegmentArgs) -> Result<Segmenter, i32> {
    let opts = resolve_options(args)?;
    Segmenter::new(opts).map_err(|e| {
        eprintln!("Error: {e}");
        2
    })
}

fn load_config(path: &Path) -> Result<toml::Table, i32> {
    let text = read_to_string(path)?;
    let table: toml::Table = toml::from_str(&text).map_err(|e| {
        eprintln!("Error: invalid config {}: {e}", path.display());
        2
    })?;
    info!(path = %path.display(), keys = table.len(), "loaded config");
    Ok(table)
}

fn family_from_value(value: &toml::Value) -> Result<DocumentFamily, i32> {
    value
        .as_str()
        .and_then(|s| DocumentFamily::ALL.into_iter().find(|f| f.as_str() == s))
        .ok_or_else(|| {
            eprintln!("Error: invalid family in config: {value}");
            2
        })
}

/// Apply the keys of a config table on top of `base`. Nested tables
/// (bands, region) are replaced whole.
fn overlay(base: &SegmentOptions, mut config: toml::Table) -> Result<SegmentOptions, i32> {
    config.remove("family");
    let invalid = |e: serde_json::Error| {
        eprintln!("Error: invalid config: {e}");
        2
    };
    let mut merged = serde_json::to_value(base).map_err(invalid)?;
    let patch = serde_json::to_value(&config).map_err(invalid)?;
    if let (Value::Object(merged), Value::Object(patch)) = (&mut merged, patch) {
        merged.extend(patch);
    }
    serde_json::from_value(merged).map_err(invalid)
}

/// Escape a string for CSV output.
///
/// If the text contains commas, double quotes, or newlines, wraps it in
/// double quotes and escapes any internal double quotes by doubling them.
pub fn csv_escape(text: &str) -> String {
    if text.contains(',') || text.contains('"') || text.contains('\n') {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

/// Print a one-line summary of unresolved questions to stderr.
pub fn report_missing(missing: &[u32]) {
    if !missing.is_empty() {
        let list: Vec<String> = missing.iter().map(u32::to_string).collect();
        eprintln!("Warning: questions not found: {}", list.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use papersplit_core::{Band, SubLevel};
    use std::path::PathBuf;

    fn args(file: &str) -> SegmentArgs {
        SegmentArgs {
            file: PathBuf::from(file),
            family: None,
            config: None,
            max_questions: None,
            band: None,
            recovery_band: None,
            crop: false,
            open_label: None,
            keep_boilerplate: false,
            no_recovery: false,
            no_fallback: false,
        }
    }

    #[test]
    fn csv_escape_plain_text() {
        assert_eq!(csv_escape("hello"), "hello");
    }

    #[test]
    fn csv_escape_with_comma_and_quote() {
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn family_is_guessed_from_file_name() {
        let mut opts = resolve_options(&args("9709_s21_ms_12.pdf")).unwrap();
        assert!(opts.ignore_text.iter().any(|t| t == "9709/12/M/J/21"));
        opts.ignore_text.clear();
        assert_eq!(opts, SegmentOptions::for_family(DocumentFamily::MarkScheme));
        let opts = resolve_options(&args("scan.pdf")).unwrap();
        assert_eq!(opts, SegmentOptions::default());
    }

    #[test]
    fn flags_override_preset() {
        let mut a = args("9709_s21_qp_12.pdf");
        a.family = Some(DocumentFamily::McqMarkScheme);
        a.max_questions = Some(30);
        a.band = Some(Band::new(5.0, 50.0));
        a.crop = true;
        a.no_fallback = true;
        let opts = resolve_options(&a).unwrap();
        assert_eq!(opts.max_questions, 30);
        assert_eq!(opts.left_band, Band::new(5.0, 50.0));
        assert_eq!(opts.mode, SplitMode::Crop);
        assert!(!opts.fallback);
        assert!(opts.recovery);
    }

    #[test]
    fn config_overlays_preset_and_flags_win() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opts.toml");
        std::fs::write(
            &path,
            "family = \"roman-subparts\"\nmax_questions = 4\nsafety_margin = 8.0\n\
             [left_band]\nx_min = 90.0\nx_max = 110.0\n",
        )
        .unwrap();
        let mut a = args("scan.pdf");
        a.config = Some(path);
        a.max_questions = Some(6);
        let opts = resolve_options(&a).unwrap();
        assert_eq!(opts.grammar, SubLevelGrammar::Roman);
        assert_eq!(opts.left_band, Band::new(90.0, 110.0));
        assert_eq!(opts.safety_margin, 8.0);
        assert_eq!(opts.max_questions, 6);
    }

    #[test]
    fn unknown_config_value_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opts.toml");
        std::fs::write(&path, "grammar = \"greek\"\n").unwrap();
        let mut a = args("scan.pdf");
        a.config = Some(path);
        assert_eq!(resolve_options(&a), Err(2));
    }

    #[test]
    fn roman_subparts_open_label_comes_from_file_stem() {
        let mut a = args("papers/3.pdf");
        a.family = Some(DocumentFamily::RomanSubparts);
        let opts = resolve_options(&a).unwrap();
        assert_eq!(opts.open_label, Some(Label::new(3)));
    }

    #[test]
    fn paper_boilerplate_joins_configured_ignore_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opts.toml");
        std::fs::write(&path, "ignore_text = [\"Examiner's Use\", \"[Turn over\"]\n").unwrap();
        let mut a = args("0625_w19_qp_02_cleaned.pdf");
        a.config = Some(path);
        let opts = resolve_options(&a).unwrap();
        assert_eq!(opts.ignore_text[0], "Examiner's Use");
        assert!(opts.ignore_text.iter().any(|t| t == "0625/02/O/N/19"));
        assert!(opts.ignore_text.iter().any(|t| t == "\u{a9} UCLES 2019"));
        assert_eq!(opts.ignore_text.iter().filter(|t| *t == "[Turn over").count(), 1);

        a.keep_boilerplate = true;
        let opts = resolve_options(&a).unwrap();
        assert_eq!(opts.ignore_text, vec!["Examiner's Use", "[Turn over"]);
    }

    #[test]
    fn open_label_flag_follows_family_grammar() {
        let mut a = args("scan.pdf");
        a.family = Some(DocumentFamily::RomanSubparts);
        a.open_label = Some("3(i)".to_string());
        let opts = resolve_options(&a).unwrap();
        assert_eq!(opts.open_label, Some(Label::with_subs(3, vec![SubLevel::Roman(1)])));

        a.family = Some(DocumentFamily::QuestionPaper);
        let opts = resolve_options(&a).unwrap();
        assert_eq!(opts.open_label, Some(Label::with_subs(3, vec![SubLevel::Alpha(8)])));
    }

    #[test]
    fn config_open_label_follows_config_grammar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opts.toml");
        std::fs::write(&path, "grammar = \"roman\"\nopen_label = \"4(v)\"\n").unwrap();
        let mut a = args("scan.pdf");
        a.config = Some(path);
        let opts = resolve_options(&a).unwrap();
        assert_eq!(opts.open_label, Some(Label::with_subs(4, vec![SubLevel::Roman(5)])));
    }

    #[test]
    fn malformed_open_label_is_an_error() {
        let mut a = args("scan.pdf");
        a.open_label = Some("(ii)".to_string());
        assert_eq!(resolve_options(&a), Err(2));
    }

    #[test]
    fn missing_file_is_reported() {
        assert_eq!(load_document(Path::new("/nonexistent/paper.pdf")).err(), Some(1));
    }

    #[test]
    fn json_dump_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, r#"{"pages":[{"index":0,"width":595.0,"height":842.0}]}"#).unwrap();
        let doc = load_document(&path).unwrap();
        assert_eq!(doc.pages.len(), 1);
    }
}
