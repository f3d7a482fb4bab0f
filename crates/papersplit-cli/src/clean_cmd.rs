use std::path::{Path, PathBuf};

use papersplit_parse::Margins;

pub fn run(file: &Path, output: Option<&Path>, top: f64, bottom: f64) -> Result<(), i32> {
    if !file.exists() {
        eprintln!("Error: file not found: {}", file.display());
        return Err(1);
    }
    for (name, value) in [("top", top), ("bottom", bottom)] {
        if !value.is_finite() || value < 0.0 {
            eprintln!("Error: invalid {name} margin: {value}");
            return Err(2);
        }
    }
    let output = output.map_or_else(|| cleaned_path(file), Path::to_path_buf);
    if output == file {
        eprintln!("Error: output would overwrite the input file");
        return Err(2);
    }

    let pages = papersplit_parse::clean_file(file, &output, Margins { top, bottom }).map_err(|e| {
        eprintln!("Error: {e}");
        1
    })?;
    println!("{}\t{pages} pages", output.display());
    Ok(())
}

/// `dir/9709_s21_qp_12.pdf` becomes `dir/9709_s21_qp_12_cleaned.pdf`.
fn cleaned_path(file: &Path) -> PathBuf {
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    file.with_file_name(format!("{stem}_cleaned.pdf"))
}
