//! Integration tests for the `clean` subcommand.

use assert_cmd::Command;
use predicates::prelude::*;

fn cmd() -> Command {
    Command::cargo_bin("papersplit").unwrap()
}

/// Create a PDF where each page shows `(x, y, text)` runs in Helvetica 11pt.
fn exam_pdf(pages: &[&[(i64, i64, &str)]]) -> Vec<u8> {
    use lopdf::{Object, Stream, dictionary};

    let mut doc = lopdf::Document::with_version("1.5");
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut page_ids = Vec::new();
    for runs in pages {
        let content: String = runs
            .iter()
            .map(|(x, y, text)| format!("BT /F1 11 Tf {x} {y} Td ({text}) Tj ET\n"))
            .collect();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_dict = dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            },
        };
        page_ids.push(doc.add_object(page_dict));
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| Object::Reference(*id)).collect();
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(pages.len() as i64),
    });
    for &pid in &page_ids {
        if let Ok(dict) = doc.get_object_mut(pid).and_then(|o| o.as_dict_mut()) {
            dict.set("Parent", Object::Reference(pages_id));
        }
    }
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// A running header number in the left margin and a paper code footer.
fn paper_with_furniture() -> Vec<u8> {
    exam_pdf(&[
        &[(50, 815, "2"), (50, 740, "1"), (90, 740, "Expand the bracket.")],
        &[(50, 760, "2"), (90, 760, "Sketch the curve."), (50, 20, "9709/12/M/J/21")],
    ])
}

#[test]
fn clean_writes_cleaned_file_next_to_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("9709_s21_qp_12.pdf");
    std::fs::write(&input, paper_with_furniture()).unwrap();

    cmd()
        .args(["clean", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("9709_s21_qp_12_cleaned.pdf\t2 pages"));

    let cleaned = dir.path().join("9709_s21_qp_12_cleaned.pdf");
    let doc = lopdf::Document::load(&cleaned).unwrap();
    assert_eq!(doc.get_pages().len(), 2);
}

#[test]
fn header_number_no_longer_breaks_segmentation() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scan.pdf");
    std::fs::write(&input, paper_with_furniture()).unwrap();

    cmd()
        .args(["segment", input.to_str().unwrap(), "--max-questions", "2"])
        .assert()
        .success()
        .stderr(predicate::str::contains("questions not found: 1"));

    let cleaned = dir.path().join("trimmed/scan.pdf");
    cmd()
        .args(["clean", input.to_str().unwrap(), "-o", cleaned.to_str().unwrap()])
        .assert()
        .success();
    let output = cmd()
        .args(["segment", cleaned.to_str().unwrap(), "--max-questions", "2"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, vec!["label\tpage\ttop\tbottom", "1\t1\t-\t-", "2\t2\t-\t-"]);
}

#[test]
fn clean_rejects_margins_larger_than_page() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scan.pdf");
    std::fs::write(&input, paper_with_furniture()).unwrap();
    cmd()
        .args(["clean", input.to_str().unwrap(), "--top", "500", "--bottom", "400"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("leave nothing of page 0"));
}

#[test]
fn clean_rejects_non_finite_margin() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scan.pdf");
    std::fs::write(&input, paper_with_furniture()).unwrap();
    cmd()
        .args(["clean", input.to_str().unwrap(), "--top", "inf"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("invalid top margin"));
}
