use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn write_config(dir: &Path) -> String {
    let config = format!(
        r#"{{"cache": {{"root_path": {:?}, "enabled": true}}, "ocr": {{"enabled": false}}}}"#,
        dir.join("cache").to_string_lossy()
    );
    let path = dir.join("config.json");
    fs::write(&path, config).unwrap();
    path.to_string_lossy().into_owned()
}

fn fidex() -> Command {
    Command::cargo_bin("fidex").unwrap()
}

#[test]
fn test_extract_csv_lists_budgets() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let input = dir.path().join("offer.txt");
    fs::write(&input, "Стоимость работ: 2 500 000 руб.").unwrap();

    fidex()
        .args(["--config", &config, "extract", "-f", "csv"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("amount,currency,formatted"))
        .stdout(predicate::str::contains("2500000,RUB,2 500 000 ₽,0.80,true,text:17"));
}

#[test]
fn test_extract_missing_file_fails() {
    fidex()
        .args(["extract", "does-not-exist.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_batch_writes_outputs_and_summary() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let docs = dir.path().join("docs");
    let out = dir.path().join("out");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("a.txt"), "Budget: $120,000").unwrap();
    fs::write(docs.join("b.txt"), "Итого 3 000 000 тенге").unwrap();
    fs::write(docs.join("empty.txt"), "").unwrap();

    let pattern = docs.join("*.txt");
    fidex()
        .args(["--config", &config, "batch", "-j", "2", "--summary", "-o"])
        .arg(&out)
        .arg(pattern.to_string_lossy().as_ref())
        .assert()
        .success()
        .stdout(predicate::str::contains("Processed 3 files"))
        .stdout(predicate::str::contains("empty document"));

    assert!(out.join("a.txt.json").exists());
    assert!(out.join("b.txt.json").exists());

    let summary = fs::read_to_string(out.join("summary.csv")).unwrap();
    assert!(summary.starts_with("filename,status,"));
    assert!(summary.contains("b.txt,success,"));
    assert!(summary.contains("empty.txt,error,"));
}

#[test]
fn test_cache_clear_after_extract() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let input = dir.path().join("plan.txt");
    fs::write(&input, "Бюджет проекта 1 500 000 ₽").unwrap();

    fidex()
        .args(["--config", &config, "extract"])
        .arg(&input)
        .assert()
        .success();

    fidex()
        .args(["--config", &config, "cache", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1 cached results"));
}
