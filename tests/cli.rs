mod common;

use std::fs;

use assert_cmd::Command;
use common::{TestWorkspace, fixture_path};
use predicates::prelude::*;
use predicates::str::contains;

fn csv_rollup() -> Command {
    Command::cargo_bin("csv-rollup").expect("binary exists")
}

fn fixture(name: &str) -> String {
    fixture_path(name).to_str().expect("utf-8 path").to_string()
}

#[test]
fn summarize_prints_errors_then_base_then_categories() {
    let output = csv_rollup()
        .args([
            "summarize",
            "-i",
            &fixture("snapshot_a.csv"),
            "--category-threshold",
            "4",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).expect("utf-8 stdout");
    let errors = stdout.find("== errors (1 row(s)) ==").expect("errors table");
    let base = stdout.find("== base (2 row(s)) ==").expect("base table");
    let desk = stdout.find("== Desk (2 row(s)) ==").expect("desk table");
    let region = stdout.find("== Region (3 row(s)) ==").expect("region table");
    assert!(errors < base && base < desk && desk < region);
    assert!(stdout.contains("stale price"));
}

#[test]
fn summarize_json_output_is_structured() {
    let output = csv_rollup()
        .args([
            "summarize",
            "-i",
            &fixture("snapshot_a.csv"),
            "--category-threshold",
            "4",
            "--format",
            "json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: serde_json::Value = serde_json::from_slice(&output).expect("valid json");
    let tables = json["tables"].as_array().expect("tables array");
    assert_eq!(tables[0]["name"], "errors");
    assert_eq!(tables[1]["name"], "base");
    assert_eq!(
        tables[1]["columns"],
        serde_json::json!(["Currency", "Book", "count", "Amount_sum", "Qty_sum"])
    );
    assert_eq!(tables[1]["rows"][0]["Currency"], "USD");
    assert_eq!(tables[1]["rows"][0]["Amount_sum"], 150.0);
}

#[test]
fn summarize_reads_stdin_and_settings_file() {
    let workspace = TestWorkspace::new();
    let config = workspace.write("rollup.yaml", "category_threshold: 4\n");
    let input = fs::read_to_string(fixture_path("snapshot_a.csv")).expect("read fixture");
    csv_rollup()
        .args([
            "summarize",
            "-i",
            "-",
            "--config",
            config.to_str().expect("utf-8 path"),
        ])
        .write_stdin(input)
        .assert()
        .success()
        .stdout(contains("== Region (3 row(s)) ==").and(contains("== Amount").not()));
}

#[test]
fn summarize_tab_delimited_input() {
    let workspace = TestWorkspace::new();
    let path = workspace.write(
        "trades.tsv",
        "Desk\tCurrency\tAmount\nRates\tUSD\t10\nCredit\tUSD\t5\n",
    );
    csv_rollup()
        .args(["summarize", "-i", path.to_str().expect("utf-8 path")])
        .assert()
        .success()
        .stdout(contains("== Desk (2 row(s)) =="));
}

const PRECISE_CSV: &str = "Desk,Currency,Amt\nRates,USD,1.23456\nCredit,USD,0.00001\nFX,USD,0\n";

#[test]
fn summarize_raw_keeps_full_precision_and_zero_sums() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("precise.csv", PRECISE_CSV);
    let out_dir = workspace.path().join("raw");
    csv_rollup()
        .args([
            "summarize",
            "-i",
            input.to_str().expect("utf-8 path"),
            "--raw",
            "-o",
            out_dir.to_str().expect("utf-8 path"),
        ])
        .assert()
        .success()
        .stdout(contains("1.23456").and(contains("0.00001")).and(contains("1.2346 ").not()));
    let desk = fs::read_to_string(out_dir.join("Desk.csv")).expect("Desk.csv");
    assert_eq!(
        desk,
        "Desk,Currency,count,Amt_sum\nRates,USD,1,1.23456\nCredit,USD,1,0.00001\nFX,USD,1,0\n"
    );
    let amt = fs::read_to_string(out_dir.join("Amt.csv")).expect("Amt.csv");
    assert!(amt.contains("0.00001,USD,1,0.00001\n"));
}

#[test]
fn summarize_formats_measures_but_not_keys() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("precise.csv", PRECISE_CSV);
    let out_dir = workspace.path().join("formatted");
    csv_rollup()
        .args([
            "summarize",
            "-i",
            input.to_str().expect("utf-8 path"),
            "-o",
            out_dir.to_str().expect("utf-8 path"),
        ])
        .assert()
        .success();
    let desk = fs::read_to_string(out_dir.join("Desk.csv")).expect("Desk.csv");
    assert_eq!(
        desk,
        "Desk,Currency,count,Amt_sum\nRates,USD,1,1.2346\nCredit,USD,1,\nFX,USD,1,\n"
    );
    let amt = fs::read_to_string(out_dir.join("Amt.csv")).expect("Amt.csv");
    assert!(amt.contains("0.00001,USD,1,\n"));
    assert!(amt.contains("\n0,USD,1,\n"));
}

#[test]
fn summarize_without_currency_fails() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("bad.csv", "Desk,Amount\nRates,1\n");
    csv_rollup()
        .args(["summarize", "-i", path.to_str().expect("utf-8 path")])
        .assert()
        .failure()
        .stderr(contains("Required field 'Currency' is missing"));
}

#[test]
fn summarize_reports_partial_failures_as_notes() {
    let workspace = TestWorkspace::new();
    let path = workspace.write(
        "mixed.json",
        r#"[
            {"Desk": "Rates", "Code": 7, "Currency": "USD"},
            {"Desk": "Credit", "Code": "x9", "Currency": "USD"}
        ]"#,
    );
    csv_rollup()
        .args(["summarize", "-i", path.to_str().expect("utf-8 path")])
        .assert()
        .success()
        .stdout(
            contains("note: Category 'Code' could not be aggregated")
                .and(contains("== Desk (2 row(s)) ==")),
        );
}

#[test]
fn compare_reports_changes_and_new_keys() {
    csv_rollup()
        .args([
            "compare",
            "--left",
            &fixture("snapshot_a.csv"),
            "--right",
            &fixture("snapshot_b.csv"),
            "--category-threshold",
            "4",
        ])
        .assert()
        .success()
        .stdout(
            contains("== Region.changed (1 row(s)) ==")
                .and(contains("== Desk.new (1 row(s)) =="))
                .and(contains("note: Desk: 1 new key(s): (Equity, JPY)"))
                .and(contains("errors").not()),
        );
}

#[test]
fn compare_threshold_is_applied() {
    csv_rollup()
        .args([
            "compare",
            "--left",
            &fixture("snapshot_a.csv"),
            "--right",
            &fixture("snapshot_b.csv"),
            "--category-threshold",
            "4",
            "--threshold",
            "0.001",
        ])
        .assert()
        .success()
        .stdout(contains("== Region.changed (2 row(s)) =="));
}

#[test]
fn compare_rejects_out_of_range_threshold() {
    csv_rollup()
        .args([
            "compare",
            "--left",
            &fixture("snapshot_a.csv"),
            "--right",
            &fixture("snapshot_b.csv"),
            "--threshold",
            "0.5",
        ])
        .assert()
        .failure()
        .stderr(contains("must lie within"));
}

#[test]
fn compare_identical_snapshots_reports_nothing() {
    csv_rollup()
        .args([
            "compare",
            "--left",
            &fixture("snapshot_b.csv"),
            "--right",
            &fixture("snapshot_b.json"),
            "--category-threshold",
            "4",
        ])
        .assert()
        .success()
        .stdout(contains("note: No significant differences found"));
}

#[test]
fn compare_writes_csv_directory() {
    let workspace = TestWorkspace::new();
    let out_dir = workspace.path().join("report");
    csv_rollup()
        .args([
            "compare",
            "--left",
            &fixture("snapshot_a.csv"),
            "--right",
            &fixture("snapshot_b.csv"),
            "--category-threshold",
            "4",
            "--output-dir",
            out_dir.to_str().expect("utf-8 path"),
        ])
        .assert()
        .success();
    let new_desk = fs::read_to_string(out_dir.join("Desk.new.csv")).expect("Desk.new.csv");
    assert_eq!(
        new_desk,
        "Desk,Currency,count,Amount_sum,Qty_sum\nEquity,JPY,1,70,4\n"
    );
    let notes = fs::read_to_string(out_dir.join("notes.txt")).expect("notes.txt");
    assert!(notes.contains("Region: 1 new key(s): (APAC, JPY)"));
}

#[test]
fn classify_lists_roles_and_values() {
    csv_rollup()
        .args([
            "classify",
            "-i",
            &fixture("snapshot_a.csv"),
            "--category-threshold",
            "4",
            "--values",
        ])
        .assert()
        .success()
        .stdout(
            contains("== fields (7 row(s)) ==")
                .and(contains("== Desk.values (3 row(s)) =="))
                .and(contains("== Amount.values").not()),
        );
}
