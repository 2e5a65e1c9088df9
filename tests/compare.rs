mod common;

use common::{fixture_settings, load_fixture};
use csv_rollup::{
    aggregate::GroupKey,
    compare::{Membership, TableComparison},
    config::Settings,
    pipeline,
    report::Report,
    session::ComparisonSession,
};

fn snapshots(threshold: f64) -> pipeline::DatasetComparison {
    let settings = Settings {
        comparison_threshold: threshold,
        ..fixture_settings()
    };
    pipeline::compare_datasets(
        &load_fixture("snapshot_a.csv"),
        &load_fixture("snapshot_b.csv"),
        &settings,
    )
    .expect("compare snapshots")
}

#[test]
fn errors_table_is_never_compared() {
    let result = snapshots(0.01);
    assert!(result.comparison.get("errors").is_none());
    let names = result
        .comparison
        .tables()
        .iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["base", "Desk", "Region"]);
}

#[test]
fn only_changes_above_threshold_are_reported() {
    let result = snapshots(0.01);
    let region = result.comparison.joined("Region").expect("region");
    let changed = region.changed.iter().map(|r| &r.key).collect::<Vec<_>>();
    assert_eq!(changed, vec![&GroupKey::from(["EMEA", "EUR"])]);
    let amount = region.changed[0].delta("Amount").expect("Amount delta");
    assert_eq!(amount.sum_a, Some(220.0));
    assert_eq!(amount.sum_b, Some(280.0));
    assert_eq!(amount.diff, Some(60.0));
    assert_eq!(region.new_keys(), vec![&GroupKey::from(["APAC", "JPY"])]);
    assert!(region.removed.is_empty());
}

#[test]
fn lower_threshold_reveals_small_moves() {
    let result = snapshots(0.001);
    let region = result.comparison.joined("Region").expect("region");
    assert!(
        region
            .changed
            .iter()
            .any(|r| r.key == GroupKey::from(["EMEA", "USD"]))
    );
    assert!(
        !region
            .changed
            .iter()
            .any(|r| r.key == GroupKey::from(["APAC", "USD"]))
    );
}

#[test]
fn swapping_sides_swaps_new_and_removed() {
    let settings = fixture_settings();
    let a = pipeline::summarize(&load_fixture("snapshot_a.csv"), &settings).expect("a");
    let b = pipeline::summarize(&load_fixture("snapshot_b.csv"), &settings).expect("b");
    let forward = csv_rollup::compare::compare(&a.summary, &b.summary, 0.01);
    let backward = csv_rollup::compare::compare(&b.summary, &a.summary, 0.01);
    let desk_fwd = forward.joined("Desk").expect("forward");
    let desk_back = backward.joined("Desk").expect("backward");
    assert_eq!(desk_fwd.new_keys(), desk_back.removed_keys());
    assert_eq!(desk_fwd.removed_keys(), desk_back.new_keys());
}

#[test]
fn category_missing_on_one_side_is_one_sided() {
    let settings = fixture_settings();
    let a = pipeline::summarize(&load_fixture("snapshot_a.csv"), &settings).expect("a");
    let wide = Settings {
        category_threshold: 6,
        ..settings
    };
    let b = pipeline::summarize(&load_fixture("snapshot_b.csv"), &wide).expect("b");
    let result = csv_rollup::compare::compare(&a.summary, &b.summary, 0.01);
    assert!(matches!(
        result.get("Amount"),
        Some(TableComparison::OnlyInB(_))
    ));
    assert!(matches!(result.get("Qty"), Some(TableComparison::OnlyInB(_))));
}

#[test]
fn report_names_derived_tables() {
    let report = Report::for_comparison(&snapshots(0.01)).formatted();
    for name in ["base.changed", "base.new", "Desk.changed", "Desk.new", "Region.new"] {
        assert!(report.table(name).is_some(), "missing {name}");
    }
    let new_desk = report.table("Desk.new").expect("Desk.new");
    assert_eq!(
        new_desk.columns,
        vec!["Desk", "Currency", "count", "Amount_sum", "Qty_sum"]
    );
    assert!(report.notes.iter().any(|n| n.starts_with("Desk: 1 new key(s)")));
}

#[test]
fn session_reruns_with_the_latest_threshold() {
    let settings = fixture_settings();
    let a = pipeline::summarize(&load_fixture("snapshot_a.csv"), &settings).expect("a");
    let b = pipeline::summarize(&load_fixture("snapshot_b.csv"), &settings).expect("b");
    let session = ComparisonSession::new(a.summary, b.summary);

    let loose = session.request(0.1);
    let strict = session.request(0.001);
    assert!(session.run(&loose).is_none());
    let result = session.run(&strict).expect("latest request");
    let region = result.joined("Region").expect("region");
    assert_eq!(region.changed.len(), 2);
    assert!(
        region
            .changed
            .iter()
            .all(|row| row.membership == Membership::Both)
    );
}
