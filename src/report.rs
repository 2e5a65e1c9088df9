//! Presentation-ready projection of pipeline results.
//!
//! A [`Report`] is the hand-off to whatever renders results: a list of named
//! [`Table`]s plus human-readable notes (partial failures, schema mismatches,
//! new/removed key summaries). It never feeds back into the pipeline.

use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use itertools::Itertools;
use serde::Serialize;

use crate::{
    aggregate::GroupKey,
    compare::{Membership, TableComparison},
    data::Value,
    error::FailureReport,
    format::format_table,
    io_utils,
    pipeline::{DatasetComparison, DatasetSummary},
    schema::FieldProfile,
    table::Table,
};

pub const FIELDS_TABLE: &str = "fields";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub tables: Vec<Table>,
    pub notes: Vec<String>,
}

impl Report {
    /// Error records first, then `base`, then one table per category.
    pub fn for_summary(result: &DatasetSummary) -> Self {
        let mut report = Report::default();
        if let Some(errors) = result.summary.errors() {
            report.tables.push(errors.clone());
        }
        report
            .tables
            .extend(result.summary.tables().iter().map(|t| t.to_table()));
        report.push_failures("", &result.failures);
        if report.tables.is_empty() && report.notes.is_empty() {
            report.notes.push("No records to summarize".to_string());
        }
        report
    }

    pub fn for_comparison(result: &DatasetComparison) -> Self {
        let mut report = Report::default();
        report.push_failures("left: ", &result.left.failures);
        report.push_failures("right: ", &result.right.failures);
        for entry in result.comparison.tables() {
            let name = entry.name.as_str();
            match &entry.outcome {
                TableComparison::Joined(joined) => {
                    if !joined.changed.is_empty() {
                        report
                            .tables
                            .push(joined.changes_table(&format!("{name}.changed")));
                    }
                    for (membership, rows, label) in [
                        (Membership::New, &joined.new, "new"),
                        (Membership::Removed, &joined.removed, "removed"),
                    ] {
                        if rows.is_empty() {
                            continue;
                        }
                        report.notes.push(format!(
                            "{name}: {} {label} key(s): {}",
                            rows.len(),
                            rows.iter().map(|r| describe_key(&r.key)).join(", ")
                        ));
                        report
                            .tables
                            .push(joined.membership_table(&format!("{name}.{label}"), membership));
                    }
                }
                TableComparison::OnlyInA(table) => {
                    report.notes.push(format!("{name}: present only in left"));
                    let mut rendered = table.to_table();
                    rendered.name = format!("{name}.only_left");
                    report.tables.push(rendered);
                }
                TableComparison::OnlyInB(table) => {
                    report.notes.push(format!("{name}: present only in right"));
                    let mut rendered = table.to_table();
                    rendered.name = format!("{name}.only_right");
                    report.tables.push(rendered);
                }
                TableComparison::GroupingMismatch {
                    grouping_a,
                    grouping_b,
                } => report.notes.push(format!(
                    "{name}: grouped by [{}] on the left but [{}] on the right; not compared",
                    grouping_a.join(", "),
                    grouping_b.join(", ")
                )),
            }
        }
        if report.tables.is_empty() {
            report
                .notes
                .push("No significant differences found".to_string());
        }
        report
    }

    /// One row per field; with `values`, one `<field>.values` distribution
    /// table per category field follows.
    pub fn for_profiles(profiles: &[FieldProfile], values: bool) -> Self {
        let mut fields = Table::new(
            FIELDS_TABLE,
            ["field", "kind", "distinct", "role"]
                .map(String::from)
                .to_vec(),
        );
        for profile in profiles {
            fields.push_row(vec![
                Some(Value::text(&profile.name)),
                Some(Value::text(profile.kind.as_str())),
                Some(Value::Number(profile.distinct as f64)),
                Some(Value::text(role_label(profile))),
            ]);
        }
        let mut report = Report {
            tables: vec![fields],
            notes: Vec::new(),
        };
        if values {
            for profile in profiles.iter().filter(|p| p.categorical) {
                let mut table = Table::new(
                    format!("{}.values", profile.name),
                    vec![profile.name.clone(), "count".to_string()],
                )
                .with_measures_from(1);
                for (value, count) in &profile.distribution {
                    table.push_row(vec![Some(value.clone()), Some(Value::Number(*count as f64))]);
                }
                report.tables.push(table);
            }
        }
        report
    }

    fn push_failures(&mut self, prefix: &str, failures: &FailureReport) {
        self.notes
            .extend(failures.iter().map(|failure| format!("{prefix}{failure}")));
    }

    /// Rounded, zero-blanked copy for display.
    pub fn formatted(&self) -> Self {
        Self {
            tables: self.tables.iter().map(format_table).collect(),
            notes: self.notes.clone(),
        }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn render_text(&self) -> String {
        let mut output = String::new();
        for table in &self.tables {
            let _ = writeln!(output, "== {} ({} row(s)) ==", table.name, table.len());
            output.push_str(&table.render());
            output.push('\n');
        }
        for note in &self.notes {
            let _ = writeln!(output, "note: {note}");
        }
        output
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Serializing report to JSON")
    }

    /// Writes one `<table>.csv` per table plus `notes.txt` when there are notes.
    pub fn write_csv_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir).with_context(|| format!("Creating output directory {dir:?}"))?;
        let mut written = Vec::with_capacity(self.tables.len() + 1);
        for table in &self.tables {
            let path = dir.join(format!("{}.csv", file_stem(&table.name)));
            io_utils::write_table_csv(&path, table)?;
            written.push(path);
        }
        if !self.notes.is_empty() {
            let path = dir.join("notes.txt");
            io_utils::write_text(&path, &(self.notes.join("\n") + "\n"))?;
            written.push(path);
        }
        Ok(written)
    }
}

fn role_label(profile: &FieldProfile) -> String {
    let mut roles = Vec::new();
    if profile.reserved {
        roles.push("reserved");
    }
    if profile.categorical {
        roles.push("category");
    }
    if profile.numeric {
        roles.push("numeric");
    }
    if roles.is_empty() {
        "ignored".to_string()
    } else {
        roles.join("+")
    }
}

fn describe_key(key: &GroupKey) -> String {
    format!("({})", key.parts().iter().join(", "))
}

pub fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}
