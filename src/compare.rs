//! Cross-snapshot comparison of two [`SummarySet`]s.
//!
//! Tables are matched by name and rows are outer-joined by [`GroupKey`]. A key
//! present on both sides is kept only when its largest relative difference
//! across the shared numeric fields is strictly greater than the threshold.
//! Keys on one side only are reported as removed (left only) or new (right
//! only) regardless of the threshold. The `errors` table never takes part.

use log::debug;
use serde::Serialize;

use crate::{
    aggregate::{AggregateRow, AggregateTable, COUNT_COLUMN, GroupKey, SUM_SUFFIX, SummarySet},
    data::Value,
    table::Table,
};

pub const REL_DIFF_EPSILON: f64 = 1e-10;
pub const DEFAULT_COMPARISON_THRESHOLD: f64 = 0.01;

/// `|sum_b - sum_a| / max(|sum_a|, 1e-10)`.
pub fn relative_difference(sum_a: f64, sum_b: f64) -> f64 {
    (sum_b - sum_a).abs() / sum_a.abs().max(REL_DIFF_EPSILON)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Membership {
    Both,
    /// Only in the left summary.
    Removed,
    /// Only in the right summary.
    New,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDelta {
    pub field: String,
    pub sum_a: Option<f64>,
    pub sum_b: Option<f64>,
    pub diff: Option<f64>,
    pub rel_diff: Option<f64>,
}

impl FieldDelta {
    fn between(field: &str, sum_a: f64, sum_b: f64) -> Self {
        Self {
            field: field.to_string(),
            sum_a: Some(sum_a),
            sum_b: Some(sum_b),
            diff: Some(sum_b - sum_a),
            rel_diff: Some(relative_difference(sum_a, sum_b)),
        }
    }

    fn one_sided(field: &str, sum_a: Option<f64>, sum_b: Option<f64>) -> Self {
        Self {
            field: field.to_string(),
            sum_a,
            sum_b,
            diff: None,
            rel_diff: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub key: GroupKey,
    pub membership: Membership,
    pub count_a: Option<usize>,
    pub count_b: Option<usize>,
    pub deltas: Vec<FieldDelta>,
}

impl ComparisonRow {
    pub fn max_rel_diff(&self) -> Option<f64> {
        self.deltas
            .iter()
            .filter_map(|d| d.rel_diff)
            .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |m| m.max(r))))
    }

    pub fn is_significant(&self, threshold: f64) -> bool {
        self.max_rel_diff().is_some_and(|m| m > threshold)
    }

    pub fn delta(&self, field: &str) -> Option<&FieldDelta> {
        self.deltas.iter().find(|d| d.field == field)
    }

    fn removed(row: &AggregateRow, fields: &[(String, usize, usize)]) -> Self {
        Self {
            key: row.key.clone(),
            membership: Membership::Removed,
            count_a: Some(row.count),
            count_b: None,
            deltas: fields
                .iter()
                .map(|(name, pos_a, _)| FieldDelta::one_sided(name, row.sum(*pos_a), None))
                .collect(),
        }
    }

    fn new_key(row: &AggregateRow, fields: &[(String, usize, usize)]) -> Self {
        Self {
            key: row.key.clone(),
            membership: Membership::New,
            count_a: None,
            count_b: Some(row.count),
            deltas: fields
                .iter()
                .map(|(name, _, pos_b)| FieldDelta::one_sided(name, None, row.sum(*pos_b)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedTable {
    pub grouping: Vec<String>,
    pub fields: Vec<String>,
    /// Common keys whose change exceeded the threshold, in left discovery order.
    pub changed: Vec<ComparisonRow>,
    pub new: Vec<ComparisonRow>,
    pub removed: Vec<ComparisonRow>,
}

impl JoinedTable {
    pub fn is_unchanged(&self) -> bool {
        self.changed.is_empty() && self.new.is_empty() && self.removed.is_empty()
    }

    pub fn new_keys(&self) -> Vec<&GroupKey> {
        self.new.iter().map(|r| &r.key).collect()
    }

    pub fn removed_keys(&self) -> Vec<&GroupKey> {
        self.removed.iter().map(|r| &r.key).collect()
    }

    /// Column order: grouping fields, then `<f>_a`, `<f>_b`, `<f>_diff`,
    /// `<f>_rel_diff` per numeric field.
    pub fn changes_table(&self, name: &str) -> Table {
        let mut columns = self.grouping.clone();
        for field in &self.fields {
            columns.extend([
                format!("{field}_a"),
                format!("{field}_b"),
                format!("{field}_diff"),
                format!("{field}_rel_diff"),
            ]);
        }
        let mut table = Table::new(name, columns).with_measures_from(self.grouping.len());
        for row in &self.changed {
            let mut cells = key_cells(&row.key);
            for delta in &row.deltas {
                cells.extend(
                    [delta.sum_a, delta.sum_b, delta.diff, delta.rel_diff]
                        .into_iter()
                        .map(|v| v.map(Value::Number)),
                );
            }
            table.push_row(cells);
        }
        table
    }

    /// One-sided rows as `grouping..., count, <f>_sum...` from the side that
    /// holds them.
    pub fn membership_table(&self, name: &str, membership: Membership) -> Table {
        let rows = match membership {
            Membership::New => &self.new,
            Membership::Removed => &self.removed,
            Membership::Both => &self.changed,
        };
        let mut columns = self.grouping.clone();
        columns.push(COUNT_COLUMN.to_string());
        columns.extend(self.fields.iter().map(|f| format!("{f}{SUM_SUFFIX}")));
        let mut table = Table::new(name, columns).with_measures_from(self.grouping.len());
        let right_side = membership == Membership::New;
        for row in rows {
            let mut cells = key_cells(&row.key);
            let count = if right_side { row.count_b } else { row.count_a };
            cells.push(count.map(|c| Value::Number(c as f64)));
            cells.extend(row.deltas.iter().map(|d| {
                let sum = if right_side { d.sum_b } else { d.sum_a };
                sum.map(Value::Number)
            }));
            table.push_row(cells);
        }
        table
    }
}

fn key_cells(key: &GroupKey) -> Vec<Option<Value>> {
    key.parts().iter().cloned().map(Some).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableComparison {
    Joined(JoinedTable),
    OnlyInA(AggregateTable),
    OnlyInB(AggregateTable),
    /// Both sides hold the table but group it by different columns.
    GroupingMismatch {
        grouping_a: Vec<String>,
        grouping_b: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedComparison {
    pub name: String,
    pub outcome: TableComparison,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonSet {
    pub threshold: f64,
    tables: Vec<NamedComparison>,
}

impl ComparisonSet {
    pub fn new(threshold: f64, tables: Vec<NamedComparison>) -> Self {
        Self { threshold, tables }
    }

    pub fn tables(&self) -> &[NamedComparison] {
        &self.tables
    }

    pub fn get(&self, name: &str) -> Option<&TableComparison> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .map(|t| &t.outcome)
    }

    pub fn joined(&self, name: &str) -> Option<&JoinedTable> {
        match self.get(name)? {
            TableComparison::Joined(joined) => Some(joined),
            _ => None,
        }
    }
}

/// Table names to compare: left order first, then right-only names.
pub fn comparable_table_names<'a>(a: &'a SummarySet, b: &'a SummarySet) -> Vec<&'a str> {
    let mut names = a.tables().iter().map(|t| t.name.as_str()).collect::<Vec<_>>();
    for table in b.tables() {
        if !names.contains(&table.name.as_str()) {
            names.push(&table.name);
        }
    }
    names
}

pub fn compare_named(
    name: &str,
    a: &SummarySet,
    b: &SummarySet,
    threshold: f64,
) -> Option<NamedComparison> {
    let outcome = match (a.table(name), b.table(name)) {
        (Some(left), Some(right)) => compare_tables(left, right, threshold),
        (Some(left), None) => TableComparison::OnlyInA(left.clone()),
        (None, Some(right)) => TableComparison::OnlyInB(right.clone()),
        (None, None) => return None,
    };
    Some(NamedComparison {
        name: name.to_string(),
        outcome,
    })
}

pub fn compare(a: &SummarySet, b: &SummarySet, threshold: f64) -> ComparisonSet {
    let tables = comparable_table_names(a, b)
        .into_iter()
        .filter_map(|name| compare_named(name, a, b, threshold))
        .collect();
    ComparisonSet::new(threshold, tables)
}

pub fn compare_tables(a: &AggregateTable, b: &AggregateTable, threshold: f64) -> TableComparison {
    if a.grouping != b.grouping {
        return TableComparison::GroupingMismatch {
            grouping_a: a.grouping.clone(),
            grouping_b: b.grouping.clone(),
        };
    }
    let fields = a
        .numerics
        .iter()
        .enumerate()
        .filter_map(|(pos_a, name)| {
            b.numeric_position(name)
                .map(|pos_b| (name.clone(), pos_a, pos_b))
        })
        .collect::<Vec<_>>();
    if fields.len() != a.numerics.len() || fields.len() != b.numerics.len() {
        debug!(
            "Table '{}': comparing {} shared numeric field(s) of {} / {}",
            a.name,
            fields.len(),
            a.numerics.len(),
            b.numerics.len()
        );
    }

    let mut changed = Vec::new();
    let mut removed = Vec::new();
    for row_a in a.rows() {
        match b.get(&row_a.key) {
            Some(row_b) => {
                let row = ComparisonRow {
                    key: row_a.key.clone(),
                    membership: Membership::Both,
                    count_a: Some(row_a.count),
                    count_b: Some(row_b.count),
                    deltas: fields
                        .iter()
                        .map(|(name, pos_a, pos_b)| {
                            FieldDelta::between(
                                name,
                                row_a.sums[*pos_a],
                                row_b.sums[*pos_b],
                            )
                        })
                        .collect(),
                };
                if row.is_significant(threshold) {
                    changed.push(row);
                }
            }
            None => removed.push(ComparisonRow::removed(row_a, &fields)),
        }
    }
    let new = b
        .rows()
        .iter()
        .filter(|row_b| a.get(&row_b.key).is_none())
        .map(|row_b| ComparisonRow::new_key(row_b, &fields))
        .collect();

    TableComparison::Joined(JoinedTable {
        grouping: a.grouping.clone(),
        fields: fields.into_iter().map(|(name, _, _)| name).collect(),
        changed,
        new,
        removed,
    })
}
