//! Grouped count/sum aggregation over eligible records.
//!
//! An [`AggregationPlan`] is built once from the full eligible record set. It
//! fixes which categories fold into the `base` table (those with exactly one
//! distinct value), which get their own table, and which fail up front (mixed
//! value types, reserved table names). Executing the plan over any subset of
//! records yields a [`PartialAggregate`]; partials over disjoint shards merge
//! by adding counts and sums per [`GroupKey`], so sharded and single-pass runs
//! agree.
//!
//! Rows appear in key-discovery order. Records with a null in any grouping
//! column do not contribute to that table. Tables that end up with no rows are
//! omitted from the [`SummarySet`].

use std::collections::HashMap;

use log::{debug, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    data::{Record, Value},
    error::{CategoryFailure, CategoryFailureReason, FailureReport, SchemaError},
    schema::{self, CURRENCY_FIELD, FieldRef, FieldRoles, Schema},
    table::Table,
};

pub const BASE_TABLE: &str = "base";
pub const ERRORS_TABLE: &str = "errors";
pub const COUNT_COLUMN: &str = "count";
pub const SUM_SUFFIX: &str = "_sum";

/// Grouping values in the owning table's grouping-column order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GroupKey(Vec<Value>);

impl GroupKey {
    pub fn new(parts: Vec<Value>) -> Self {
        Self(parts)
    }

    pub fn parts(&self) -> &[Value] {
        &self.0
    }
}

impl<const N: usize> From<[&str; N]> for GroupKey {
    fn from(parts: [&str; N]) -> Self {
        Self(parts.iter().map(|p| Value::text(*p)).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub key: GroupKey,
    pub count: usize,
    /// One sum per numeric field, aligned with [`AggregateTable::numerics`].
    pub sums: Vec<f64>,
}

impl AggregateRow {
    fn empty(key: GroupKey, width: usize) -> Self {
        Self {
            key,
            count: 0,
            sums: vec![0.0; width],
        }
    }

    fn ingest(&mut self, record: &Record, numerics: &[FieldRef]) {
        self.count += 1;
        for (sum, field) in self.sums.iter_mut().zip(numerics) {
            if let Some(n) = record.get(field.index).and_then(Value::as_number) {
                *sum += n;
            }
        }
    }

    fn absorb(&mut self, other: &AggregateRow) {
        self.count += other.count;
        for (sum, extra) in self.sums.iter_mut().zip(&other.sums) {
            *sum += extra;
        }
    }

    pub fn sum(&self, position: usize) -> Option<f64> {
        self.sums.get(position).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateTable {
    pub name: String,
    pub grouping: Vec<String>,
    pub numerics: Vec<String>,
    rows: Vec<AggregateRow>,
    #[serde(skip)]
    index: HashMap<GroupKey, usize>,
}

impl AggregateTable {
    pub fn new(name: impl Into<String>, grouping: Vec<String>, numerics: Vec<String>) -> Self {
        Self {
            name: name.into(),
            grouping,
            numerics,
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Appends a fully formed row, merging it into an existing row with the
    /// same key.
    pub fn insert(&mut self, row: AggregateRow) {
        match self.index.get(&row.key) {
            Some(&pos) => self.rows[pos].absorb(&row),
            None => {
                self.index.insert(row.key.clone(), self.rows.len());
                self.rows.push(row);
            }
        }
    }

    fn accumulate(&mut self, key: GroupKey, record: &Record, numerics: &[FieldRef]) {
        let pos = match self.index.get(&key) {
            Some(&pos) => pos,
            None => {
                let pos = self.rows.len();
                self.index.insert(key.clone(), pos);
                self.rows.push(AggregateRow::empty(key, numerics.len()));
                pos
            }
        };
        self.rows[pos].ingest(record, numerics);
    }

    pub fn merge(&mut self, other: &AggregateTable) {
        for row in &other.rows {
            self.insert(row.clone());
        }
    }

    pub fn rows(&self) -> &[AggregateRow] {
        &self.rows
    }

    pub fn get(&self, key: &GroupKey) -> Option<&AggregateRow> {
        self.index.get(key).map(|&pos| &self.rows[pos])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn numeric_position(&self, field: &str) -> Option<usize> {
        self.numerics.iter().position(|f| f == field)
    }

    /// Column order: grouping fields, `count`, then `<field>_sum` per numeric.
    pub fn to_table(&self) -> Table {
        let mut columns = self.grouping.clone();
        columns.push(COUNT_COLUMN.to_string());
        columns.extend(self.numerics.iter().map(|f| format!("{f}{SUM_SUFFIX}")));
        let mut table =
            Table::new(self.name.clone(), columns).with_measures_from(self.grouping.len());
        for row in &self.rows {
            let mut cells = row
                .key
                .parts()
                .iter()
                .cloned()
                .map(Some)
                .collect::<Vec<_>>();
            cells.push(Some(Value::Number(row.count as f64)));
            cells.extend(row.sums.iter().map(|s| Some(Value::Number(*s))));
            table.push_row(cells);
        }
        table
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummarySet {
    tables: Vec<AggregateTable>,
    errors: Option<Table>,
}

impl SummarySet {
    pub fn new(tables: Vec<AggregateTable>) -> Self {
        Self {
            tables,
            errors: None,
        }
    }

    /// Attaches raw error records as the `errors` table; an empty table is
    /// dropped so a clean dataset has no `errors` entry at all.
    pub fn with_errors(mut self, errors: Table) -> Self {
        self.errors = (!errors.is_empty()).then_some(errors);
        self
    }

    pub fn table(&self, name: &str) -> Option<&AggregateTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn tables(&self) -> &[AggregateTable] {
        &self.tables
    }

    pub fn errors(&self) -> Option<&Table> {
        self.errors.as_ref()
    }

    pub fn table_names(&self) -> Vec<&str> {
        let mut names = Vec::with_capacity(self.tables.len() + 1);
        if self.errors.is_some() {
            names.push(ERRORS_TABLE);
        }
        names.extend(self.tables.iter().map(|t| t.name.as_str()));
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table_names().contains(&name)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.errors.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub summary: SummarySet,
    pub failures: FailureReport,
}

#[derive(Debug, Clone)]
struct TableSpec {
    name: String,
    key_fields: Vec<FieldRef>,
}

impl TableSpec {
    fn key_for(&self, record: &Record) -> Option<GroupKey> {
        self.key_fields
            .iter()
            .map(|f| record.get(f.index).cloned())
            .collect::<Option<Vec<_>>>()
            .map(GroupKey)
    }

    fn empty_table(&self, numerics: &[FieldRef]) -> AggregateTable {
        AggregateTable::new(
            self.name.clone(),
            self.key_fields.iter().map(|f| f.name.clone()).collect(),
            numerics.iter().map(|f| f.name.clone()).collect(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct AggregationPlan {
    specs: Vec<TableSpec>,
    numerics: Vec<FieldRef>,
    single_value: Vec<String>,
    failures: FailureReport,
}

impl AggregationPlan {
    pub fn build(
        schema: &Schema,
        eligible: &[&Record],
        roles: &FieldRoles,
    ) -> Result<Self, SchemaError> {
        let currency = FieldRef {
            index: schema.require(CURRENCY_FIELD)?,
            name: CURRENCY_FIELD.to_string(),
        };
        let mut failures = FailureReport::default();
        let mut singles = Vec::new();
        let mut grouped = Vec::new();
        for field in &roles.categories {
            if schema::distinct_count(eligible.iter().copied(), field.index) == 1 {
                singles.push(field.clone());
            } else {
                grouped.push(field.clone());
            }
        }

        let mut specs = Vec::new();
        if !singles.is_empty() {
            let mut key_fields = vec![currency.clone()];
            key_fields.extend(singles.iter().cloned());
            specs.push(TableSpec {
                name: BASE_TABLE.to_string(),
                key_fields,
            });
        }
        for field in grouped {
            if let Err(reason) = check_category(&field, eligible) {
                warn!("Skipping category '{}': {reason}", field.name);
                failures.push(CategoryFailure {
                    field: field.name.clone(),
                    reason,
                });
                continue;
            }
            specs.push(TableSpec {
                name: field.name.clone(),
                key_fields: vec![field, currency.clone()],
            });
        }
        debug!(
            "Aggregation plan: {} table(s), single-value categories {:?}",
            specs.len(),
            singles.iter().map(|f| f.name.as_str()).collect::<Vec<_>>()
        );
        Ok(Self {
            specs,
            numerics: roles.numerics.clone(),
            single_value: singles.into_iter().map(|f| f.name).collect(),
            failures,
        })
    }

    pub fn single_value_categories(&self) -> &[String] {
        &self.single_value
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }

    /// Aggregates `records` into one slot per planned table. Each table is
    /// built on its own worker over the shared read-only records.
    pub fn partial(&self, records: &[&Record]) -> PartialAggregate {
        let tables = self
            .specs
            .par_iter()
            .map(|spec| {
                let mut table = spec.empty_table(&self.numerics);
                for record in records {
                    if let Some(key) = spec.key_for(record) {
                        table.accumulate(key, record, &self.numerics);
                    }
                }
                table
            })
            .collect();
        PartialAggregate { tables }
    }

    pub fn aggregate(&self, records: &[&Record]) -> Aggregation {
        self.finish(self.partial(records))
    }

    /// Aggregates disjoint shards of `records` in parallel and merges them.
    pub fn aggregate_sharded(&self, records: &[&Record], shard_size: usize) -> Aggregation {
        let shard_size = shard_size.max(1);
        let merged = records
            .par_chunks(shard_size)
            .map(|shard| self.partial(shard))
            .reduce(|| self.partial(&[]), |left, right| left.merge(right));
        self.finish(merged)
    }

    pub fn finish(&self, partial: PartialAggregate) -> Aggregation {
        let tables = partial
            .tables
            .into_iter()
            .filter(|t| !t.is_empty())
            .collect();
        Aggregation {
            summary: SummarySet::new(tables),
            failures: self.failures.clone(),
        }
    }
}

/// Per-table aggregates over one shard, slot-aligned with the plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialAggregate {
    tables: Vec<AggregateTable>,
}

impl PartialAggregate {
    pub fn merge(mut self, other: PartialAggregate) -> PartialAggregate {
        for (table, extra) in self.tables.iter_mut().zip(&other.tables) {
            table.merge(extra);
        }
        self
    }
}

fn check_category(field: &FieldRef, records: &[&Record]) -> Result<(), CategoryFailureReason> {
    if field.name == BASE_TABLE || field.name == ERRORS_TABLE {
        return Err(CategoryFailureReason::ReservedTableName {
            table: field.name.clone(),
        });
    }
    let (numbers, texts) = records
        .iter()
        .filter_map(|r| r.get(field.index))
        .fold((0usize, 0usize), |(n, t), value| {
            if value.is_number() { (n + 1, t) } else { (n, t + 1) }
        });
    if numbers > 0 && texts > 0 {
        return Err(CategoryFailureReason::MixedValueTypes { numbers, texts });
    }
    Ok(())
}

/// Plans and runs aggregation over the eligible records in one step.
pub fn aggregate(
    schema: &Schema,
    eligible: &[&Record],
    roles: &FieldRoles,
) -> Result<Aggregation, SchemaError> {
    let plan = AggregationPlan::build(schema, eligible, roles)?;
    Ok(plan.aggregate(eligible))
}
