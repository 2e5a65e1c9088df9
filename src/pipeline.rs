//! End-to-end entry points: classify → partition → aggregate, and the
//! two-snapshot comparison built on top of it.

use log::{info, warn};

use crate::{
    aggregate::{AggregationPlan, ERRORS_TABLE, SummarySet},
    compare::{self, ComparisonSet},
    config::Settings,
    data::{Dataset, Record},
    error::{FailureReport, SchemaError},
    partition::partition,
    schema::{self, FieldRoles},
    table::Table,
};

#[derive(Debug, Clone, Default)]
pub struct DatasetSummary {
    pub roles: FieldRoles,
    pub summary: SummarySet,
    pub failures: FailureReport,
}

impl DatasetSummary {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct DatasetComparison {
    pub left: DatasetSummary,
    pub right: DatasetSummary,
    pub comparison: ComparisonSet,
}

/// Summarizes one dataset. An empty dataset yields an empty summary; a
/// non-empty dataset without a `Currency` field is a [`SchemaError`].
pub fn summarize(dataset: &Dataset, settings: &Settings) -> Result<DatasetSummary, SchemaError> {
    if dataset.is_empty() {
        info!("Dataset is empty; nothing to summarize");
        return Ok(DatasetSummary::default());
    }
    let roles = schema::classify(dataset, settings.category_threshold);
    let split = partition(dataset);
    let plan = AggregationPlan::build(dataset.schema(), &split.eligible, &roles)?;
    let aggregation = plan.aggregate(&split.eligible);
    for failure in aggregation.failures.iter() {
        warn!("{failure}");
    }
    let errors = error_table(&dataset.schema().field_names(), &split.errors);
    info!(
        "Summarized {} record(s): {} eligible, {} error(s), {} table(s)",
        dataset.len(),
        split.eligible.len(),
        split.errors.len(),
        aggregation.summary.tables().len()
    );
    Ok(DatasetSummary {
        roles,
        summary: aggregation.summary.with_errors(errors),
        failures: aggregation.failures,
    })
}

pub fn error_table(columns: &[String], records: &[&Record]) -> Table {
    let mut table = Table::new(ERRORS_TABLE, columns.to_vec());
    for record in records {
        table.push_row(record.values().to_vec());
    }
    table
}

pub fn compare_datasets(
    left: &Dataset,
    right: &Dataset,
    settings: &Settings,
) -> Result<DatasetComparison, SchemaError> {
    let left = summarize(left, settings)?;
    let right = summarize(right, settings)?;
    let comparison = compare::compare(
        &left.summary,
        &right.summary,
        settings.comparison_threshold,
    );
    Ok(DatasetComparison {
        left,
        right,
        comparison,
    })
}
