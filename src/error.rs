//! Error kinds surfaced by the roll-up pipeline.
//!
//! A [`SchemaError`] means nothing could be computed for a dataset. A
//! [`CategoryFailure`] means one category table was dropped while the rest of
//! the [`SummarySet`](crate::aggregate::SummarySet) is still valid; failures are
//! collected into a [`FailureReport`] that travels with the summary.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Required field '{field}' is missing from the dataset")]
    MissingField { field: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CategoryFailureReason {
    #[error("column mixes numeric and text values ({numbers} numeric, {texts} text)")]
    MixedValueTypes { numbers: usize, texts: usize },
    #[error("field name collides with the reserved '{table}' table")]
    ReservedTableName { table: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("Category '{field}' could not be aggregated: {reason}")]
pub struct CategoryFailure {
    pub field: String,
    pub reason: CategoryFailureReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    failures: Vec<CategoryFailure>,
}

impl FailureReport {
    pub fn push(&mut self, failure: CategoryFailure) {
        if !self.failures.iter().any(|f| f.field == failure.field) {
            self.failures.push(failure);
        }
    }

    pub fn extend(&mut self, other: FailureReport) {
        for failure in other.failures {
            self.push(failure);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategoryFailure> {
        self.failures.iter()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.failures.iter().any(|f| f.field == field)
    }
}
