//! Splits a dataset into error records and records eligible for aggregation.

use crate::{
    data::{Dataset, Record, Value},
    schema::ERROR_FIELD,
};

#[derive(Debug, Clone, Default)]
pub struct Partition<'a> {
    pub errors: Vec<&'a Record>,
    pub eligible: Vec<&'a Record>,
}

/// A record is an error record iff its `Error` cell is non-null and not blank.
/// Without an `Error` field every record is eligible.
pub fn partition(dataset: &Dataset) -> Partition<'_> {
    let Some(error_index) = dataset.schema().field_index(ERROR_FIELD) else {
        return Partition {
            errors: Vec::new(),
            eligible: dataset.records().iter().collect(),
        };
    };
    let (errors, eligible) = dataset
        .records()
        .iter()
        .partition(|record| carries_error(record, error_index));
    Partition { errors, eligible }
}

fn carries_error(record: &Record, error_index: usize) -> bool {
    match record.get(error_index) {
        None => false,
        Some(Value::Text(s)) => !s.trim().is_empty(),
        Some(Value::Number(_)) => true,
    }
}
